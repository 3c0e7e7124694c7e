#[cfg(test)]
mod error_tests {
    use crate::*;

    #[test]
    fn test_market_error_display() {
        let db_op_error = MarketError::DatabaseOperation("Connection failed".to_string());
        assert_eq!(db_op_error.to_string(), "数据库操作错误: Connection failed");

        let worker_error = MarketError::WorkerNotFound { id: 7 };
        assert_eq!(worker_error.to_string(), "Worker未找到: 7");

        let stale = MarketError::StaleOrInvalidTask { task_id: 12 };
        assert_eq!(stale.to_string(), "任务已过期或无效: task_id=12");

        let failed = MarketError::SettlementFailed {
            payout_id: 3,
            reason: "insufficient funds".to_string(),
        };
        assert_eq!(
            failed.to_string(),
            "链上转账失败: payout_id=3 - insufficient funds"
        );

        let uncertain = MarketError::SettlementUncertain {
            payout_id: 4,
            amount: 5_000_000,
        };
        assert_eq!(
            uncertain.to_string(),
            "链上转账结果未知: payout_id=4, amount=5000000"
        );

        assert_eq!(MarketError::NothingToPayout.to_string(), "没有可提现的余额");
    }

    #[test]
    fn test_error_helper_constructors() {
        assert!(matches!(
            MarketError::worker_not_found(1),
            MarketError::WorkerNotFound { id: 1 }
        ));
        assert!(matches!(
            MarketError::task_not_found(9),
            MarketError::TaskNotFound { id: 9 }
        ));
        assert!(matches!(
            MarketError::payment_invalid("wrong destination"),
            MarketError::PaymentInvalid(msg) if msg == "wrong destination"
        ));
        assert!(matches!(
            MarketError::database_error("boom"),
            MarketError::DatabaseOperation(msg) if msg == "boom"
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(MarketError::ReservationFailed("pool closed".into()).is_retryable());
        assert!(MarketError::Network("reset".into()).is_retryable());
        assert!(MarketError::Timeout("rpc".into()).is_retryable());

        assert!(!MarketError::NothingToPayout.is_retryable());
        assert!(!MarketError::SettlementFailed {
            payout_id: 1,
            reason: "rejected".into()
        }
        .is_retryable());
        // an ambiguous settlement must never be retried automatically
        assert!(!MarketError::SettlementUncertain {
            payout_id: 1,
            amount: 10
        }
        .is_retryable());
    }

    #[test]
    fn test_validation_and_reconciliation_flags() {
        assert!(MarketError::StaleOrInvalidTask { task_id: 1 }.is_validation());
        assert!(MarketError::PaymentAlreadyUsed {
            signature: "sig".into()
        }
        .is_validation());
        assert!(!MarketError::Internal("bug".into()).is_validation());

        assert!(MarketError::SettlementUncertain {
            payout_id: 2,
            amount: 1
        }
        .requires_reconciliation());
        assert!(!MarketError::SettlementFailed {
            payout_id: 2,
            reason: "no".into()
        }
        .requires_reconciliation());
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            MarketError::StaleOrInvalidTask { task_id: 1 }.user_message(),
            "任务ID不正确"
        );
        assert_eq!(
            MarketError::SettlementUncertain {
                payout_id: 1,
                amount: 1
            }
            .user_message(),
            "提现处理中"
        );
        assert_eq!(
            MarketError::Internal("x".into()).user_message(),
            "系统繁忙，请稍后重试"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let market: MarketError = err.into();
        assert!(matches!(market, MarketError::Serialization(_)));
    }
}
