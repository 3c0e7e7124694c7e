use thiserror::Error;

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: i64 },
    #[error("发布者未找到: {id}")]
    RequesterNotFound { id: i64 },
    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },
    #[error("付款交易未找到: {signature}")]
    PaymentNotFound { signature: String },
    #[error("付款交易无效: {0}")]
    PaymentInvalid(String),
    #[error("付款交易已被使用: {signature}")]
    PaymentAlreadyUsed { signature: String },
    #[error("任务已过期或无效: task_id={task_id}")]
    StaleOrInvalidTask { task_id: i64 },
    #[error("选项 {option_id} 不属于任务 {task_id}")]
    InvalidOption { task_id: i64, option_id: i64 },
    #[error("任务提交数已达上限: task_id={task_id}")]
    QuotaExceeded { task_id: i64 },
    #[error("没有可提现的余额")]
    NothingToPayout,
    #[error("资金预留失败: {0}")]
    ReservationFailed(String),
    #[error("链上转账失败: payout_id={payout_id} - {reason}")]
    SettlementFailed { payout_id: i64, reason: String },
    #[error("链上转账结果未知: payout_id={payout_id}, amount={amount}")]
    SettlementUncertain { payout_id: i64, amount: i64 },
    #[error("提现记录未找到: {id}")]
    PayoutNotFound { id: i64 },
    #[error("提现记录不在处理中状态: {id}")]
    PayoutNotProcessing { id: i64 },
    #[error("网络错误: {0}")]
    Network(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn worker_not_found(id: i64) -> Self {
        Self::WorkerNotFound { id }
    }
    pub fn requester_not_found(id: i64) -> Self {
        Self::RequesterNotFound { id }
    }
    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }
    pub fn payment_invalid<S: Into<String>>(msg: S) -> Self {
        Self::PaymentInvalid(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Errors raised before any state was touched, caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MarketError::ValidationError(_)
                | MarketError::PaymentNotFound { .. }
                | MarketError::PaymentInvalid(_)
                | MarketError::PaymentAlreadyUsed { .. }
                | MarketError::StaleOrInvalidTask { .. }
                | MarketError::InvalidOption { .. }
                | MarketError::NothingToPayout
        )
    }

    /// Retrying is safe: the failed operation left no partial mutation behind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::Database(_)
                | MarketError::DatabaseOperation(_)
                | MarketError::ReservationFailed(_)
                | MarketError::Network(_)
                | MarketError::Timeout(_)
        )
    }

    /// Outcomes that need a human to look at the ledger.
    pub fn requires_reconciliation(&self) -> bool {
        matches!(self, MarketError::SettlementUncertain { .. })
    }

    pub fn user_message(&self) -> &str {
        match self {
            MarketError::WorkerNotFound { .. } => "用户不存在",
            MarketError::RequesterNotFound { .. } => "用户不存在",
            MarketError::TaskNotFound { .. } => "任务不存在或无权访问",
            MarketError::PaymentNotFound { .. } => "付款交易不存在",
            MarketError::PaymentInvalid(_) => "付款交易金额或地址不正确",
            MarketError::PaymentAlreadyUsed { .. } => "该付款交易已被用于其他任务",
            MarketError::StaleOrInvalidTask { .. } => "任务ID不正确",
            MarketError::InvalidOption { .. } => "选项不属于该任务",
            MarketError::NothingToPayout => "没有可提现的余额",
            MarketError::SettlementFailed { .. } => "转账失败，余额已退回",
            MarketError::SettlementUncertain { .. } => "提现处理中",
            MarketError::ValidationError(_) => "输入数据验证失败",
            MarketError::Timeout(_) => "操作超时，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MarketError::Timeout(err.to_string())
        } else {
            MarketError::Network(err.to_string())
        }
    }
}

impl From<anyhow::Error> for MarketError {
    fn from(err: anyhow::Error) -> Self {
        MarketError::Internal(err.to_string())
    }
}
