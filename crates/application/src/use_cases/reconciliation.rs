//! 卡住的提现的人工对账
//!
//! Payouts whose transfer outcome was unknown stay `Processing` with their
//! funds locked. An operator checks the chain and resolves each one here;
//! nothing in the engines calls this automatically.

use std::sync::Arc;

use mechaworks_domain::{LedgerStore, Payout, PayoutStatus, WorkerId};
use mechaworks_errors::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// The transfer landed on chain; funds stay locked as paid out.
    Settled { signature: String },
    /// The transfer never happened; funds go back to pending.
    Reverted,
}

pub struct ReconciliationService {
    store: Arc<dyn LedgerStore>,
}

impl ReconciliationService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub async fn list_stuck_payouts(&self) -> MarketResult<Vec<Payout>> {
        self.store.list_payouts(PayoutStatus::Processing).await
    }

    #[instrument(skip(self))]
    pub async fn resolve_payout(
        &self,
        payout_id: i64,
        resolution: Resolution,
    ) -> MarketResult<Payout> {
        let mut payout = self
            .store
            .find_payout(payout_id)
            .await?
            .ok_or(MarketError::PayoutNotFound { id: payout_id })?;

        let (status, signature) = match &resolution {
            Resolution::Settled { signature } => {
                if signature.trim().is_empty() {
                    return Err(MarketError::validation_error("结算交易签名不能为空"));
                }
                (PayoutStatus::Success, Some(signature.trim().to_string()))
            }
            Resolution::Reverted => (PayoutStatus::Failure, None),
        };

        let mut tx = self.store.begin().await?;
        if !tx
            .finish_payout(payout.id, status, signature.as_deref())
            .await?
        {
            return Err(MarketError::PayoutNotProcessing { id: payout.id });
        }
        if status == PayoutStatus::Failure
            && !tx
                .release_locked(WorkerId(payout.worker_id), payout.amount)
                .await?
        {
            return Err(MarketError::Internal(format!(
                "锁定余额不足以回退: worker_id={}, amount={}",
                payout.worker_id, payout.amount
            )));
        }
        tx.commit().await?;

        info!(
            "提现已人工处理: payout_id={}, status={}, signature={:?}",
            payout.id, status, signature
        );
        payout.status = status;
        payout.signature = signature;
        Ok(payout)
    }
}
