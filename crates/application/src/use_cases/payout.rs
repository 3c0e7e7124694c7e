//! 提现预留与结算引擎
//!
//! ```text
//! Idle --reserve--> Processing --confirmed--> Success
//!                              --rejected---> Failure (funds back to pending)
//!                              --unknown----> Processing (manual review)
//! ```
//!
//! The reservation commits before the transfer starts; no ledger
//! transaction is held across the network call.

use std::sync::Arc;

use mechaworks_domain::{
    Amount, LedgerStore, NewPayout, Payout, PayoutStatus, SettlementNetwork, TransferOutcome,
    Worker, WorkerId,
};
use mechaworks_errors::{MarketError, MarketResult};
use metrics::counter;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::settings::MarketSettings;

/// 提现结果
#[derive(Debug, Clone, Serialize)]
pub struct PayoutReceipt {
    pub payout_id: i64,
    pub amount: Amount,
    pub status: PayoutStatus,
    pub signature: Option<String>,
}

pub struct PayoutService {
    store: Arc<dyn LedgerStore>,
    network: Arc<dyn SettlementNetwork>,
    settings: MarketSettings,
}

fn reservation_failed(err: MarketError) -> MarketError {
    match err {
        MarketError::ReservationFailed(_) => err,
        other => MarketError::ReservationFailed(other.to_string()),
    }
}

impl PayoutService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        network: Arc<dyn SettlementNetwork>,
        settings: MarketSettings,
    ) -> Self {
        Self {
            store,
            network,
            settings,
        }
    }

    /// Pays out the worker's whole pending balance.
    ///
    /// Errors:
    /// - `NothingToPayout` when there is nothing to reserve
    /// - `ReservationFailed` when the ledger failed before any transfer (safe to retry)
    /// - `SettlementFailed` when the network rejected the transfer (funds restored)
    /// - `SettlementUncertain` when the outcome is unknown (funds stay locked)
    #[instrument(skip(self), fields(worker_id = %worker_id))]
    pub async fn request_payout(&self, worker_id: WorkerId) -> MarketResult<PayoutReceipt> {
        let (worker, payout, lamports) = self.reserve(worker_id).await?;

        info!(
            "提现已预留, 开始转账: payout_id={}, amount={}, lamports={}",
            payout.id, payout.amount, lamports
        );

        let outcome = match tokio::time::timeout(
            self.settings.transfer_timeout,
            self.network
                .transfer(&self.settings.platform_wallet, &worker.address, lamports),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => TransferOutcome::Unknown(format!(
                "转账在 {:?} 内未返回",
                self.settings.transfer_timeout
            )),
        };

        match outcome {
            TransferOutcome::Confirmed(signature) => {
                self.mark_settled(&payout, &signature).await;
                counter!("mechaworks_payouts_total", "outcome" => "success").increment(1);
                Ok(PayoutReceipt {
                    payout_id: payout.id,
                    amount: payout.amount,
                    status: PayoutStatus::Success,
                    signature: Some(signature),
                })
            }
            TransferOutcome::Rejected(reason) => {
                warn!("转账被拒绝: payout_id={}, reason={}", payout.id, reason);
                counter!("mechaworks_payouts_total", "outcome" => "failure").increment(1);
                if self.compensate(&worker, &payout).await {
                    Err(MarketError::SettlementFailed {
                        payout_id: payout.id,
                        reason,
                    })
                } else {
                    Err(MarketError::SettlementUncertain {
                        payout_id: payout.id,
                        amount: payout.amount.minor_units(),
                    })
                }
            }
            TransferOutcome::Unknown(reason) => {
                warn!(
                    "转账结果未知, 资金保持锁定等待人工核查: payout_id={}, reason={}",
                    payout.id, reason
                );
                counter!("mechaworks_payouts_total", "outcome" => "unknown").increment(1);
                Err(MarketError::SettlementUncertain {
                    payout_id: payout.id,
                    amount: payout.amount.minor_units(),
                })
            }
        }
    }

    /// pending -> locked plus a Processing payout row, in one transaction.
    async fn reserve(&self, worker_id: WorkerId) -> MarketResult<(Worker, Payout, u64)> {
        let mut tx = self.store.begin().await.map_err(reservation_failed)?;

        let worker = tx
            .lock_worker(worker_id)
            .await
            .map_err(reservation_failed)?
            .ok_or_else(|| MarketError::worker_not_found(worker_id.0))?;

        let amount = worker.pending_amount;
        let lamports = match self.settings.scale.to_lamports(amount) {
            Some(0) => return Err(MarketError::NothingToPayout),
            Some(lamports) => lamports,
            None => {
                return Err(MarketError::validation_error(format!(
                    "提现金额超出链上金额范围: worker_id={worker_id}, amount={amount}"
                )))
            }
        };

        if !tx
            .reserve_pending(worker_id, amount)
            .await
            .map_err(reservation_failed)?
        {
            return Err(MarketError::ReservationFailed(format!(
                "待结算余额不足: worker_id={worker_id}, amount={amount}"
            )));
        }

        let payout = tx
            .insert_payout(&NewPayout {
                worker_id: worker.id,
                amount,
            })
            .await
            .map_err(reservation_failed)?;

        tx.commit().await.map_err(reservation_failed)?;
        Ok((worker, payout, lamports))
    }

    async fn mark_settled(&self, payout: &Payout, signature: &str) {
        let result = async {
            let mut tx = self.store.begin().await?;
            let updated = tx
                .finish_payout(payout.id, PayoutStatus::Success, Some(signature))
                .await?;
            tx.commit().await?;
            Ok::<bool, MarketError>(updated)
        }
        .await;

        match result {
            Ok(true) => info!("提现成功: payout_id={}, signature={}", payout.id, signature),
            Ok(false) => warn!(
                "提现记录已不在处理中状态, 未更新: payout_id={}, signature={}",
                payout.id, signature
            ),
            Err(e) => error!(
                "转账已成功但提现状态写入失败, 需要人工对账: payout_id={}, signature={}, error={}",
                payout.id, signature, e
            ),
        }
    }

    /// Reverses the reservation and marks the payout Failure. Returns whether
    /// the ledger now reflects the rejection.
    async fn compensate(&self, worker: &Worker, payout: &Payout) -> bool {
        let result = async {
            let mut tx = self.store.begin().await?;
            if !tx
                .finish_payout(payout.id, PayoutStatus::Failure, None)
                .await?
            {
                return Ok(false);
            }
            if !tx.release_locked(worker.worker_id(), payout.amount).await? {
                return Err(MarketError::Internal(format!(
                    "锁定余额不足以回退: worker_id={}, amount={}",
                    worker.id, payout.amount
                )));
            }
            tx.commit().await?;
            Ok::<bool, MarketError>(true)
        }
        .await;

        match result {
            Ok(true) => {
                info!("已回退提现预留: payout_id={}", payout.id);
                true
            }
            Ok(false) => {
                warn!("提现记录已不在处理中状态, 跳过回退: payout_id={}", payout.id);
                false
            }
            Err(e) => {
                error!(
                    "补偿事务失败, 需要人工对账: payout_id={}, worker_id={}, amount={}, error={}",
                    payout.id, worker.id, payout.amount, e
                );
                counter!("mechaworks_payout_compensation_failures_total").increment(1);
                false
            }
        }
    }
}
