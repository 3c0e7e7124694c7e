use std::sync::Arc;

use mechaworks_domain::{LedgerStore, NewTask, RequesterId, SettlementNetwork, TaskAssignment};
use mechaworks_errors::{MarketError, MarketResult};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::settings::MarketSettings;

/// 发布任务请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundTaskRequest {
    /// falls back to the configured default title when empty
    pub title: Option<String>,
    /// image URLs, one per option
    pub options: Vec<String>,
    pub payment_signature: String,
}

/// 付款核验与任务创建
pub struct FundingService {
    store: Arc<dyn LedgerStore>,
    network: Arc<dyn SettlementNetwork>,
    settings: MarketSettings,
}

impl FundingService {
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

    /// Verifies the on-chain payment and creates the task with its options.
    #[instrument(skip(self, request), fields(
        requester_id = %requester_id,
        signature = %request.payment_signature,
    ))]
    pub async fn fund_task(
        &self,
        requester_id: RequesterId,
        request: FundTaskRequest,
    ) -> MarketResult<TaskAssignment> {
        let (title, options) = self.validate(&request)?;
        let signature = request.payment_signature.trim().to_string();

        let requester = self
            .store
            .find_requester(requester_id)
            .await?
            .ok_or_else(|| MarketError::requester_not_found(requester_id.0))?;

        let lookup = tokio::time::timeout(
            self.settings.lookup_timeout,
            self.network.lookup_transaction(&signature),
        )
        .await
        .map_err(|_| MarketError::Timeout(format!("查询付款交易超时: {signature}")))??;
        let details = lookup.ok_or_else(|| MarketError::PaymentNotFound {
            signature: signature.clone(),
        })?;

        let expected_lamports = self.settings.funding_lamports()?;
        if let Err(mismatch) = details.verify_incoming_payment(
            &requester.address,
            &self.settings.platform_wallet,
            expected_lamports,
        ) {
            warn!("付款交易核验失败: {}", mismatch);
            counter!("mechaworks_funding_rejected_total").increment(1);
            return Err(MarketError::payment_invalid(mismatch.to_string()));
        }

        let mut tx = self.store.begin().await?;
        let task = tx
            .insert_task(&NewTask {
                requester_id: requester.id,
                title,
                amount: self.settings.task_price,
                completion_quota: self.settings.completion_quota,
                signature,
            })
            .await?;
        let options = tx.insert_options(task.id, &options).await?;
        tx.commit().await?;

        counter!("mechaworks_tasks_funded_total").increment(1);
        info!(
            "任务已创建: task_id={}, options={}, quota={}",
            task.id,
            options.len(),
            task.completion_quota
        );
        Ok(TaskAssignment { task, options })
    }

    fn validate(&self, request: &FundTaskRequest) -> MarketResult<(String, Vec<String>)> {
        if request.payment_signature.trim().is_empty() {
            return Err(MarketError::validation_error("付款交易签名不能为空"));
        }

        let options: Vec<String> = request
            .options
            .iter()
            .map(|o| o.trim().to_string())
            .collect();
        if options.is_empty() {
            return Err(MarketError::validation_error("任务至少需要一个选项"));
        }
        if options.iter().any(String::is_empty) {
            return Err(MarketError::validation_error("选项图片地址不能为空"));
        }

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(self.settings.default_title.as_str())
            .to_string();

        Ok((title, options))
    }
}
