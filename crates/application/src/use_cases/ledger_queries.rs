use std::sync::Arc;

use mechaworks_domain::{Balance, LedgerStore, RequesterId, TaskResults, WorkerId};
use mechaworks_errors::{MarketError, MarketResult};
use tracing::instrument;

/// 只读查询
pub struct LedgerQueryService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerQueryService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(worker_id = %worker_id))]
    pub async fn get_balance(&self, worker_id: WorkerId) -> MarketResult<Balance> {
        let worker = self
            .store
            .find_worker(worker_id)
            .await?
            .ok_or_else(|| MarketError::worker_not_found(worker_id.0))?;
        Ok(worker.balance())
    }

    /// Per-option submission counts for a task the requester owns.
    #[instrument(skip(self), fields(requester_id = %requester_id))]
    pub async fn task_results(
        &self,
        requester_id: RequesterId,
        task_id: i64,
    ) -> MarketResult<TaskResults> {
        let assignment = self
            .store
            .task_with_options(task_id)
            .await?
            .filter(|a| a.task.requester_id == requester_id.0)
            .ok_or_else(|| MarketError::task_not_found(task_id))?;

        let tallies = self.store.option_tallies(task_id).await?;
        Ok(TaskResults {
            task: assignment.task,
            tallies,
        })
    }
}
