use std::sync::Arc;

use mechaworks_domain::{Amount, LedgerStore, NewSubmission, Submission, TaskAssignment, WorkerId};
use mechaworks_errors::{MarketError, MarketResult};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// 提交结果
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    /// reward credited to the worker's pending balance
    pub amount: Amount,
    pub next_task: Option<TaskAssignment>,
}

/// 任务分配引擎
pub struct AllocationService {
    store: Arc<dyn LedgerStore>,
}

impl AllocationService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Oldest task with free slots that the worker has not answered yet.
    /// `None` means the worker has exhausted the pool.
    #[instrument(skip(self), fields(worker_id = %worker_id))]
    pub async fn next_task(&self, worker_id: WorkerId) -> MarketResult<Option<TaskAssignment>> {
        let task = self.store.next_task_for_worker(worker_id).await?;
        debug!("下一个任务: {:?}", task.as_ref().map(TaskAssignment::id));
        Ok(task)
    }

    /// Records one answer and credits the reward, then returns the
    /// worker's following task.
    ///
    /// The eligibility check, the quota claim, the insert-if-absent and the
    /// balance credit all run in one transaction under the worker's row lock.
    #[instrument(skip(self), fields(worker_id = %worker_id))]
    pub async fn submit(
        &self,
        worker_id: WorkerId,
        task_id: i64,
        option_id: i64,
    ) -> MarketResult<SubmissionReceipt> {
        let mut tx = self.store.begin().await?;

        tx.lock_worker(worker_id)
            .await?
            .ok_or_else(|| MarketError::worker_not_found(worker_id.0))?;

        let task = match tx.next_task_for_worker(worker_id).await? {
            Some(task) if task.id == task_id => task,
            current => {
                debug!(
                    "提交的任务不是当前任务: 提交={}, 当前={:?}",
                    task_id,
                    current.map(|t| t.id)
                );
                counter!("mechaworks_submissions_rejected_total", "reason" => "stale").increment(1);
                return Err(MarketError::StaleOrInvalidTask { task_id });
            }
        };

        let options = tx.task_options(task.id).await?;
        if !options.iter().any(|o| o.id == option_id) {
            counter!("mechaworks_submissions_rejected_total", "reason" => "option").increment(1);
            return Err(MarketError::InvalidOption { task_id, option_id });
        }

        let reward = task.reward_per_submission();

        if !tx.claim_task_slot(task.id).await? {
            // 读到空位后, 另一事务先提交占用了最后的名额
            warn!("任务名额已被并发占满, 拒绝提交: task_id={}", task.id);
            counter!("mechaworks_submissions_rejected_total", "reason" => "quota").increment(1);
            return Err(MarketError::QuotaExceeded { task_id });
        }

        let submission = tx
            .insert_submission(&NewSubmission {
                worker_id: worker_id.0,
                task_id: task.id,
                option_id,
                amount: reward,
            })
            .await?;
        let Some(submission) = submission else {
            warn!("重复提交被拒绝: task_id={}", task.id);
            counter!("mechaworks_submissions_rejected_total", "reason" => "duplicate").increment(1);
            return Err(MarketError::StaleOrInvalidTask { task_id });
        };

        if !tx.credit_pending(worker_id, reward).await? {
            return Err(MarketError::worker_not_found(worker_id.0));
        }

        tx.commit().await?;
        counter!("mechaworks_submissions_total").increment(1);
        debug!("提交成功: task_id={}, reward={}", task.id, reward);

        let next_task = self.store.next_task_for_worker(worker_id).await?;

        Ok(SubmissionReceipt {
            submission,
            amount: reward,
            next_task,
        })
    }
}
