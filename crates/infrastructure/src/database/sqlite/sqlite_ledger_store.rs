use async_trait::async_trait;
use chrono::Utc;
use mechaworks_domain::{
    Amount, LedgerStore, LedgerTransaction, NewPayout, NewSubmission, NewTask, OptionTally,
    Payout, PayoutStatus, Requester, RequesterId, Submission, Task, TaskAssignment, TaskOption,
    WalletAddress, Worker, WorkerId,
};
use mechaworks_errors::{MarketError, MarketResult};
use sqlx::{SqlitePool, Sqlite, Transaction};
use tracing::debug;

use crate::database::mapping::{map_insert_task_error, LedgerRowExt};
use crate::database::queries;

/// SQLite账本存储
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_options(&self, task_id: i64) -> MarketResult<Vec<TaskOption>> {
        let sql = queries::select_task_options();
        let rows = sqlx::query(&sql)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| row.to_task_option()).collect()
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn begin(&self) -> MarketResult<Box<dyn LedgerTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteLedgerTransaction { tx }))
    }

    async fn find_worker(&self, id: WorkerId) -> MarketResult<Option<Worker>> {
        let sql = queries::select_worker();
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.to_worker()).transpose()
    }

    async fn find_requester(&self, id: RequesterId) -> MarketResult<Option<Requester>> {
        let sql = queries::select_requester();
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.to_requester()).transpose()
    }

    async fn register_worker(&self, address: &WalletAddress) -> MarketResult<Worker> {
        sqlx::query(queries::INSERT_WORKER)
            .bind(address.as_str())
            .execute(&self.pool)
            .await?;

        let sql = queries::select_worker_by_address();
        let row = sqlx::query(&sql)
            .bind(address.as_str())
            .fetch_one(&self.pool)
            .await?;
        let worker = row.to_worker()?;
        debug!("Worker登记完成: id={}, address={}", worker.id, address);
        Ok(worker)
    }

    async fn register_requester(&self, address: &WalletAddress) -> MarketResult<Requester> {
        sqlx::query(queries::INSERT_REQUESTER)
            .bind(address.as_str())
            .execute(&self.pool)
            .await?;

        let sql = queries::select_requester_by_address();
        let row = sqlx::query(&sql)
            .bind(address.as_str())
            .fetch_one(&self.pool)
            .await?;
        let requester = row.to_requester()?;
        debug!("发布者登记完成: id={}, address={}", requester.id, address);
        Ok(requester)
    }

    async fn next_task_for_worker(&self, id: WorkerId) -> MarketResult<Option<TaskAssignment>> {
        let sql = queries::select_next_task();
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let task = row.to_task()?;
                let options = self.load_options(task.id).await?;
                Ok(Some(TaskAssignment { task, options }))
            }
            None => Ok(None),
        }
    }

    async fn task_with_options(&self, task_id: i64) -> MarketResult<Option<TaskAssignment>> {
        let sql = queries::select_task();
        let row = sqlx::query(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let task = row.to_task()?;
                let options = self.load_options(task.id).await?;
                Ok(Some(TaskAssignment { task, options }))
            }
            None => Ok(None),
        }
    }

    async fn option_tallies(&self, task_id: i64) -> MarketResult<Vec<OptionTally>> {
        let rows = sqlx::query(queries::SELECT_OPTION_TALLIES)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| row.to_option_tally()).collect()
    }

    async fn find_payout(&self, id: i64) -> MarketResult<Option<Payout>> {
        let sql = queries::select_payout();
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.to_payout()).transpose()
    }

    async fn list_payouts(&self, status: PayoutStatus) -> MarketResult<Vec<Payout>> {
        let sql = queries::select_payouts_by_status();
        let rows = sqlx::query(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| row.to_payout()).collect()
    }
}

pub struct SqliteLedgerTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl LedgerTransaction for SqliteLedgerTransaction {
    async fn lock_worker(&mut self, id: WorkerId) -> MarketResult<Option<Worker>> {
        // SQLite没有行锁: 先写一次拿到数据库写锁, 直到事务结束
        sqlx::query(queries::TOUCH_WORKER)
            .bind(id.0)
            .execute(&mut *self.tx)
            .await?;

        let sql = queries::select_worker();
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| r.to_worker()).transpose()
    }

    async fn find_requester(&mut self, id: RequesterId) -> MarketResult<Option<Requester>> {
        let sql = queries::select_requester();
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| r.to_requester()).transpose()
    }

    async fn next_task_for_worker(&mut self, id: WorkerId) -> MarketResult<Option<Task>> {
        let sql = queries::select_next_task();
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| r.to_task()).transpose()
    }

    async fn task_options(&mut self, task_id: i64) -> MarketResult<Vec<TaskOption>> {
        let sql = queries::select_task_options();
        let rows = sqlx::query(&sql)
            .bind(task_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(|row| row.to_task_option()).collect()
    }

    async fn insert_task(&mut self, task: &NewTask) -> MarketResult<Task> {
        let sql = queries::insert_task();
        let row = sqlx::query(&sql)
            .bind(task.requester_id)
            .bind(&task.title)
            .bind(task.amount.minor_units())
            .bind(task.completion_quota)
            .bind(&task.signature)
            .bind(Utc::now())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_insert_task_error(e, &task.signature))?;
        row.to_task()
    }

    async fn insert_options(
        &mut self,
        task_id: i64,
        image_urls: &[String],
    ) -> MarketResult<Vec<TaskOption>> {
        let sql = queries::insert_task_option();
        let mut options = Vec::with_capacity(image_urls.len());
        for url in image_urls {
            let row = sqlx::query(&sql)
                .bind(task_id)
                .bind(url)
                .fetch_one(&mut *self.tx)
                .await?;
            options.push(row.to_task_option()?);
        }
        Ok(options)
    }

    async fn claim_task_slot(&mut self, task_id: i64) -> MarketResult<bool> {
        let result = sqlx::query(queries::CLAIM_TASK_SLOT)
            .bind(task_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_submission(
        &mut self,
        submission: &NewSubmission,
    ) -> MarketResult<Option<Submission>> {
        let sql = queries::insert_submission();
        let row = sqlx::query(&sql)
            .bind(submission.worker_id)
            .bind(submission.task_id)
            .bind(submission.option_id)
            .bind(submission.amount.minor_units())
            .bind(Utc::now())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| r.to_submission()).transpose()
    }

    async fn credit_pending(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool> {
        let result = sqlx::query(queries::CREDIT_PENDING)
            .bind(id.0)
            .bind(amount.minor_units())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn reserve_pending(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool> {
        let result = sqlx::query(queries::RESERVE_PENDING)
            .bind(id.0)
            .bind(amount.minor_units())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_locked(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool> {
        let result = sqlx::query(queries::RELEASE_LOCKED)
            .bind(id.0)
            .bind(amount.minor_units())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_payout(&mut self, payout: &NewPayout) -> MarketResult<Payout> {
        let sql = queries::insert_payout();
        let row = sqlx::query(&sql)
            .bind(payout.worker_id)
            .bind(payout.amount.minor_units())
            .bind(Utc::now())
            .fetch_one(&mut *self.tx)
            .await?;
        row.to_payout()
    }

    async fn find_payout(&mut self, id: i64) -> MarketResult<Option<Payout>> {
        let sql = queries::select_payout();
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(|r| r.to_payout()).transpose()
    }

    async fn finish_payout(
        &mut self,
        id: i64,
        status: PayoutStatus,
        signature: Option<&str>,
    ) -> MarketResult<bool> {
        if !status.is_terminal() {
            return Err(MarketError::validation_error(format!(
                "提现只能结束为终态: {status}"
            )));
        }
        let result = sqlx::query(queries::FINISH_PAYOUT)
            .bind(id)
            .bind(status.as_str())
            .bind(signature)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> MarketResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
