//! 账本存储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则。
//!
//! Worker balances and task submission counts are the only shared mutable
//! state. Every write goes through a [`LedgerTransaction`], and each write
//! primitive is a single conditional statement so that the invariants hold
//! at read-committed isolation.

use async_trait::async_trait;
use mechaworks_errors::MarketResult;

use crate::entities::{
    NewPayout, NewSubmission, NewTask, OptionTally, Payout, PayoutStatus, Requester, Submission,
    Task, TaskAssignment, TaskOption, Worker,
};
use crate::value_objects::{Amount, RequesterId, WalletAddress, WorkerId};

/// 账本存储
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens an atomic unit of work. Dropping it without `commit` rolls back.
    async fn begin(&self) -> MarketResult<Box<dyn LedgerTransaction>>;

    async fn find_worker(&self, id: WorkerId) -> MarketResult<Option<Worker>>;
    async fn find_requester(&self, id: RequesterId) -> MarketResult<Option<Requester>>;

    /// Find-or-create by wallet address.
    async fn register_worker(&self, address: &WalletAddress) -> MarketResult<Worker>;
    async fn register_requester(&self, address: &WalletAddress) -> MarketResult<Requester>;

    /// Oldest task the worker has not submitted to and that still has room.
    async fn next_task_for_worker(&self, id: WorkerId) -> MarketResult<Option<TaskAssignment>>;
    async fn task_with_options(&self, task_id: i64) -> MarketResult<Option<TaskAssignment>>;
    async fn option_tallies(&self, task_id: i64) -> MarketResult<Vec<OptionTally>>;

    async fn find_payout(&self, id: i64) -> MarketResult<Option<Payout>>;
    async fn list_payouts(&self, status: PayoutStatus) -> MarketResult<Vec<Payout>>;
}

/// 单个账本事务
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Reads the worker row and holds it until the transaction ends.
    async fn lock_worker(&mut self, id: WorkerId) -> MarketResult<Option<Worker>>;
    async fn find_requester(&mut self, id: RequesterId) -> MarketResult<Option<Requester>>;

    async fn next_task_for_worker(&mut self, id: WorkerId) -> MarketResult<Option<Task>>;
    async fn task_options(&mut self, task_id: i64) -> MarketResult<Vec<TaskOption>>;

    /// Fails with `PaymentAlreadyUsed` when the funding signature was seen before.
    async fn insert_task(&mut self, task: &NewTask) -> MarketResult<Task>;
    async fn insert_options(
        &mut self,
        task_id: i64,
        image_urls: &[String],
    ) -> MarketResult<Vec<TaskOption>>;

    /// Takes one completion slot; `false` when the task is already full.
    async fn claim_task_slot(&mut self, task_id: i64) -> MarketResult<bool>;
    /// Insert-if-absent on (worker, task); `None` when the pair already exists.
    async fn insert_submission(
        &mut self,
        submission: &NewSubmission,
    ) -> MarketResult<Option<Submission>>;

    async fn credit_pending(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool>;
    /// pending -= amount, locked += amount; `false` if pending < amount.
    async fn reserve_pending(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool>;
    /// locked -= amount, pending += amount; `false` if locked < amount.
    async fn release_locked(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool>;

    async fn insert_payout(&mut self, payout: &NewPayout) -> MarketResult<Payout>;
    async fn find_payout(&mut self, id: i64) -> MarketResult<Option<Payout>>;
    /// Moves a payout out of `Processing`; `false` if it already left it.
    async fn finish_payout(
        &mut self,
        id: i64,
        status: PayoutStatus,
        signature: Option<&str>,
    ) -> MarketResult<bool>;

    async fn commit(self: Box<Self>) -> MarketResult<()>;
}
