//! In-memory implementations of the ledger and settlement ports
//!
//! The in-memory ledger serialises transactions behind one async mutex and
//! applies a transaction's working copy only on commit, so dropped
//! transactions roll back exactly like the SQL stores.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mechaworks_domain::{
    Amount, LedgerStore, LedgerTransaction, NewPayout, NewSubmission, NewTask, OptionTally,
    Payout, PayoutStatus, Requester, RequesterId, SettlementNetwork, Submission, Task,
    TaskAssignment, TaskOption, TransactionDetails, TransferOutcome, WalletAddress, Worker,
    WorkerId,
};
use mechaworks_errors::{MarketError, MarketResult};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    pub requesters: BTreeMap<i64, Requester>,
    pub workers: BTreeMap<i64, Worker>,
    pub tasks: BTreeMap<i64, Task>,
    pub options: BTreeMap<i64, TaskOption>,
    pub submissions: BTreeMap<i64, Submission>,
    pub payouts: BTreeMap<i64, Payout>,
    last_id: i64,
}

impl LedgerState {
    fn allocate_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn options_of(&self, task_id: i64) -> Vec<TaskOption> {
        self.options
            .values()
            .filter(|o| o.task_id == task_id)
            .cloned()
            .collect()
    }

    fn has_submitted(&self, worker_id: i64, task_id: i64) -> bool {
        self.submissions
            .values()
            .any(|s| s.worker_id == worker_id && s.task_id == task_id)
    }

    fn next_task_for(&self, worker_id: i64) -> Option<Task> {
        self.tasks
            .values()
            .find(|t| !t.is_full() && !self.has_submitted(worker_id, t.id))
            .cloned()
    }

    fn assignment(&self, task: Task) -> TaskAssignment {
        let options = self.options_of(task.id);
        TaskAssignment { task, options }
    }

    fn register_worker(&mut self, address: &WalletAddress) -> Worker {
        if let Some(worker) = self.workers.values().find(|w| &w.address == address) {
            return worker.clone();
        }
        let worker = Worker {
            id: self.allocate_id(),
            address: address.clone(),
            pending_amount: Amount::ZERO,
            locked_amount: Amount::ZERO,
        };
        self.workers.insert(worker.id, worker.clone());
        worker
    }

    fn register_requester(&mut self, address: &WalletAddress) -> Requester {
        if let Some(requester) = self.requesters.values().find(|r| &r.address == address) {
            return requester.clone();
        }
        let requester = Requester {
            id: self.allocate_id(),
            address: address.clone(),
        };
        self.requesters.insert(requester.id, requester.clone());
        requester
    }

    fn insert_task(&mut self, task: &NewTask) -> MarketResult<Task> {
        if self.tasks.values().any(|t| t.signature == task.signature) {
            return Err(MarketError::PaymentAlreadyUsed {
                signature: task.signature.clone(),
            });
        }
        if !self.requesters.contains_key(&task.requester_id) {
            return Err(MarketError::database_error(format!(
                "外键约束失败: requester_id={}",
                task.requester_id
            )));
        }
        let row = Task {
            id: self.allocate_id(),
            requester_id: task.requester_id,
            title: task.title.clone(),
            amount: task.amount,
            completion_quota: task.completion_quota,
            submission_count: 0,
            signature: task.signature.clone(),
            created_at: Utc::now(),
        };
        self.tasks.insert(row.id, row.clone());
        Ok(row)
    }

    fn insert_options(&mut self, task_id: i64, image_urls: &[String]) -> Vec<TaskOption> {
        image_urls
            .iter()
            .map(|url| {
                let option = TaskOption {
                    id: self.allocate_id(),
                    task_id,
                    image_url: url.clone(),
                };
                self.options.insert(option.id, option.clone());
                option
            })
            .collect()
    }
}

/// 内存账本存储
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<AsyncMutex<LedgerState>>,
    /// remaining successful `begin` calls; negative means unlimited
    begin_budget: Arc<AtomicI64>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AsyncMutex::new(LedgerState::default())),
            begin_budget: Arc::new(AtomicI64::new(-1)),
        }
    }

    /// After `n` more successful transactions, `begin` fails until reset.
    pub fn fail_begin_after(&self, n: i64) {
        self.begin_budget.store(n, Ordering::SeqCst);
    }

    pub fn reset_faults(&self) {
        self.begin_budget.store(-1, Ordering::SeqCst);
    }

    pub async fn seed_requester(&self, address: &WalletAddress) -> Requester {
        self.state.lock().await.register_requester(address)
    }

    pub async fn seed_worker(&self, address: &WalletAddress, pending: Amount) -> Worker {
        let mut state = self.state.lock().await;
        let mut worker = state.register_worker(address);
        worker.pending_amount = pending;
        state.workers.insert(worker.id, worker.clone());
        worker
    }

    pub async fn seed_task(
        &self,
        requester_id: i64,
        amount: Amount,
        completion_quota: i32,
        image_urls: &[&str],
    ) -> TaskAssignment {
        let mut state = self.state.lock().await;
        let signature = format!("seed-{}", state.last_id + 1);
        let task = match state.insert_task(&NewTask {
            requester_id,
            title: "seeded task".to_string(),
            amount,
            completion_quota,
            signature,
        }) {
            Ok(task) => task,
            Err(e) => panic!("无法写入测试任务: {e}"),
        };
        let urls: Vec<String> = image_urls.iter().map(|u| u.to_string()).collect();
        let options = state.insert_options(task.id, &urls);
        TaskAssignment { task, options }
    }

    pub async fn worker(&self, id: i64) -> Option<Worker> {
        self.state.lock().await.workers.get(&id).cloned()
    }

    pub async fn task(&self, id: i64) -> Option<Task> {
        self.state.lock().await.tasks.get(&id).cloned()
    }

    pub async fn payouts(&self) -> Vec<Payout> {
        self.state.lock().await.payouts.values().cloned().collect()
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.state.lock().await.submissions.values().cloned().collect()
    }

    pub async fn task_count(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    fn take_begin_permit(&self) -> MarketResult<()> {
        let result = self
            .begin_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                b if b < 0 => Some(b),
                0 => None,
                b => Some(b - 1),
            });
        result
            .map(|_| ())
            .map_err(|_| MarketError::database_error("模拟的数据库故障: 无法开启事务"))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> MarketResult<Box<dyn LedgerTransaction>> {
        self.take_begin_permit()?;
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryLedgerTransaction { guard, working }))
    }

    async fn find_worker(&self, id: WorkerId) -> MarketResult<Option<Worker>> {
        Ok(self.state.lock().await.workers.get(&id.0).cloned())
    }

    async fn find_requester(&self, id: RequesterId) -> MarketResult<Option<Requester>> {
        Ok(self.state.lock().await.requesters.get(&id.0).cloned())
    }

    async fn register_worker(&self, address: &WalletAddress) -> MarketResult<Worker> {
        Ok(self.state.lock().await.register_worker(address))
    }

    async fn register_requester(&self, address: &WalletAddress) -> MarketResult<Requester> {
        Ok(self.state.lock().await.register_requester(address))
    }

    async fn next_task_for_worker(&self, id: WorkerId) -> MarketResult<Option<TaskAssignment>> {
        let state = self.state.lock().await;
        Ok(state.next_task_for(id.0).map(|task| state.assignment(task)))
    }

    async fn task_with_options(&self, task_id: i64) -> MarketResult<Option<TaskAssignment>> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .get(&task_id)
            .cloned()
            .map(|task| state.assignment(task)))
    }

    async fn option_tallies(&self, task_id: i64) -> MarketResult<Vec<OptionTally>> {
        let state = self.state.lock().await;
        Ok(state
            .options_of(task_id)
            .into_iter()
            .map(|option| {
                let count = state
                    .submissions
                    .values()
                    .filter(|s| s.option_id == option.id)
                    .count() as i64;
                OptionTally { option, count }
            })
            .collect())
    }

    async fn find_payout(&self, id: i64) -> MarketResult<Option<Payout>> {
        Ok(self.state.lock().await.payouts.get(&id).cloned())
    }

    async fn list_payouts(&self, status: PayoutStatus) -> MarketResult<Vec<Payout>> {
        Ok(self
            .state
            .lock()
            .await
            .payouts
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect())
    }
}

pub struct InMemoryLedgerTransaction {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
}

#[async_trait]
impl LedgerTransaction for InMemoryLedgerTransaction {
    async fn lock_worker(&mut self, id: WorkerId) -> MarketResult<Option<Worker>> {
        Ok(self.working.workers.get(&id.0).cloned())
    }

    async fn find_requester(&mut self, id: RequesterId) -> MarketResult<Option<Requester>> {
        Ok(self.working.requesters.get(&id.0).cloned())
    }

    async fn next_task_for_worker(&mut self, id: WorkerId) -> MarketResult<Option<Task>> {
        Ok(self.working.next_task_for(id.0))
    }

    async fn task_options(&mut self, task_id: i64) -> MarketResult<Vec<TaskOption>> {
        Ok(self.working.options_of(task_id))
    }

    async fn insert_task(&mut self, task: &NewTask) -> MarketResult<Task> {
        self.working.insert_task(task)
    }

    async fn insert_options(
        &mut self,
        task_id: i64,
        image_urls: &[String],
    ) -> MarketResult<Vec<TaskOption>> {
        Ok(self.working.insert_options(task_id, image_urls))
    }

    async fn claim_task_slot(&mut self, task_id: i64) -> MarketResult<bool> {
        match self.working.tasks.get_mut(&task_id) {
            Some(task) if !task.is_full() => {
                task.submission_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_submission(
        &mut self,
        submission: &NewSubmission,
    ) -> MarketResult<Option<Submission>> {
        if self
            .working
            .has_submitted(submission.worker_id, submission.task_id)
        {
            return Ok(None);
        }
        let row = Submission {
            id: self.working.allocate_id(),
            worker_id: submission.worker_id,
            task_id: submission.task_id,
            option_id: submission.option_id,
            amount: submission.amount,
            created_at: Utc::now(),
        };
        self.working.submissions.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn credit_pending(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool> {
        let Some(worker) = self.working.workers.get_mut(&id.0) else {
            return Ok(false);
        };
        worker.pending_amount = worker
            .pending_amount
            .checked_add(amount)
            .ok_or_else(|| MarketError::database_error("余额溢出"))?;
        Ok(true)
    }

    async fn reserve_pending(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool> {
        match self.working.workers.get_mut(&id.0) {
            Some(worker) if worker.pending_amount >= amount => {
                worker.pending_amount = Amount::from_minor(
                    worker.pending_amount.minor_units() - amount.minor_units(),
                );
                worker.locked_amount = Amount::from_minor(
                    worker.locked_amount.minor_units() + amount.minor_units(),
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_locked(&mut self, id: WorkerId, amount: Amount) -> MarketResult<bool> {
        match self.working.workers.get_mut(&id.0) {
            Some(worker) if worker.locked_amount >= amount => {
                worker.locked_amount = Amount::from_minor(
                    worker.locked_amount.minor_units() - amount.minor_units(),
                );
                worker.pending_amount = Amount::from_minor(
                    worker.pending_amount.minor_units() + amount.minor_units(),
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_payout(&mut self, payout: &NewPayout) -> MarketResult<Payout> {
        let row = Payout {
            id: self.working.allocate_id(),
            worker_id: payout.worker_id,
            amount: payout.amount,
            status: PayoutStatus::Processing,
            signature: None,
            created_at: Utc::now(),
        };
        self.working.payouts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_payout(&mut self, id: i64) -> MarketResult<Option<Payout>> {
        Ok(self.working.payouts.get(&id).cloned())
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
        match self.working.payouts.get_mut(&id) {
            Some(payout) if payout.status == PayoutStatus::Processing => {
                payout.status = status;
                payout.signature = signature.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit(self: Box<Self>) -> MarketResult<()> {
        let InMemoryLedgerTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

/// 一次被记录的转账请求
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTransfer {
    pub from: String,
    pub to: String,
    pub lamports: u64,
}

/// 可编排结果的结算网络
///
/// Transfers pop queued outcomes; an empty queue confirms with a generated
/// signature.
#[derive(Default)]
pub struct ScriptedSettlementNetwork {
    transactions: Mutex<HashMap<String, TransactionDetails>>,
    outcomes: Mutex<VecDeque<TransferOutcome>>,
    transfers: Mutex<Vec<RecordedTransfer>>,
    transfer_delay: Option<Duration>,
    lookup_delay: Option<Duration>,
}

impl ScriptedSettlementNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transaction(self, details: TransactionDetails) -> Self {
        self.add_transaction(details);
        self
    }

    pub fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = Some(delay);
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    pub fn add_transaction(&self, details: TransactionDetails) {
        self.transactions
            .lock()
            .unwrap()
            .insert(details.signature.clone(), details);
    }

    pub fn push_outcome(&self, outcome: TransferOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn transfers(&self) -> Vec<RecordedTransfer> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementNetwork for ScriptedSettlementNetwork {
    async fn lookup_transaction(
        &self,
        signature: &str,
    ) -> MarketResult<Option<TransactionDetails>> {
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }

    async fn transfer(
        &self,
        from: &WalletAddress,
        to: &WalletAddress,
        lamports: u64,
    ) -> TransferOutcome {
        let sequence = {
            let mut transfers = self.transfers.lock().unwrap();
            transfers.push(RecordedTransfer {
                from: from.to_string(),
                to: to.to_string(),
                lamports,
            });
            transfers.len()
        };
        if let Some(delay) = self.transfer_delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| TransferOutcome::Confirmed(format!("transfer-{sequence}")))
    }
}
