//! 领域实体
//!
//! Ledger rows as the engines see them. Money is always [`Amount`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use mechaworks_errors::MarketError;

use crate::value_objects::{Amount, RequesterId, WalletAddress, WorkerId};

/// 任务发布者
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requester {
    pub id: i64,
    pub address: WalletAddress,
}

impl Requester {
    pub fn requester_id(&self) -> RequesterId {
        RequesterId(self.id)
    }
}

/// 完成任务并领取报酬的Worker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worker {
    pub id: i64,
    pub address: WalletAddress,
    /// earned, not yet reserved for a payout
    pub pending_amount: Amount,
    /// reserved for an in-flight or completed payout
    pub locked_amount: Amount,
}

impl Worker {
    pub fn worker_id(&self) -> WorkerId {
        WorkerId(self.id)
    }

    pub fn balance(&self) -> Balance {
        Balance {
            pending: self.pending_amount,
            locked: self.locked_amount,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Balance {
    pub pending: Amount,
    pub locked: Amount,
}

/// 由发布者付费创建的任务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub requester_id: i64,
    pub title: String,
    /// total funded amount
    pub amount: Amount,
    pub completion_quota: i32,
    pub submission_count: i32,
    /// funding transaction signature, unique across tasks
    pub signature: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Reward credited to a worker for one submission.
    pub fn reward_per_submission(&self) -> Amount {
        self.amount.share_of(self.completion_quota)
    }

    pub fn is_full(&self) -> bool {
        self.submission_count >= self.completion_quota
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOption {
    pub id: i64,
    pub task_id: i64,
    pub image_url: String,
}

/// A task together with its options, as handed to a worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskAssignment {
    pub task: Task,
    pub options: Vec<TaskOption>,
}

impl TaskAssignment {
    pub fn id(&self) -> i64 {
        self.task.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub requester_id: i64,
    pub title: String,
    pub amount: Amount,
    pub completion_quota: i32,
    pub signature: String,
}

/// 一个Worker对一个任务的唯一一次提交
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub worker_id: i64,
    pub task_id: i64,
    pub option_id: i64,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSubmission {
    pub worker_id: i64,
    pub task_id: i64,
    pub option_id: i64,
    pub amount: Amount,
}

/// Submission count for one option of a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionTally {
    pub option: TaskOption,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResults {
    pub task: Task,
    pub tallies: Vec<OptionTally>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PayoutStatus {
    Processing,
    Success,
    Failure,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Processing => "Processing",
            PayoutStatus::Success => "Success",
            PayoutStatus::Failure => "Failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Processing)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Processing" => Ok(PayoutStatus::Processing),
            "Success" => Ok(PayoutStatus::Success),
            "Failure" => Ok(PayoutStatus::Failure),
            other => Err(MarketError::Serialization(format!(
                "未知的提现状态: {other}"
            ))),
        }
    }
}

/// 一次结算尝试的记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payout {
    pub id: i64,
    pub worker_id: i64,
    pub amount: Amount,
    pub status: PayoutStatus,
    /// settlement transaction signature, empty until known
    pub signature: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPayout {
    pub worker_id: i64,
    pub amount: Amount,
}
