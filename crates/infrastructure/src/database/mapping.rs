//! Row to entity mapping shared by the PostgreSQL and SQLite stores.

use mechaworks_domain::{
    Amount, OptionTally, Payout, Requester, Submission, Task, TaskOption, WalletAddress, Worker,
};
use mechaworks_errors::{MarketError, MarketResult};
use sqlx::Row;

pub trait LedgerRowExt {
    fn to_worker(&self) -> MarketResult<Worker>;
    fn to_requester(&self) -> MarketResult<Requester>;
    fn to_task(&self) -> MarketResult<Task>;
    fn to_task_option(&self) -> MarketResult<TaskOption>;
    fn to_option_tally(&self) -> MarketResult<OptionTally>;
    fn to_submission(&self) -> MarketResult<Submission>;
    fn to_payout(&self) -> MarketResult<Payout>;
}

fn parse_address(raw: String) -> MarketResult<WalletAddress> {
    raw.parse::<WalletAddress>()
        .map_err(|e| MarketError::database_error(format!("数据库中的钱包地址无效: {e}")))
}

macro_rules! impl_ledger_row {
    ($row:ty) => {
        impl LedgerRowExt for $row {
            fn to_worker(&self) -> MarketResult<Worker> {
                Ok(Worker {
                    id: self.try_get("id")?,
                    address: parse_address(self.try_get("address")?)?,
                    pending_amount: Amount::from_minor(self.try_get("pending_amount")?),
                    locked_amount: Amount::from_minor(self.try_get("locked_amount")?),
                })
            }

            fn to_requester(&self) -> MarketResult<Requester> {
                Ok(Requester {
                    id: self.try_get("id")?,
                    address: parse_address(self.try_get("address")?)?,
                })
            }

            fn to_task(&self) -> MarketResult<Task> {
                Ok(Task {
                    id: self.try_get("id")?,
                    requester_id: self.try_get("requester_id")?,
                    title: self.try_get("title")?,
                    amount: Amount::from_minor(self.try_get("amount")?),
                    completion_quota: self.try_get("completion_quota")?,
                    submission_count: self.try_get("submission_count")?,
                    signature: self.try_get("signature")?,
                    created_at: self.try_get("created_at")?,
                })
            }

            fn to_task_option(&self) -> MarketResult<TaskOption> {
                Ok(TaskOption {
                    id: self.try_get("id")?,
                    task_id: self.try_get("task_id")?,
                    image_url: self.try_get("image_url")?,
                })
            }

            fn to_option_tally(&self) -> MarketResult<OptionTally> {
                Ok(OptionTally {
                    option: self.to_task_option()?,
                    count: self.try_get("count")?,
                })
            }

            fn to_submission(&self) -> MarketResult<Submission> {
                Ok(Submission {
                    id: self.try_get("id")?,
                    worker_id: self.try_get("worker_id")?,
                    task_id: self.try_get("task_id")?,
                    option_id: self.try_get("option_id")?,
                    amount: Amount::from_minor(self.try_get("amount")?),
                    created_at: self.try_get("created_at")?,
                })
            }

            fn to_payout(&self) -> MarketResult<Payout> {
                let status: String = self.try_get("status")?;
                Ok(Payout {
                    id: self.try_get("id")?,
                    worker_id: self.try_get("worker_id")?,
                    amount: Amount::from_minor(self.try_get("amount")?),
                    status: status.parse()?,
                    signature: self.try_get("signature")?,
                    created_at: self.try_get("created_at")?,
                })
            }
        }
    };
}

impl_ledger_row!(sqlx::postgres::PgRow);
impl_ledger_row!(sqlx::sqlite::SqliteRow);

/// Maps a unique-constraint violation on the funding signature.
pub fn map_insert_task_error(err: sqlx::Error, signature: &str) -> MarketError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            MarketError::PaymentAlreadyUsed {
                signature: signature.to_string(),
            }
        }
        _ => MarketError::Database(err),
    }
}
