pub mod postgres_ledger_store;

pub use postgres_ledger_store::{PostgresLedgerStore, PostgresLedgerTransaction};
