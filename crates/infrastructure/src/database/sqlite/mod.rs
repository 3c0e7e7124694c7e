pub mod sqlite_ledger_store;

pub use sqlite_ledger_store::{SqliteLedgerStore, SqliteLedgerTransaction};
