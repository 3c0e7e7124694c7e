pub mod manager;
pub mod mapping;
pub mod postgres;
pub mod queries;
pub mod sqlite;

pub use manager::{DatabaseManager, DatabasePool, DatabaseType};
pub use postgres::PostgresLedgerStore;
pub use sqlite::SqliteLedgerStore;
