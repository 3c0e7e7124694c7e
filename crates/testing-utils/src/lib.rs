//! # Mechaworks Testing Utils
//!
//! Shared test doubles for the marketplace crates.
//!
//! - **InMemoryLedgerStore**: transactional in-memory [`LedgerStore`](mechaworks_domain::LedgerStore)
//!   with fault injection
//! - **ScriptedSettlementNetwork**: settlement network whose transfer outcomes
//!   are queued by the test
//! - **Builders**: funding transactions and ledger fixtures
//!
//! ```toml
//! [dev-dependencies]
//! mechaworks-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
