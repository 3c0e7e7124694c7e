pub mod accounts;
pub mod allocation;
pub mod funding;
pub mod ledger_queries;
pub mod payout;
pub mod reconciliation;

pub use accounts::*;
pub use allocation::*;
pub use funding::*;
pub use ledger_queries::*;
pub use payout::*;
pub use reconciliation::*;
