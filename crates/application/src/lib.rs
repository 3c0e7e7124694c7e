//! 市场引擎
//!
//! Funding verification, task allocation and payout settlement over a
//! [`LedgerStore`] and a [`SettlementNetwork`].

pub mod settings;
pub mod use_cases;

pub use settings::MarketSettings;
pub use use_cases::*;

use std::sync::Arc;

use mechaworks_domain::{LedgerStore, SettlementNetwork};

/// All engines wired to the same store and network.
pub struct Marketplace {
    pub accounts: AccountService,
    pub funding: FundingService,
    pub allocation: AllocationService,
    pub payouts: PayoutService,
    pub queries: LedgerQueryService,
    pub reconciliation: ReconciliationService,
}

impl Marketplace {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        network: Arc<dyn SettlementNetwork>,
        settings: MarketSettings,
    ) -> Self {
        Self {
            accounts: AccountService::new(store.clone()),
            funding: FundingService::new(store.clone(), network.clone(), settings.clone()),
            allocation: AllocationService::new(store.clone()),
            payouts: PayoutService::new(store.clone(), network, settings),
            queries: LedgerQueryService::new(store.clone()),
            reconciliation: ReconciliationService::new(store),
        }
    }
}
