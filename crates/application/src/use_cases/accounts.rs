use std::sync::Arc;

use mechaworks_domain::{LedgerStore, Requester, WalletAddress, Worker};
use mechaworks_errors::MarketResult;
use tracing::{info, instrument};

/// 身份登记服务
///
/// Workers and requesters are keyed by wallet address and created on first
/// sign-in. Proving ownership of the address happens before this layer.
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn register_worker(&self, address: &str) -> MarketResult<Worker> {
        let address: WalletAddress = address.parse()?;
        let worker = self.store.register_worker(&address).await?;
        info!("Worker已登记: id={}, address={}", worker.id, worker.address);
        Ok(worker)
    }

    #[instrument(skip(self))]
    pub async fn register_requester(&self, address: &str) -> MarketResult<Requester> {
        let address: WalletAddress = address.parse()?;
        let requester = self.store.register_requester(&address).await?;
        info!("发布者已登记: id={}, address={}", requester.id, requester.address);
        Ok(requester)
    }
}
