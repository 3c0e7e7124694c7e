use std::time::Duration;

use mechaworks_core::config::models::AppConfig;
use mechaworks_domain::{Amount, CurrencyScale, WalletAddress};
use mechaworks_errors::{MarketError, MarketResult};

/// 引擎运行参数
///
/// Resolved once from [`AppConfig`] so the engines never touch raw config.
#[derive(Debug, Clone)]
pub struct MarketSettings {
    /// collection wallet for funding, source wallet for payouts
    pub platform_wallet: WalletAddress,
    pub scale: CurrencyScale,
    pub completion_quota: i32,
    pub task_price: Amount,
    pub default_title: String,
    pub transfer_timeout: Duration,
    pub lookup_timeout: Duration,
}

impl MarketSettings {
    pub fn from_config(config: &AppConfig) -> MarketResult<Self> {
        let platform_wallet = config
            .settlement
            .platform_wallet()
            .map_err(|e| MarketError::config_error(e.to_string()))?;

        let settings = Self {
            platform_wallet,
            scale: config.market.currency_scale(),
            completion_quota: config.market.completion_quota,
            task_price: config.market.task_price(),
            default_title: config.market.default_title.clone(),
            transfer_timeout: config.settlement.transfer_timeout(),
            lookup_timeout: config.settlement.request_timeout(),
        };
        settings.funding_lamports()?;
        Ok(settings)
    }

    /// Lamports a requester must send to fund one task.
    pub fn funding_lamports(&self) -> MarketResult<u64> {
        self.scale.to_lamports(self.task_price).ok_or_else(|| {
            MarketError::config_error(format!("任务价格超出链上金额范围: {}", self.task_price))
        })
    }
}
