use std::time::Duration;

use mechaworks_domain::WalletAddress;
use serde::{Deserialize, Serialize};

/// 链上结算网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// JSON-RPC endpoint used to look up funding transactions
    pub rpc_url: String,
    /// custody signer that builds, signs and submits payout transfers
    pub signer_url: String,
    /// collects task funding and pays workers out
    pub platform_wallet: String,
    pub request_timeout_seconds: u64,
    /// bounded wait for a payout transfer; past it the outcome is unknown
    pub transfer_timeout_seconds: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            signer_url: "http://127.0.0.1:8899".to_string(),
            platform_wallet: "9isxjm1LY96pK8veLHYkHG72edjQ85A1qTbQjSFsfLC8".to_string(),
            request_timeout_seconds: 10,
            transfer_timeout_seconds: 60,
        }
    }
}

impl SettlementConfig {
    pub fn platform_wallet(&self) -> anyhow::Result<WalletAddress> {
        self.platform_wallet
            .parse()
            .map_err(|e| anyhow::anyhow!("平台钱包地址无效: {e}"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_seconds)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, url) in [("rpc_url", &self.rpc_url), ("signer_url", &self.signer_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(anyhow::anyhow!("{name} 必须是HTTP(S)地址: {url}"));
            }
        }

        self.platform_wallet()?;

        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }

        if self.transfer_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("转账超时时间必须大于0"));
        }

        Ok(())
    }
}
