use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    database::DatabaseConfig, market::MarketConfig, observability::ObservabilityConfig,
    settlement::SettlementConfig,
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub settlement: SettlementConfig,
    pub market: MarketConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (`MECHAWORKS_<SECTION>__<KEY>`)
    ///
    /// # Arguments
    ///
    /// * `config_path` - Config file path, if None use default paths
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Self::with_defaults(ConfigBuilder::builder())?;

        // 1. Load config file if provided
        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/mechaworks.toml",
                "mechaworks.toml",
                "/etc/mechaworks/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        // 2. Environment variable overrides - highest priority
        builder = builder.add_source(
            Environment::with_prefix("MECHAWORKS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let d = AppConfig::default();
        Ok(builder
            .set_default("database.url", d.database.url)?
            .set_default("database.max_connections", i64::from(d.database.max_connections))?
            .set_default("database.min_connections", i64::from(d.database.min_connections))?
            .set_default(
                "database.connection_timeout_seconds",
                d.database.connection_timeout_seconds as i64,
            )?
            .set_default("database.run_migrations", d.database.run_migrations)?
            .set_default("settlement.rpc_url", d.settlement.rpc_url)?
            .set_default("settlement.signer_url", d.settlement.signer_url)?
            .set_default("settlement.platform_wallet", d.settlement.platform_wallet)?
            .set_default(
                "settlement.request_timeout_seconds",
                d.settlement.request_timeout_seconds as i64,
            )?
            .set_default(
                "settlement.transfer_timeout_seconds",
                d.settlement.transfer_timeout_seconds as i64,
            )?
            .set_default("market.total_decimals", d.market.total_decimals)?
            .set_default("market.lamports_per_unit", d.market.lamports_per_unit as i64)?
            .set_default("market.completion_quota", i64::from(d.market.completion_quota))?
            .set_default("market.task_price", d.market.task_price)?
            .set_default("market.default_title", d.market.default_title)?
            .set_default("observability.log_level", d.observability.log_level)?
            .set_default("observability.log_format", d.observability.log_format)?)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.settlement.validate().context("结算网络配置验证失败")?;
        self.market.validate().context("市场参数配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}
