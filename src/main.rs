use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mechaworks::cli::{self, Cli, Command};
use mechaworks_application::{MarketSettings, Marketplace};
use mechaworks_core::{config::models::AppConfig, init_from_config};
use mechaworks_infrastructure::{DatabaseManager, RpcSettlementNetwork};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.observability.log_format = format;
    }
    init_from_config(&config.observability)?;
    debug!("数据库: {}", config.database.url);

    let manager = DatabaseManager::new(&config.database).await?;

    let outcome = match cli.command {
        Command::Migrate => {
            manager.migrate().await?;
            info!("数据库迁移完成");
            Ok(serde_json::json!({ "migrated": true }))
        }
        command => {
            let network = RpcSettlementNetwork::new(
                config.settlement.rpc_url.clone(),
                config.settlement.signer_url.clone(),
                config.settlement.request_timeout(),
            )?;
            let settings = MarketSettings::from_config(&config)?;
            let market = Marketplace::new(manager.ledger_store(), Arc::new(network), settings);
            cli::execute(command, &market).await
        }
    };

    manager.close().await;

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(err) => {
            error!("命令执行失败: {err}");
            println!("{}", serde_json::to_string_pretty(&cli::error_body(&err))?);
            Err(err.into())
        }
    }
}
