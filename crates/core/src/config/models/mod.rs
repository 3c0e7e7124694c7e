pub mod app_config;
pub mod database;
pub mod market;
pub mod observability;
pub mod settlement;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use database::DatabaseConfig;
pub use market::MarketConfig;
pub use observability::ObservabilityConfig;
pub use settlement::SettlementConfig;
