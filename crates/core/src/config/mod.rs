//! 配置管理
//!
//! 配置按以下顺序加载，后者覆盖前者:
//!
//! 1. 内置默认值
//! 2. TOML 配置文件
//! 3. 环境变量 (`MECHAWORKS_<SECTION>__<KEY>`)

pub mod models;


pub use models::*;
