pub mod config;
pub mod logging;

pub use config::*;
pub use logging::{init_from_config, init_logging};
