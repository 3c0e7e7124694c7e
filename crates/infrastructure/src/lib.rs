pub mod database;
pub mod settlement;

pub use database::*;
pub use settlement::*;
