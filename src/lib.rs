pub mod backtest;
pub mod config;
pub mod data;
pub mod deploy;
pub mod error;
pub mod monitor;
pub mod optimizer;
pub mod search;
pub mod types;

pub use error::{Result, TradeGridError};
