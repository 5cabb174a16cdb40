//! Candle replay: a simulated-time playback clock driving a candlestick chart
//! over mock market data.

pub mod chart;
pub mod config;
pub mod error;
pub mod market;
pub mod playback;
pub mod replay;

pub use config::AppConfig;
pub use error::{ReplayError, Result};
