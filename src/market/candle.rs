//! Candle (OHLCV) sample with timestamp

use serde::{Deserialize, Serialize};

/// One time-bucketed OHLC price sample.
///
/// The timestamp is Unix time in milliseconds (candle open time). Within a
/// sequence timestamps are strictly increasing, and candles are never
/// mutated once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    volume: Option<u64>,
}

impl Candle {
    /// Creates a new Candle without volume.
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Returns the candle's timestamp (Unix time in milliseconds).
    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_open(&self) -> f64 {
        self.open
    }

    pub fn get_high(&self) -> f64 {
        self.high
    }

    pub fn get_low(&self) -> f64 {
        self.low
    }

    pub fn get_close(&self) -> f64 {
        self.close
    }

    pub fn get_volume(&self) -> Option<u64> {
        self.volume
    }

    /// Returns the body size (close - open).
    pub fn body(&self) -> f64 {
        self.close - self.open
    }

    /// Returns the full range of the candle (high - low).
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Distance from the high to the top of the body.
    pub fn upper_wick(&self) -> f64 {
        self.high - self.close.max(self.open)
    }

    /// Distance from the bottom of the body to the low.
    pub fn lower_wick(&self) -> f64 {
        self.close.min(self.open) - self.low
    }

    /// Returns true when the candle draws in the "up" color (close >= open).
    ///
    /// An unchanged candle counts as up.
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }

    /// Returns true if `low <= min(open, close)` and `high >= max(open, close)`.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}
