//! Pseudo-random OHLC series with a chosen trend.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;
use crate::market::candle::Candle;
use crate::market::granularity::Granularity;

pub const DEFAULT_BASE_PRICE: f64 = 100.0;
pub const DEFAULT_VOLATILITY: f64 = 2.0;
/// Volatility of the sideways third of a mixed series.
const SIDEWAYS_VOLATILITY: f64 = 1.5;
/// Average per-candle drift, in percent, of the directional trends.
const TREND_BIAS: f64 = 0.5;

/// Overall direction of a generated series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Sideways,
    /// Thirds of up, down and sideways, each continuing from the previous close.
    #[default]
    Mixed,
}

impl std::str::FromStr for Trend {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Trend::Up),
            "down" => Ok(Trend::Down),
            "sideways" => Ok(Trend::Sideways),
            "mixed" => Ok(Trend::Mixed),
            other => Err(ReplayError::invalid_config("trend", format!("unknown trend '{other}'"))),
        }
    }
}

/// Seeded candle generator.
///
/// Every candle it emits satisfies `low <= min(open, close)` and
/// `high >= max(open, close)`; high and low are widened if a random draw
/// would break that.
pub struct CandleGenerator {
    rng: StdRng,
}

impl CandleGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates `count` candles starting at `start_ms`, one `granularity` step apart.
    pub fn generate(
        &mut self,
        start_ms: i64,
        count: usize,
        granularity: Granularity,
        trend: Trend,
        base_price: f64,
    ) -> Vec<Candle> {
        let step = granularity.step_ms();
        match trend {
            Trend::Up => self.uptrend(start_ms, count, step, base_price, DEFAULT_VOLATILITY),
            Trend::Down => self.downtrend(start_ms, count, step, base_price, DEFAULT_VOLATILITY),
            Trend::Sideways => self.sideways(start_ms, count, step, base_price, DEFAULT_VOLATILITY),
            Trend::Mixed => self.mixed(start_ms, count, step, base_price),
        }
    }

    fn uptrend(
        &mut self,
        start_ms: i64,
        count: usize,
        step: i64,
        base: f64,
        vol: f64,
    ) -> Vec<Candle> {
        let mut data = Vec::with_capacity(count);
        let mut price = base;

        for i in 0..count {
            price *= 1.0 + (TREND_BIAS + self.uniform(-vol / 2.0, vol)) / 100.0;
            let open = price;
            let high = open * (1.0 + self.uniform(0.0, 3.0) / 100.0);
            let low = open * (1.0 - self.uniform(0.0, 2.0) / 100.0);
            // closes lean towards the high
            let close = self.uniform(low + (high - low) * 0.4, high);
            let volume = self.uniform(1_000.0, 10_000.0).round() as u64;
            data.push(well_formed(start_ms + i as i64 * step, open, high, low, close, volume));
        }

        data
    }

    fn downtrend(
        &mut self,
        start_ms: i64,
        count: usize,
        step: i64,
        base: f64,
        vol: f64,
    ) -> Vec<Candle> {
        let mut data = Vec::with_capacity(count);
        let mut price = base;

        for i in 0..count {
            price *= 1.0 - (TREND_BIAS + self.uniform(-vol / 2.0, vol)) / 100.0;
            let open = price;
            let high = open * (1.0 + self.uniform(0.0, 2.0) / 100.0);
            let low = open * (1.0 - self.uniform(0.0, 3.0) / 100.0);
            // closes lean towards the low
            let close = self.uniform(low, low + (high - low) * 0.6);
            let volume = self.uniform(1_000.0, 10_000.0).round() as u64;
            data.push(well_formed(start_ms + i as i64 * step, open, high, low, close, volume));
        }

        data
    }

    fn sideways(
        &mut self,
        start_ms: i64,
        count: usize,
        step: i64,
        base: f64,
        vol: f64,
    ) -> Vec<Candle> {
        let mut data = Vec::with_capacity(count);
        let mut price = base;

        for i in 0..count {
            price *= 1.0 + self.uniform(-vol, vol) / 100.0;
            let open = price;
            let high = open * (1.0 + self.uniform(0.0, 2.0) / 100.0);
            let low = open * (1.0 - self.uniform(0.0, 2.0) / 100.0);
            let close = self.uniform(low, high);
            let volume = self.uniform(800.0, 8_000.0).round() as u64;
            data.push(well_formed(start_ms + i as i64 * step, open, high, low, close, volume));
        }

        data
    }

    fn mixed(&mut self, start_ms: i64, count: usize, step: i64, base: f64) -> Vec<Candle> {
        let first = count / 3;
        let second = count / 3;
        let third = count - first - second;

        let mut data = self.uptrend(start_ms, first, step, base, DEFAULT_VOLATILITY);

        let down_start = start_ms + first as i64 * step;
        let down_base = data.last().map_or(base, Candle::get_close);
        let down = self.downtrend(down_start, second, step, down_base, DEFAULT_VOLATILITY);
        let side_base = down.last().map_or(down_base, Candle::get_close);
        data.extend(down);

        let side_start = down_start + second as i64 * step;
        data.extend(self.sideways(side_start, third, step, side_base, SIDEWAYS_VOLATILITY));

        data
    }

    /// Uniform draw in `[min, max)`; returns `min` for an empty interval.
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        min + self.rng.r#gen::<f64>() * (max - min)
    }
}

fn well_formed(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Candle {
    let high = high.max(open).max(close);
    let low = low.min(open).min(close);
    Candle::new(timestamp, open, high, low, close).with_volume(volume)
}
