//! Data-space to screen-space mapping for a window of candles.

use crate::chart::options::ChartOptions;
use crate::market::candle::Candle;

/// Fraction of the price range added above the highest high and below the lowest low.
pub const PRICE_PADDING: f64 = 0.05;
/// Relative range assumed for a flat window (every price identical).
const FLAT_RANGE_RATIO: f64 = 0.01;

/// Linear price scale plus fixed-pitch index scale.
///
/// A projection is only valid for the exact candles and layout it was
/// computed from; check [`Projection::is_current_for`] before reusing one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    min_price: f64,
    max_price: f64,
    padded_min: f64,
    padded_max: f64,
    draw_height: f64,
    pitch: f64,
    // inputs, for staleness checks
    candle_count: usize,
    first_timestamp: i64,
    last_timestamp: i64,
    layout: (f64, f64, f64),
}

impl Projection {
    /// Returns `None` for an empty slice: there is nothing to draw.
    pub fn compute(candles: &[Candle], options: &ChartOptions) -> Option<Self> {
        let first = candles.first()?;
        let last = candles.last()?;

        let (min_price, max_price) = candles.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(min, max), c| (min.min(c.get_low()), max.max(c.get_high())),
        );

        let mut range = max_price - min_price;
        if range <= 0.0 {
            range = flat_range(min_price);
        }

        let area = options.draw_area();
        Some(Self {
            min_price,
            max_price,
            padded_min: min_price - range * PRICE_PADDING,
            padded_max: max_price + range * PRICE_PADDING,
            draw_height: area.height,
            pitch: options.candle_pitch(),
            candle_count: candles.len(),
            first_timestamp: first.get_timestamp(),
            last_timestamp: last.get_timestamp(),
            layout: (options.width, options.height, options.candle_pitch()),
        })
    }

    /// Left edge of the candle at `index`, relative to the plot area.
    pub fn x(&self, index: usize) -> f64 {
        index as f64 * self.pitch
    }

    /// Vertical pixel for `price`, relative to the plot area; higher prices sit nearer the top.
    pub fn y(&self, price: f64) -> f64 {
        self.draw_height
            - (price - self.padded_min) / (self.padded_max - self.padded_min) * self.draw_height
    }

    /// Unpadded lowest low and highest high.
    pub fn price_range(&self) -> (f64, f64) {
        (self.min_price, self.max_price)
    }

    /// Price bounds mapped to the bottom and top of the plot.
    pub fn padded_range(&self) -> (f64, f64) {
        (self.padded_min, self.padded_max)
    }

    pub fn total_width(&self) -> f64 {
        self.candle_count as f64 * self.pitch
    }

    pub fn draw_height(&self) -> f64 {
        self.draw_height
    }

    /// True if this projection was computed from these candles and this layout.
    ///
    /// Candle sequences are append-only, so count plus end timestamps identify one.
    pub fn is_current_for(&self, candles: &[Candle], options: &ChartOptions) -> bool {
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return false;
        };
        self.candle_count == candles.len()
            && self.first_timestamp == first.get_timestamp()
            && self.last_timestamp == last.get_timestamp()
            && self.layout == (options.width, options.height, options.candle_pitch())
            && self.draw_height == options.draw_area().height
    }
}

fn flat_range(price: f64) -> f64 {
    let range = price.abs() * FLAT_RANGE_RATIO;
    if range > 0.0 { range } else { 1.0 }
}

/// Candles at or before `simulated_time`, in input order.
///
/// `candles` must be sorted ascending by timestamp, which every data source
/// guarantees; the result is then a prefix of the input.
pub fn visible_subset(candles: &[Candle], simulated_time: i64) -> &[Candle] {
    debug_assert!(
        candles.windows(2).all(|w| w[0].get_timestamp() < w[1].get_timestamp()),
        "candles must be strictly increasing by timestamp"
    );
    let end = candles.partition_point(|c| c.get_timestamp() <= simulated_time);
    &candles[..end]
}
