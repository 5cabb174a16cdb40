//! Backend-neutral draw list for one chart frame.
//!
//! Vector, raster and GPU back-ends all draw the same [`Scene`]; only the
//! way they put it on screen differs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::chart::options::RenderOptions;
use crate::chart::projection::Projection;
use crate::market::candle::Candle;

const GRID_DIVISIONS: usize = 5;
const MAX_TIME_LABELS: usize = 10;
const FADE_WINDOW_MS: f64 = 60_000.0;
const MIN_OPACITY: f64 = 0.3;
const MIN_BODY_HEIGHT: f64 = 1.0;
pub const CURRENT_PRICE_COLOR: &str = "#ff9800";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridLine {
    pub y: f64,
    pub x1: f64,
    pub x2: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// Wick and body of one candle, in absolute chart pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleShape {
    pub timestamp: i64,
    pub wick_x: f64,
    pub wick_top: f64,
    pub wick_bottom: f64,
    pub body_x: f64,
    pub body_y: f64,
    pub body_width: f64,
    pub body_height: f64,
    pub up: bool,
    pub color: String,
    pub opacity: f64,
}

/// Horizontal line and label at the latest visible close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceMarker {
    pub price: f64,
    pub y: f64,
    pub x1: f64,
    pub x2: f64,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub grid: Vec<GridLine>,
    pub price_labels: Vec<Label>,
    pub time_labels: Vec<Label>,
    pub candles: Vec<CandleShape>,
    pub current_price: Option<PriceMarker>,
}

impl Scene {
    /// Neutral scene of the given size with nothing drawn.
    pub fn empty(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty() && self.grid.is_empty() && self.current_price.is_none()
    }

    /// Lays out `candles` for the frame described by `options`.
    ///
    /// While animating, candles after `options.current_timestamp` are left
    /// out. An empty slice yields an empty scene.
    pub fn build(candles: &[Candle], options: &RenderOptions) -> Self {
        let chart = &options.chart;
        let mut scene = Self::empty(chart.width, chart.height);

        let Some(projection) = Projection::compute(candles, chart) else {
            return scene;
        };
        let area = chart.draw_area();

        let (padded_min, padded_max) = projection.padded_range();
        let step = (padded_max - padded_min) / GRID_DIVISIONS as f64;
        for i in 0..=GRID_DIVISIONS {
            let price = padded_min + step * i as f64;
            let y = projection.y(price) + area.offset_y;
            if chart.show_grid {
                scene.grid.push(GridLine {
                    y,
                    x1: 0.0,
                    x2: area.width,
                    color: chart.grid_color.clone(),
                });
            }
            if chart.show_y_axis {
                scene.price_labels.push(Label {
                    x: area.offset_x - 10.0,
                    y: y + 4.0,
                    text: format!("{price:.2}"),
                });
            }
        }

        let label_every = (candles.len() / MAX_TIME_LABELS).max(1);
        for (index, candle) in candles.iter().enumerate() {
            let ts = candle.get_timestamp();
            if options.is_animating && ts > options.current_timestamp {
                continue;
            }

            let x = projection.x(index) + area.offset_x;
            let wick_x = x + chart.candle_width / 2.0;

            if chart.show_x_axis && index % label_every == 0 {
                scene.time_labels.push(Label {
                    x: wick_x,
                    y: chart.height - 10.0,
                    text: clock_label(ts),
                });
            }

            let up = candle.is_up();
            let (open, close) = (candle.get_open(), candle.get_close());
            let body_top = projection.y(open.max(close)) + area.offset_y;
            let body_bottom = projection.y(open.min(close)) + area.offset_y;

            scene.candles.push(CandleShape {
                timestamp: ts,
                wick_x,
                wick_top: projection.y(candle.get_high()) + area.offset_y,
                wick_bottom: projection.y(candle.get_low()) + area.offset_y,
                body_x: x,
                body_y: body_top,
                body_width: chart.candle_width,
                body_height: (body_bottom - body_top).max(MIN_BODY_HEIGHT),
                up,
                color: if up { chart.up_color.clone() } else { chart.down_color.clone() },
                opacity: fade_opacity(options, ts),
            });
        }

        let latest = candles
            .iter()
            .rev()
            .find(|c| c.get_timestamp() <= options.current_timestamp);
        if let Some(latest) = latest {
            let price = latest.get_close();
            scene.current_price = Some(PriceMarker {
                price,
                y: projection.y(price) + area.offset_y,
                x1: 0.0,
                x2: chart.width,
                label: format!("{price:.2}"),
                color: CURRENT_PRICE_COLOR.to_string(),
            });
        }

        scene
    }
}

fn fade_opacity(options: &RenderOptions, timestamp: i64) -> f64 {
    if !(options.is_animating && options.chart.fade_recent) {
        return 1.0;
    }
    let age = (options.current_timestamp - timestamp) as f64;
    if age < FADE_WINDOW_MS {
        (1.0 - age / FADE_WINDOW_MS).max(MIN_OPACITY)
    } else {
        1.0
    }
}

/// `HH:MM` in UTC.
fn clock_label(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::options::ChartOptions;

    const MINUTE: i64 = 60_000;

    fn candles() -> Vec<Candle> {
        vec![
            Candle::new(0, 10.0, 15.0, 9.0, 14.0),
            Candle::new(5 * MINUTE, 14.0, 16.0, 11.0, 12.0),
            Candle::new(10 * MINUTE, 12.0, 20.0, 12.0, 19.0),
        ]
    }

    fn render_options(current: i64, animating: bool) -> RenderOptions {
        RenderOptions::new(ChartOptions::default(), current, animating)
    }

    #[test]
    fn test_empty_input_gives_neutral_scene() {
        let scene = Scene::build(&[], &render_options(0, true));
        assert!(scene.is_empty());
        assert_eq!(scene.width, 1150.0);
    }

    #[test]
    fn test_future_candles_hidden_while_animating() {
        let scene = Scene::build(&candles(), &render_options(6 * MINUTE, true));
        let stamps: Vec<i64> = scene.candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![0, 5 * MINUTE]);

        let paused = Scene::build(&candles(), &render_options(6 * MINUTE, false));
        assert_eq!(paused.candles.len(), 3);
    }

    #[test]
    fn test_direction_colors() {
        let scene = Scene::build(&candles(), &render_options(i64::MAX, false));
        assert!(scene.candles[0].up);
        assert_eq!(scene.candles[0].color, "#26a69a");
        assert!(!scene.candles[1].up);
        assert_eq!(scene.candles[1].color, "#ef5350");
    }

    #[test]
    fn test_current_price_marker_tracks_latest_visible_close() {
        let scene = Scene::build(&candles(), &render_options(7 * MINUTE, true));
        let marker = scene.current_price.unwrap();
        assert_eq!(marker.price, 12.0);
        assert_eq!(marker.label, "12.00");
        assert_eq!(marker.x2, 1150.0);
    }

    #[test]
    fn test_grid_and_labels() {
        let scene = Scene::build(&candles(), &render_options(i64::MAX, false));
        assert_eq!(scene.grid.len(), 6);
        assert_eq!(scene.price_labels.len(), 6);
        assert_eq!(scene.time_labels.len(), 3);
        assert_eq!(scene.time_labels[1].text, "00:05");

        let mut hidden = render_options(i64::MAX, false);
        hidden.chart.show_grid = false;
        hidden.chart.show_x_axis = false;
        let scene = Scene::build(&candles(), &hidden);
        assert!(scene.grid.is_empty());
        assert!(scene.time_labels.is_empty());
        assert_eq!(scene.price_labels.len(), 6);
    }

    #[test]
    fn test_body_has_minimum_height() {
        let doji = vec![
            Candle::new(0, 10.0, 12.0, 8.0, 10.0),
            Candle::new(MINUTE, 9.0, 11.0, 9.0, 10.0),
        ];
        let scene = Scene::build(&doji, &render_options(i64::MAX, false));
        assert_eq!(scene.candles[0].body_height, 1.0);
    }

    #[test]
    fn test_recent_candles_fade_in() {
        let scene = Scene::build(&candles(), &render_options(10 * MINUTE + 30_000, true));
        let newest = scene.candles.last().unwrap();
        assert!((newest.opacity - 0.5).abs() < 1e-9);
        assert_eq!(scene.candles[0].opacity, 1.0);

        let just_arrived = Scene::build(&candles(), &render_options(10 * MINUTE, true));
        assert_eq!(just_arrived.candles.last().unwrap().opacity, 1.0);
    }
}
