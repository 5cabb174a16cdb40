//! One replay view: loads a candle window, follows the playback clock and
//! draws the visible part through a [`ChartRenderer`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chart::options::{ChartOptions, RenderOptions};
use crate::chart::projection::visible_subset;
use crate::chart::renderer::ChartRenderer;
use crate::error::ReplayError;
use crate::market::candle::Candle;
use crate::market::granularity::Granularity;
use crate::market::mock_source::DataSource;
use crate::playback::config::PlaybackConfig;

const NO_DATA_MESSAGE: &str = "No candles available for the requested time range.";

/// Inclusive simulated-time bounds of the loaded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// First and last timestamp of `candles`.
    pub fn from_candles(candles: &[Candle]) -> Result<Self, ReplayError> {
        match (candles.first(), candles.last()) {
            (Some(first), Some(last)) => Ok(Self {
                start: first.get_timestamp(),
                end: last.get_timestamp(),
            }),
            _ => Err(ReplayError::EmptyWindow),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end - self.start
    }

    /// Whole-number percentage of the window elapsed at `time`; 0 for a
    /// zero-length window.
    pub fn progress_percent(&self, time: i64) -> u32 {
        let duration = self.duration_ms();
        if duration <= 0 {
            return 0;
        }
        let ratio = (time - self.start) as f64 / duration as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Loading,
    Failed(String),
    Ready,
}

/// Identifies one load request. Only the most recent ticket may apply a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

/// Values behind the info panel shown next to the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayInfo {
    /// `YYYY-MM-DD` of the simulated time, UTC.
    pub date: String,
    /// `HH:MM:SS` of the simulated time, UTC.
    pub time: String,
    pub visible: usize,
    pub total: usize,
    pub progress_percent: u32,
    pub fps: u32,
}

#[derive(Debug)]
pub struct ReplaySession<R: ChartRenderer> {
    renderer: R,
    chart: ChartOptions,
    state: LoadState,
    candles: Vec<Candle>,
    window: Option<TimeWindow>,
    simulated_time: Option<i64>,
    visible: usize,
    fps: u32,
    generation: u64,
    disposed: bool,
}

impl<R: ChartRenderer> ReplaySession<R> {
    /// `renderer` must already be initialised.
    pub fn new(renderer: R, chart: ChartOptions) -> Self {
        Self {
            renderer,
            chart,
            state: LoadState::Loading,
            candles: Vec::new(),
            window: None,
            simulated_time: None,
            visible: 0,
            fps: 0,
            generation: 0,
            disposed: false,
        }
    }

    /// Marks the session as loading and invalidates every earlier ticket.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.state = LoadState::Loading;
        LoadTicket(self.generation)
    }

    /// Applies the outcome of the request identified by `ticket`.
    ///
    /// Returns `false` and changes nothing when a newer load has begun or the
    /// session was torn down in the meantime.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Candle>, ReplayError>,
    ) -> bool {
        if self.disposed || ticket.0 != self.generation {
            debug!(ticket = ticket.0, current = self.generation, "Discarding stale load result");
            return false;
        }

        let candles = match result {
            Ok(candles) if !candles.is_empty() => candles,
            Ok(_) => {
                warn!("Data source returned no candles");
                self.state = LoadState::Failed(NO_DATA_MESSAGE.to_string());
                return true;
            }
            Err(err) => {
                warn!(error = %err, "Candle load failed");
                self.state = LoadState::Failed(err.to_string());
                return true;
            }
        };

        // non-empty, so a window always exists
        let Ok(window) = TimeWindow::from_candles(&candles) else {
            self.state = LoadState::Failed(NO_DATA_MESSAGE.to_string());
            return true;
        };
        info!(
            candles = candles.len(),
            start = window.start,
            end = window.end,
            "Replay data loaded"
        );

        self.candles = candles;
        self.window = Some(window);
        self.simulated_time = Some(window.start);
        self.visible = visible_subset(&self.candles, window.start).len();
        self.state = LoadState::Ready;
        true
    }

    /// Fetches `[start, end]` from `source` and applies it.
    pub async fn load<S: DataSource>(
        &mut self,
        source: &S,
        start: i64,
        end: i64,
        granularity: Granularity,
    ) -> Result<TimeWindow, ReplayError> {
        let ticket = self.begin_load();
        debug!(source = source.name(), start, end, %granularity, "Requesting replay data");
        let result = source
            .fetch_by_time_range(start, end, granularity)
            .await
            .into_result();
        self.finish_load(ticket, result);

        match &self.state {
            LoadState::Ready => self.window.ok_or(ReplayError::EmptyWindow),
            LoadState::Failed(message) => Err(ReplayError::data_unavailable(message.clone())),
            LoadState::Loading => Err(ReplayError::data_unavailable("load superseded")),
        }
    }

    /// Moves to `simulated_time` and draws the candles visible at that moment.
    ///
    /// Does nothing until data is ready or after teardown.
    pub fn on_frame(&mut self, simulated_time: i64, is_animating: bool) -> Result<(), ReplayError> {
        if self.disposed || self.state != LoadState::Ready {
            return Ok(());
        }
        self.simulated_time = Some(simulated_time);
        self.draw(simulated_time, is_animating)
    }

    /// Latest measured frame rate, shown in [`ReplayInfo`].
    pub fn set_fps(&mut self, fps: u32) {
        self.fps = fps;
    }

    /// Info panel values, once data is loaded.
    pub fn info(&self) -> Option<ReplayInfo> {
        let window = self.window?;
        let time = self.simulated_time?;
        let at = DateTime::<Utc>::from_timestamp_millis(time)?;

        Some(ReplayInfo {
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            visible: self.visible,
            total: self.candles.len(),
            progress_percent: window.progress_percent(time),
            fps: self.fps,
        })
    }

    /// Back to the window start, redrawn as paused.
    pub fn reset(&mut self) -> Result<(), ReplayError> {
        let Some(window) = self.window else {
            return Ok(());
        };
        self.simulated_time = Some(window.start);
        if self.disposed {
            return Ok(());
        }
        self.draw(window.start, false)
    }

    /// Destroys the renderer. Later loads and frames are ignored.
    pub fn teardown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.renderer.destroy();
        debug!(renderer = self.renderer.name(), "Replay session torn down");
    }

    /// `base` bounded to the loaded window. Leaves the running state to the
    /// caller, so it can also retune a clock that is already playing.
    pub fn playback_config(&self, base: &PlaybackConfig) -> Option<PlaybackConfig> {
        self.window.map(|window| PlaybackConfig {
            start_timestamp: Some(window.start),
            end_timestamp: Some(window.end),
            enabled: None,
            ..base.clone()
        })
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.window
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn simulated_time(&self) -> Option<i64> {
        self.simulated_time
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    fn draw(&mut self, simulated_time: i64, is_animating: bool) -> Result<(), ReplayError> {
        let visible = visible_subset(&self.candles, simulated_time);
        self.visible = visible.len();
        let options = RenderOptions::new(self.chart.clone(), simulated_time, is_animating);
        self.renderer.render(visible, &options)
    }
}
