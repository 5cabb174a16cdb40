use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// Playback settings read fresh by the clock on every tick.
///
/// Replacing the configuration never restarts the tick loop; a new speed
/// applies from the next accepted tick onward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaybackConfig {
    /// Maximum callback rate. `None` calls back on every accepted tick.
    pub fps_limit: Option<f64>,
    /// Simulated start time (epoch ms). `None` starts from the first tick's wall time.
    pub start_timestamp: Option<i64>,
    /// Simulated end time (epoch ms). `None` plays forever.
    pub end_timestamp: Option<i64>,
    #[serde(rename = "loop")]
    pub loop_playback: bool,
    /// Simulated milliseconds per wall-clock millisecond.
    pub speed: f64,
    /// `Some(true)` plays, `Some(false)` pauses, `None` leaves the running
    /// state alone.
    pub enabled: Option<bool>,
    /// Pass the measured FPS to the frame callback.
    pub provide_fps: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fps_limit: None,
            start_timestamp: None,
            end_timestamp: None,
            loop_playback: false,
            speed: 1.0,
            enabled: Some(true),
            provide_fps: false,
        }
    }
}

impl PlaybackConfig {
    /// Config bounded to `[start, end]`, initially paused.
    pub fn window(start: i64, end: i64) -> Self {
        Self {
            start_timestamp: Some(start),
            end_timestamp: Some(end),
            enabled: Some(false),
            ..Self::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_fps_limit(mut self, fps: f64) -> Self {
        self.fps_limit = Some(fps);
        self
    }

    pub fn with_loop(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_fps(mut self, provide_fps: bool) -> Self {
        self.provide_fps = provide_fps;
        self
    }

    /// Minimum wall-clock gap between two callbacks, if capped.
    pub fn frame_interval_ms(&self) -> Option<f64> {
        self.fps_limit.map(|fps| 1000.0 / fps)
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ReplayError::invalid_config(
                "speed",
                format!("{} is not a positive multiplier", self.speed),
            ));
        }
        if let Some(fps) = self.fps_limit {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(ReplayError::invalid_config(
                    "fps_limit",
                    format!("{fps} is not a positive frame rate"),
                ));
            }
        }
        if let (Some(start), Some(end)) = (self.start_timestamp, self.end_timestamp) {
            if start > end {
                return Err(ReplayError::invalid_config(
                    "end_timestamp",
                    format!("window end {end} precedes start {start}"),
                ));
            }
        }
        Ok(())
    }
}
