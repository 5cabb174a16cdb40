//! Runtime configuration for the replay binary.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::chart::options::ChartOptions;
use crate::error::ReplayError;
use crate::market::mock_source::MockSourceConfig;
use crate::playback::config::PlaybackConfig;

/// Default replay speed: one hour of candles every six seconds.
pub const DEFAULT_REPLAY_SPEED: f64 = 600.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub playback: PlaybackConfig,
    pub chart: ChartOptions,
    pub data: MockSourceConfig,
    /// How far back from now the replayed window reaches.
    pub lookback_hours: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default().with_speed(DEFAULT_REPLAY_SPEED),
            chart: ChartOptions::default(),
            data: MockSourceConfig::default(),
            lookback_hours: 6,
        }
    }
}

impl AppConfig {
    /// Reads a JSON config. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        self.playback.validate()?;
        self.data.validate()?;
        if self.lookback_hours == 0 {
            return Err(ReplayError::invalid_config("lookback_hours", "must be at least 1"));
        }
        Ok(())
    }

    pub fn lookback_ms(&self) -> i64 {
        i64::from(self.lookback_hours) * 3_600_000
    }

    /// Wall-clock time one pass over the lookback window takes at the configured speed.
    pub fn expected_run_time(&self) -> Duration {
        Duration::from_secs_f64(self.lookback_ms() as f64 / self.playback.speed / 1000.0)
    }
}
