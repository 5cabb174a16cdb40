use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

const MINUTE_MS: i64 = 60 * 1000;

/// Bucket size requested from a data source.
///
/// `Minute` data is produced in five-minute buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Minute,
    Hour,
    Day,
}

impl Granularity {
    /// Returns the distance between consecutive candles in milliseconds
    pub fn step_ms(&self) -> i64 {
        match self {
            Granularity::Minute => 5 * MINUTE_MS,
            Granularity::Hour => 60 * MINUTE_MS,
            Granularity::Day => 24 * 60 * MINUTE_MS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Minute => "minute",
            Granularity::Hour => "hour",
            Granularity::Day => "day",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(Granularity::Minute),
            "hour" => Ok(Granularity::Hour),
            "day" => Ok(Granularity::Day),
            other => Err(ReplayError::invalid_config(
                "granularity",
                format!("unknown granularity '{other}'"),
            )),
        }
    }
}
