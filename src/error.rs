//! Error types shared by the data, playback and chart layers.

use thiserror::Error;

/// Errors surfaced by the replay library.
///
/// None of these are fatal to the process: the worst case for a viewer is a
/// stalled or failed load.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplayError {
    /// The data source failed or returned zero candles.
    #[error("Data unavailable: {message}")]
    DataUnavailable { message: String },

    /// No time window can be derived from an empty candle sequence.
    #[error("Cannot build a playback window from an empty candle sequence")]
    EmptyWindow,

    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    /// The playback driver task is gone.
    #[error("Playback driver has shut down")]
    Shutdown,
}

impl ReplayError {
    pub fn data_unavailable(message: impl Into<String>) -> Self {
        Self::DataUnavailable {
            message: message.into(),
        }
    }

    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReplayError>;
