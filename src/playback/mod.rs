//! Simulated-clock playback: configuration, the clock itself, FPS measurement
//! and a tokio-hosted tick scheduler.

pub mod clock;
pub mod config;
pub mod driver;
pub mod fps;

pub use clock::{
    ClockState, ClockStats, Frame, FrameCallback, MIN_FRAME_INTERVAL_MS, PlaybackClock,
    PlaybackStatus, TickOutcome,
};
pub use config::PlaybackConfig;
pub use driver::{DEFAULT_TICK_INTERVAL, PlaybackDriver};
pub use fps::FpsMeter;
