//! Simulated-time playback clock.
//!
//! The clock is passive: a host (a display-refresh callback, or the tokio
//! [`PlaybackDriver`](crate::playback::driver::PlaybackDriver)) calls
//! [`PlaybackClock::tick`] with its wall-clock time, and the clock advances
//! its simulated timestamp by `delta * speed`, applies the window boundary and
//! hands a [`Frame`] to the registered callback.

use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::ReplayError;
use crate::playback::config::PlaybackConfig;
use crate::playback::fps::FpsMeter;

/// Ticks arriving sooner than this after the last accepted one are skipped.
pub const MIN_FRAME_INTERVAL_MS: f64 = 16.0;
const DIAGNOSTIC_EVERY: u64 = 100;

/// What the frame callback receives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Simulated epoch milliseconds.
    pub simulated_time: i64,
    /// Wall-clock milliseconds since the previous accepted tick.
    pub delta_ms: f64,
    /// Measured FPS, present only when `provide_fps` is set.
    pub fps: Option<u32>,
}

pub type FrameCallback = Box<dyn FnMut(&Frame) -> anyhow::Result<()> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    #[default]
    Idle,
    Running,
    /// Reached the end of the window with looping disabled.
    Finished,
}

/// Result of a single [`PlaybackClock::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not running; nothing happened and nothing should be re-armed.
    Inactive,
    /// Too close to the previous accepted tick; simulated time unchanged.
    Throttled,
    /// Simulated time advanced but the FPS cap held the callback back.
    Suppressed,
    /// Simulated time advanced and the callback ran.
    Delivered,
    /// Clamped to the window end; the final frame was delivered and the clock stopped.
    Finished,
}

impl TickOutcome {
    /// Whether the host should schedule another tick.
    pub fn rearm(&self) -> bool {
        matches!(
            self,
            TickOutcome::Throttled | TickOutcome::Suppressed | TickOutcome::Delivered
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockStats {
    pub accepted_ticks: u64,
    pub delivered_frames: u64,
    pub suppressed_frames: u64,
    pub callback_failures: u64,
    pub loops: u64,
}

/// Snapshot of the clock's observable state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    pub simulated_time: Option<i64>,
    pub playing: bool,
    pub state: ClockState,
    pub fps: u32,
}

pub struct PlaybackClock {
    config: PlaybackConfig,
    state: ClockState,
    simulated_time: Option<i64>,
    /// Where a loop wraps to when no start timestamp is configured.
    origin: Option<i64>,
    last_accepted: Option<f64>,
    last_rendered: Option<f64>,
    fps: FpsMeter,
    stats: ClockStats,
    callback: Option<FrameCallback>,
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("simulated_time", &self.simulated_time)
            .field("fps", &self.fps.fps())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl PlaybackClock {
    /// Creates an idle clock positioned at the configured start.
    ///
    /// If `config.enabled` is `Some(true)` the clock starts running right away.
    pub fn new(config: PlaybackConfig) -> Result<Self, ReplayError> {
        config.validate()?;

        let enabled = config.enabled;
        let mut clock = Self {
            simulated_time: config.start_timestamp,
            origin: config.start_timestamp,
            config,
            state: ClockState::Idle,
            last_accepted: None,
            last_rendered: None,
            fps: FpsMeter::new(),
            stats: ClockStats::default(),
            callback: None,
        };
        if enabled == Some(true) {
            clock.start();
        }
        Ok(clock)
    }

    /// Registers the per-frame consumer, replacing any previous one.
    pub fn on_frame<F>(&mut self, callback: F)
    where
        F: FnMut(&Frame) -> anyhow::Result<()> + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    pub fn clear_callback(&mut self) {
        self.callback = None;
    }

    /// Replaces the configuration. Takes effect on the next tick.
    ///
    /// While not running, a changed start timestamp repositions the clock.
    /// `enabled` starts or stops playback; `None` keeps the current state.
    pub fn configure(&mut self, config: PlaybackConfig) -> Result<(), ReplayError> {
        config.validate()?;

        if config.start_timestamp != self.config.start_timestamp {
            self.origin = config.start_timestamp;
            if self.state != ClockState::Running {
                self.simulated_time = config.start_timestamp;
            }
        }

        let enabled = config.enabled;
        self.config = config;

        match (enabled, self.state == ClockState::Running) {
            (Some(true), false) => self.start(),
            (Some(false), true) => self.stop(),
            _ => {}
        }
        Ok(())
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<(), ReplayError> {
        let config = PlaybackConfig {
            speed,
            ..self.config.clone()
        };
        self.configure(config)
    }

    /// Begins (or resumes) ticking. The first tick afterwards has a zero delta.
    ///
    /// Starting a finished clock rewinds it to the window start first.
    pub fn start(&mut self) {
        if self.state == ClockState::Running {
            return;
        }
        if self.state == ClockState::Finished {
            self.simulated_time = self.config.start_timestamp.or(self.origin);
        }
        self.state = ClockState::Running;
        self.config.enabled = Some(true);
        self.last_accepted = None;
        self.last_rendered = None;
        debug!(simulated_time = ?self.simulated_time, "Playback started");
    }

    /// Pauses at the current simulated time. No callback fires until `start`.
    pub fn stop(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Idle;
            debug!(simulated_time = ?self.simulated_time, "Playback stopped");
        }
        self.config.enabled = Some(false);
        self.last_accepted = None;
        self.last_rendered = None;
    }

    /// Rewinds to the start of the window and pauses. Idempotent.
    pub fn reset(&mut self) {
        self.state = ClockState::Idle;
        self.config.enabled = Some(false);
        self.simulated_time = self.config.start_timestamp;
        self.origin = self.config.start_timestamp;
        self.last_accepted = None;
        self.last_rendered = None;
        self.fps.reset();
    }

    /// Stops playback and drops the callback; no frame is delivered afterwards.
    pub fn teardown(&mut self) {
        self.stop();
        self.callback = None;
    }

    /// Processes one host tick at wall-clock time `now_ms`.
    pub fn tick(&mut self, now_ms: f64) -> TickOutcome {
        if self.state != ClockState::Running {
            return TickOutcome::Inactive;
        }

        let simulated = match self.simulated_time {
            Some(simulated) => simulated,
            None => {
                let initial = self.config.start_timestamp.unwrap_or(now_ms as i64);
                self.origin = Some(initial);
                info!(
                    initial_time = now_ms,
                    start_timestamp = ?self.config.start_timestamp,
                    simulated_time = initial,
                    "Playback initialised"
                );
                initial
            }
        };

        let delta = match self.last_accepted {
            Some(previous) => {
                let delta = now_ms - previous;
                if delta < MIN_FRAME_INTERVAL_MS {
                    return TickOutcome::Throttled;
                }
                delta
            }
            None => 0.0,
        };

        self.last_accepted = Some(now_ms);
        self.stats.accepted_ticks += 1;
        let fps = self.fps.record(now_ms);

        let advance = (delta * self.config.speed).round() as i64;
        let mut next = simulated.saturating_add(advance);
        let mut finished = false;

        if self.stats.accepted_ticks % DIAGNOSTIC_EVERY == 0 {
            debug!(delta, advance, simulated_time = next, fps, "Playback frame");
        }

        if let Some(end) = self.config.end_timestamp {
            if next >= end {
                if self.config.loop_playback {
                    next = self.config.start_timestamp.or(self.origin).unwrap_or(simulated);
                    self.stats.loops += 1;
                    info!(end, restart = next, "Playback looping back to start");
                } else {
                    next = end;
                    finished = true;
                    info!(end, "Playback reached end of window");
                }
            }
        }
        self.simulated_time = Some(next);

        // the final frame always goes out so consumers observe the clamp
        if !finished {
            if let (Some(interval), Some(previous)) =
                (self.config.frame_interval_ms(), self.last_rendered)
            {
                if now_ms - previous < interval {
                    self.stats.suppressed_frames += 1;
                    return TickOutcome::Suppressed;
                }
            }
        }
        self.last_rendered = Some(now_ms);

        let frame = Frame {
            simulated_time: next,
            delta_ms: delta,
            fps: self.config.provide_fps.then_some(fps),
        };
        self.dispatch(&frame);

        if finished {
            self.state = ClockState::Finished;
            self.config.enabled = Some(false);
            self.last_accepted = None;
            self.last_rendered = None;
            TickOutcome::Finished
        } else {
            TickOutcome::Delivered
        }
    }

    fn dispatch(&mut self, frame: &Frame) {
        let Some(callback) = self.callback.as_mut() else {
            return;
        };
        match callback(frame) {
            Ok(()) => self.stats.delivered_frames += 1,
            Err(err) => {
                self.stats.callback_failures += 1;
                error!(
                    error = %err,
                    simulated_time = frame.simulated_time,
                    "Frame callback failed; playback continues"
                );
            }
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == ClockState::Running
    }

    /// `None` until the first tick when no start timestamp is configured.
    pub fn simulated_time(&self) -> Option<i64> {
        self.simulated_time
    }

    pub fn fps(&self) -> u32 {
        self.fps.fps()
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn stats(&self) -> ClockStats {
        self.stats
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            simulated_time: self.simulated_time,
            playing: self.is_playing(),
            state: self.state,
            fps: self.fps.fps(),
        }
    }
}
