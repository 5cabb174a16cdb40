//! Tokio host for a [`PlaybackClock`].
//!
//! Plays the role of the display-refresh scheduler: one spawned task owns the
//! clock, ticks it at a fixed cadence while it is running, and applies control
//! commands between ticks. Nothing else touches the clock, so no locking is
//! involved.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::ReplayError;
use crate::playback::clock::{PlaybackClock, PlaybackStatus};
use crate::playback::config::PlaybackConfig;

/// Cadence of a 60 Hz display.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_micros(16_667);

#[derive(Debug, Clone)]
enum Command {
    Start,
    Stop,
    Reset,
    Configure(PlaybackConfig),
    Shutdown,
}

/// Control handle for a clock running on its own task.
///
/// Dropping the handle aborts the task; [`PlaybackDriver::shutdown`] stops it
/// gracefully and hands the clock back. In both cases no frame callback runs
/// afterwards.
pub struct PlaybackDriver {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<PlaybackStatus>,
    task: Option<JoinHandle<PlaybackClock>>,
}

impl PlaybackDriver {
    /// Moves `clock` onto a new task ticking every `tick_interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(clock: PlaybackClock, tick_interval: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (status_tx, status_rx) = watch::channel(clock.status());
        let task = tokio::spawn(run(clock, tick_interval, command_rx, status_tx));

        Self {
            commands: command_tx,
            status: status_rx,
            task: Some(task),
        }
    }

    pub async fn start(&self) -> Result<(), ReplayError> {
        self.send(Command::Start).await
    }

    pub async fn stop(&self) -> Result<(), ReplayError> {
        self.send(Command::Stop).await
    }

    pub async fn reset(&self) -> Result<(), ReplayError> {
        self.send(Command::Reset).await
    }

    /// Validates `config` here so errors reach the caller, then forwards it.
    pub async fn configure(&self, config: PlaybackConfig) -> Result<(), ReplayError> {
        config.validate()?;
        self.send(Command::Configure(config)).await
    }

    /// Latest published status.
    pub fn status(&self) -> PlaybackStatus {
        *self.status.borrow()
    }

    /// Receiver notified after every command and every processed tick.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    /// Stops the task after it finishes any in-flight tick and returns the
    /// clock, torn down.
    pub async fn shutdown(mut self) -> Result<PlaybackClock, ReplayError> {
        let task = self.task.take().ok_or(ReplayError::Shutdown)?;
        // the task may already be gone; joining below covers both cases
        let _ = self.commands.send(Command::Shutdown).await;
        task.await.map_err(|err| {
            warn!(error = %err, "Playback task did not finish cleanly");
            ReplayError::Shutdown
        })
    }

    async fn send(&self, command: Command) -> Result<(), ReplayError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ReplayError::Shutdown)
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    mut clock: PlaybackClock,
    tick_interval: Duration,
    mut commands: mpsc::Receiver<Command>,
    status: watch::Sender<PlaybackStatus>,
) -> PlaybackClock {
    let epoch = Instant::now();
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // pending commands always win over the next tick
            biased;

            command = commands.recv() => {
                let was_playing = clock.is_playing();
                match command {
                    Some(Command::Shutdown) | None => break,
                    Some(Command::Start) => clock.start(),
                    Some(Command::Stop) => clock.stop(),
                    Some(Command::Reset) => clock.reset(),
                    Some(Command::Configure(config)) => {
                        if let Err(err) = clock.configure(config) {
                            warn!(error = %err, "Rejected playback configuration");
                        }
                    }
                }
                // deadlines missed while paused must not count as elapsed time
                if !was_playing && clock.is_playing() {
                    ticker.reset_immediately();
                }
            }
            instant = ticker.tick(), if clock.is_playing() => {
                let now_ms = instant.saturating_duration_since(epoch).as_secs_f64() * 1000.0;
                clock.tick(now_ms);
            }
        }
        status.send_replace(clock.status());
    }

    clock.teardown();
    status.send_replace(clock.status());
    debug!("Playback task stopped");
    clock
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::clock::ClockState;
    use std::sync::{Arc, Mutex};

    fn counting_clock(config: PlaybackConfig) -> (PlaybackClock, Arc<Mutex<Vec<i64>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut clock = PlaybackClock::new(config).unwrap();
        clock.on_frame(move |frame| {
            sink.lock().unwrap().push(frame.simulated_time);
            Ok(())
        });
        (clock, seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_window_to_the_end() {
        let (clock, seen) = counting_clock(PlaybackConfig::window(0, 2_000).with_speed(4.0));
        let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);
        let mut status = driver.subscribe();

        driver.start().await.unwrap();
        status
            .wait_for(|s| s.state == ClockState::Finished)
            .await
            .unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&2_000));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(driver.status().simulated_time, Some(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_reset_through_handle() {
        let (clock, seen) = counting_clock(PlaybackConfig::window(0, 1_000_000));
        let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);

        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        driver.stop().await.unwrap();
        let mut status = driver.subscribe();
        status.wait_for(|s| !s.playing).await.unwrap();

        let count = seen.lock().unwrap().len();
        assert!(count > 0);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(seen.lock().unwrap().len(), count);

        driver.reset().await.unwrap();
        status
            .wait_for(|s| s.simulated_time == Some(0) && !s.playing)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_frames_after_shutdown() {
        let (clock, seen) = counting_clock(PlaybackConfig::window(0, 1_000_000).with_loop(true));
        let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);
        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let clock = driver.shutdown().await.unwrap();
        assert!(!clock.is_playing());
        let count = seen.lock().unwrap().len();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(seen.lock().unwrap().len(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_after_pause_does_not_jump() {
        let (clock, seen) = counting_clock(PlaybackConfig::window(0, 1_000_000_000));
        let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);
        let mut status = driver.subscribe();

        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        driver.stop().await.unwrap();
        status.wait_for(|s| !s.playing).await.unwrap();
        let paused_at = driver.status().simulated_time.unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.stop().await.unwrap();
        status.wait_for(|s| !s.playing).await.unwrap();
        let resumed_to = driver.status().simulated_time.unwrap();

        let advance = resumed_to - paused_at;
        assert!((0..=100).contains(&advance), "advanced {advance} ms after resume");
        let seen = seen.lock().unwrap().clone();
        assert!(seen.windows(2).all(|w| w[1] - w[0] <= 100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_long_after_spawn_begins_at_window_start() {
        let (clock, seen) = counting_clock(PlaybackConfig::window(0, 1_000_000_000));
        let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);
        let mut status = driver.subscribe();

        tokio::time::sleep(Duration::from_secs(5)).await;
        driver.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        driver.stop().await.unwrap();
        status.wait_for(|s| !s.playing).await.unwrap();

        assert!(driver.status().simulated_time.unwrap() <= 100);
        assert_eq!(seen.lock().unwrap().first(), Some(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configure_rejects_invalid_config() {
        let clock = PlaybackClock::new(PlaybackConfig::window(0, 10)).unwrap();
        let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);
        let result = driver.configure(PlaybackConfig::default().with_speed(-1.0)).await;
        assert!(matches!(result, Err(ReplayError::InvalidConfig { .. })));
    }
}
