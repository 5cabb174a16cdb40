use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use candle_replay::AppConfig;
use candle_replay::chart::{ChartRenderer, DisplayListRenderer, Surface};
use candle_replay::market::MockDataSource;
use candle_replay::playback::{
    ClockState, DEFAULT_TICK_INTERVAL, Frame, PlaybackClock, PlaybackDriver,
};
use candle_replay::replay::ReplaySession;
use chrono::Utc;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "candle-replay")]
#[command(about = "Replays recent mock OHLC candles on a simulated clock", long_about = None)]
struct Cli {
    /// Config file path (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Simulated milliseconds per wall-clock millisecond [default: 600, an hour in 6 s]
    #[arg(short, long)]
    speed: Option<f64>,

    /// Cap on rendered frames per second
    #[arg(long)]
    fps_limit: Option<f64>,

    /// Wrap to the start instead of stopping at the end
    #[arg(long = "loop")]
    loop_playback: bool,

    /// Probability in [0, 1] that a data request fails
    #[arg(long, value_name = "RATE")]
    errors: Option<f64>,

    /// Seed for the generated history
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(speed) = self.speed {
            config.playback.speed = speed;
        }
        if let Some(fps) = self.fps_limit {
            config.playback.fps_limit = Some(fps);
        }
        if self.loop_playback {
            config.playback.loop_playback = true;
        }
        if let Some(rate) = self.errors {
            config.data.error_rate = Some(rate);
        }
        if let Some(seed) = self.seed {
            config.data.seed = seed;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let mut renderer = DisplayListRenderer::new();
    renderer.init(Surface::new(config.chart.width, config.chart.height))?;
    let mut session = ReplaySession::new(renderer, config.chart.clone());

    let now = Utc::now();
    let source = MockDataSource::new(config.data.clone(), now)?;
    let end = now.timestamp_millis();
    let start = end - config.lookback_ms();

    info!(
        lookback_hours = config.lookback_hours,
        granularity = %config.data.granularity,
        "Loading replay window"
    );
    let window = session
        .load(&source, start, end, config.data.granularity)
        .await
        .context("Failed to load replay data")?;

    let playback = session
        .playback_config(&config.playback)
        .ok_or_else(|| anyhow!("no playback window after load"))?
        .with_fps(true);
    let looping = playback.loop_playback;

    let (frame_tx, mut frames) = mpsc::unbounded_channel::<Frame>();
    let mut clock = PlaybackClock::new(playback)?;
    clock.on_frame(move |frame| {
        frame_tx
            .send(*frame)
            .map_err(|_| anyhow!("frame receiver closed"))
    });

    let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);
    let mut status = driver.subscribe();
    driver.start().await?;
    info!(
        start = window.start,
        end = window.end,
        speed = config.playback.speed,
        expected_secs = config.expected_run_time().as_secs_f64(),
        looping,
        "Playback started"
    );

    let mut report = tokio::time::interval(Duration::from_secs(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(frame) = frames.recv() => {
                session.set_fps(frame.fps.unwrap_or(0));
                if let Err(err) = session.on_frame(frame.simulated_time, true) {
                    warn!(error = %err, "Frame render failed");
                }
            }
            _ = report.tick() => log_info(&session),
            changed = status.changed() => {
                let finished = status.borrow().state == ClockState::Finished;
                if changed.is_err() || (!looping && finished) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    let clock = driver.shutdown().await?;
    // the final frame may still be queued
    while let Ok(frame) = frames.try_recv() {
        session.on_frame(frame.simulated_time, false)?;
    }
    log_info(&session);

    let stats = clock.stats();
    info!(
        delivered = stats.delivered_frames,
        suppressed = stats.suppressed_frames,
        callback_failures = stats.callback_failures,
        loops = stats.loops,
        rendered = session.renderer().frames_rendered(),
        "Playback stopped"
    );
    session.teardown();
    Ok(())
}

fn log_info<R: ChartRenderer>(session: &ReplaySession<R>) {
    if let Some(panel) = session.info() {
        info!(
            date = %panel.date,
            time = %panel.time,
            visible = panel.visible,
            total = panel.total,
            progress = panel.progress_percent,
            fps = panel.fps,
            "Replay"
        );
    }
}
