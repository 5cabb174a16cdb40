use std::sync::{Arc, Mutex};
use std::time::Duration;

use candle_replay::ReplayError;
use candle_replay::chart::{
    ChartOptions, ChartRenderer, DisplayListRenderer, Projection, Surface, visible_subset,
};
use candle_replay::market::{
    ApiResponse, Candle, ChartDataFilter, DataSource, Granularity, MockDataSource, MockSourceConfig,
    PaginatedResponse, PaginationInfo, Trend,
};
use candle_replay::playback::{
    ClockState, DEFAULT_TICK_INTERVAL, PlaybackClock, PlaybackConfig, PlaybackDriver, TickOutcome,
};
use candle_replay::replay::{LoadState, ReplaySession};
use chrono::{DateTime, TimeZone, Utc};

const STEP: i64 = 300_000;

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn session() -> ReplaySession<DisplayListRenderer> {
    let mut renderer = DisplayListRenderer::new();
    renderer.init(Surface::new(1150.0, 500.0)).unwrap();
    ReplaySession::new(renderer, ChartOptions::default())
}

fn mock_source(config: MockSourceConfig) -> MockDataSource {
    MockDataSource::new(config, anchor()).unwrap()
}

/// Loads the last six hours of a 100-candle history: 72 candles.
async fn loaded_session() -> ReplaySession<DisplayListRenderer> {
    let source = mock_source(MockSourceConfig {
        history_len: 100,
        ..MockSourceConfig::default().instant()
    });
    let end = anchor().timestamp_millis();
    let mut session = session();
    session
        .load(&source, end - 72 * STEP, end, Granularity::Minute)
        .await
        .unwrap();
    session
}

#[tokio::test(start_paused = true)]
async fn test_manual_ticks_replay_window_to_the_end() {
    let session = Arc::new(Mutex::new(loaded_session().await));
    let window = session.lock().unwrap().window().unwrap();
    assert_eq!(window.duration_ms(), 71 * STEP);

    // one wall millisecond is one simulated minute
    let config = session
        .lock()
        .unwrap()
        .playback_config(&PlaybackConfig::default().with_speed(60_000.0))
        .unwrap();
    let mut clock = PlaybackClock::new(config).unwrap();

    let visible = Arc::new(Mutex::new(Vec::new()));
    let (sink, counts) = (Arc::clone(&session), Arc::clone(&visible));
    clock.on_frame(move |frame| {
        let mut session = sink.lock().unwrap();
        session.on_frame(frame.simulated_time, true)?;
        counts.lock().unwrap().push(session.info().map_or(0, |info| info.visible));
        Ok(())
    });

    clock.start();
    let mut now = 0.0;
    let mut outcome = TickOutcome::Inactive;
    for _ in 0..100 {
        outcome = clock.tick(now);
        if outcome == TickOutcome::Finished {
            break;
        }
        now += 20.0;
    }

    assert_eq!(outcome, TickOutcome::Finished);
    assert_eq!(clock.simulated_time(), Some(window.end));
    assert_eq!(clock.tick(now + 20.0), TickOutcome::Inactive);

    let counts = visible.lock().unwrap().clone();
    assert_eq!(counts.first(), Some(&1));
    assert_eq!(counts.last(), Some(&72));
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));

    let session = session.lock().unwrap();
    let info = session.info().unwrap();
    assert_eq!(info.progress_percent, 100);
    assert_eq!(info.total, 72);
    assert_eq!(session.renderer().scene().unwrap().candles.len(), 72);
}

#[tokio::test(start_paused = true)]
async fn test_driver_feeds_session_until_finished() {
    let session = Arc::new(Mutex::new(loaded_session().await));
    let config = session
        .lock()
        .unwrap()
        .playback_config(&PlaybackConfig::default().with_speed(60_000.0).with_fps(true))
        .unwrap();

    let mut clock = PlaybackClock::new(config).unwrap();
    let sink = Arc::clone(&session);
    clock.on_frame(move |frame| {
        let mut session = sink.lock().unwrap();
        session.set_fps(frame.fps.unwrap_or(0));
        session.on_frame(frame.simulated_time, true)?;
        Ok(())
    });

    let driver = PlaybackDriver::spawn(clock, DEFAULT_TICK_INTERVAL);
    let mut status = driver.subscribe();
    driver.start().await.unwrap();
    status
        .wait_for(|s| s.state == ClockState::Finished)
        .await
        .unwrap();

    let clock = driver.shutdown().await.unwrap();
    assert!(clock.stats().delivered_frames > 1);
    assert_eq!(clock.stats().callback_failures, 0);

    let mut session = session.lock().unwrap();
    assert_eq!(session.info().unwrap().visible, 72);
    session.teardown();
    assert!(!session.renderer().is_initialised());
}

#[tokio::test(start_paused = true)]
async fn test_torn_down_renderer_surfaces_as_callback_failure() {
    let session = Arc::new(Mutex::new(loaded_session().await));
    let config = session
        .lock()
        .unwrap()
        .playback_config(&PlaybackConfig::default().with_speed(1_000.0))
        .unwrap();

    let mut clock = PlaybackClock::new(config).unwrap();
    let sink = Arc::clone(&session);
    clock.on_frame(move |frame| {
        let mut session = sink.lock().unwrap();
        session.renderer_mut().destroy();
        session.on_frame(frame.simulated_time, true)?;
        Ok(())
    });

    clock.start();
    assert_eq!(clock.tick(0.0), TickOutcome::Delivered);
    assert_eq!(clock.tick(20.0), TickOutcome::Delivered);
    assert_eq!(clock.stats().callback_failures, 2);
    assert!(clock.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_failing_source_marks_session_failed() {
    let source = mock_source(MockSourceConfig::default().instant().with_error_rate(1.0));
    let mut session = session();

    let result = session.load(&source, 0, i64::MAX, Granularity::Minute).await;

    assert!(matches!(result, Err(ReplayError::DataUnavailable { .. })));
    assert!(matches!(session.state(), LoadState::Failed(_)));
    assert!(session.info().is_none());
    session.on_frame(1_000, true).unwrap();
    assert_eq!(session.renderer().frames_rendered(), 0);
}

/// Serves a fixed slice with no latency.
struct FixedSource {
    candles: Vec<Candle>,
}

impl DataSource for FixedSource {
    async fn fetch_by_time_range(
        &self,
        start: i64,
        end: i64,
        _granularity: Granularity,
    ) -> ApiResponse<Vec<Candle>> {
        ApiResponse::ok(ChartDataFilter::time_range(start, end).apply(&self.candles))
    }

    async fn fetch_page(
        &self,
        page: usize,
        page_size: usize,
        filter: Option<ChartDataFilter>,
    ) -> PaginatedResponse<Candle> {
        let data = filter.unwrap_or_default().apply(&self.candles);
        let pagination = PaginationInfo::new(page, page_size, data.len());
        PaginatedResponse {
            response: ApiResponse::ok(data[pagination.bounds()].to_vec()),
            pagination,
        }
    }

    async fn generate(
        &self,
        _count: usize,
        _trend: Trend,
        _base_price: f64,
    ) -> ApiResponse<Vec<Candle>> {
        ApiResponse::ok(Vec::new())
    }

    async fn fetch_streaming(
        &self,
        _last_timestamp: i64,
        _count: usize,
    ) -> ApiResponse<Vec<Candle>> {
        ApiResponse::ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

#[tokio::test]
async fn test_session_accepts_any_data_source() {
    let source = FixedSource {
        candles: vec![
            Candle::new(0, 10.0, 15.0, 10.0, 15.0),
            Candle::new(10, 20.0, 25.0, 20.0, 25.0),
            Candle::new(20, 5.0, 30.0, 5.0, 30.0),
        ],
    };
    let mut session = session();

    let window = session.load(&source, 0, 100, Granularity::Minute).await.unwrap();
    assert_eq!((window.start, window.end), (0, 20));

    session.on_frame(15, true).unwrap();
    let scene = session.renderer().scene().unwrap();
    let stamps: Vec<i64> = scene.candles.iter().map(|c| c.timestamp).collect();
    assert_eq!(stamps, vec![0, 10]);
    assert_eq!(session.info().unwrap().progress_percent, 75);

    // an empty result is a failed load, not an empty chart
    let empty = session.load(&source, 1_000, 2_000, Granularity::Minute).await;
    assert!(empty.is_err());
    assert!(matches!(session.state(), LoadState::Failed(_)));
}

#[test]
fn test_visible_subset_and_projection_agree() {
    let candles = vec![
        Candle::new(0, 10.0, 15.0, 10.0, 15.0),
        Candle::new(10, 20.0, 25.0, 20.0, 25.0),
        Candle::new(20, 5.0, 30.0, 5.0, 30.0),
    ];
    let options = ChartOptions::default();

    assert_eq!(visible_subset(&candles, 15).len(), 2);

    let projection = Projection::compute(&candles, &options).unwrap();
    let (bottom, top) = projection.padded_range();
    assert!((bottom - 3.75).abs() < 1e-9);
    assert!((top - 31.25).abs() < 1e-9);
    assert!((projection.y(bottom) - options.draw_area().height).abs() < 1e-9);
    assert!(projection.y(top).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_retuning_speed_keeps_driver_playing() {
    let session = loaded_session().await;
    let config = session
        .playback_config(&PlaybackConfig::default().with_speed(1.0))
        .unwrap();
    let driver = PlaybackDriver::spawn(PlaybackClock::new(config).unwrap(), DEFAULT_TICK_INTERVAL);

    driver.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let faster = session
        .playback_config(&PlaybackConfig::default().with_speed(10.0))
        .unwrap();
    driver.configure(faster).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(driver.status().playing);
    let before = driver.status().simulated_time.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let advance = driver.status().simulated_time.unwrap() - before;
    assert!(advance > 500, "advanced only {advance} ms at 10x");
}
