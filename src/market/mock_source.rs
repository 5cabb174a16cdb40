//! Data source contract and the in-memory mock implementation.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ReplayError;
use crate::market::api::{ApiResponse, ChartDataFilter, PaginatedResponse, PaginationInfo};
use crate::market::candle::Candle;
use crate::market::generator::{CandleGenerator, DEFAULT_BASE_PRICE, Trend};
use crate::market::granularity::Granularity;

// The replay session is generic over this trait, so tests can hand it a
// fake source instead of the latency-simulating mock.
// =============================================================================

/// Asynchronous provider of candle sequences.
///
/// Returned candles are sorted ascending by timestamp and never overlap.
pub trait DataSource: Send + Sync + 'static {
    fn fetch_by_time_range(
        &self,
        start: i64,
        end: i64,
        granularity: Granularity,
    ) -> impl Future<Output = ApiResponse<Vec<Candle>>> + Send;

    /// 1-based page of the (optionally filtered) data.
    fn fetch_page(
        &self,
        page: usize,
        page_size: usize,
        filter: Option<ChartDataFilter>,
    ) -> impl Future<Output = PaginatedResponse<Candle>> + Send;

    fn generate(
        &self,
        count: usize,
        trend: Trend,
        base_price: f64,
    ) -> impl Future<Output = ApiResponse<Vec<Candle>>> + Send;

    /// Up to `count` candles following `last_timestamp`.
    fn fetch_streaming(
        &self,
        last_timestamp: i64,
        count: usize,
    ) -> impl Future<Output = ApiResponse<Vec<Candle>>> + Send;

    fn name(&self) -> &'static str;
}

/// Inclusive bounds of a simulated network delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl LatencyRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const ZERO: LatencyRange = LatencyRange::new(0, 0);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MockSourceConfig {
    pub seed: u64,
    /// Number of candles cached at construction.
    pub history_len: usize,
    pub granularity: Granularity,
    pub base_price: f64,
    pub query_latency: LatencyRange,
    pub generate_latency: LatencyRange,
    pub streaming_latency: LatencyRange,
    /// Probability in `[0, 1]` that a request fails. `None` disables failures.
    pub error_rate: Option<f64>,
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            // 30 days of 5-minute candles
            history_len: 30 * 24 * 12,
            granularity: Granularity::Minute,
            base_price: DEFAULT_BASE_PRICE,
            query_latency: LatencyRange::new(100, 800),
            generate_latency: LatencyRange::new(300, 1200),
            streaming_latency: LatencyRange::new(50, 300),
            error_rate: None,
        }
    }
}

impl MockSourceConfig {
    /// Same data, no artificial delay.
    pub fn instant(mut self) -> Self {
        self.query_latency = LatencyRange::ZERO;
        self.generate_latency = LatencyRange::ZERO;
        self.streaming_latency = LatencyRange::ZERO;
        self
    }

    pub fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = Some(rate);
        self
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        for (field, latency) in [
            ("query_latency", self.query_latency),
            ("generate_latency", self.generate_latency),
            ("streaming_latency", self.streaming_latency),
        ] {
            if latency.min_ms > latency.max_ms {
                return Err(ReplayError::invalid_config(field, "min_ms exceeds max_ms"));
            }
        }
        if let Some(rate) = self.error_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ReplayError::invalid_config(
                    "error_rate",
                    format!("{rate} is outside [0, 1]"),
                ));
            }
        }
        if !(self.base_price.is_finite() && self.base_price > 0.0) {
            return Err(ReplayError::invalid_config("base_price", "must be positive"));
        }
        Ok(())
    }
}

/// Mock candle API with simulated latency and failures.
///
/// The history is generated once at construction, ending at the anchor
/// time, and is read-only afterwards. Share one instance behind an `Arc`.
pub struct MockDataSource {
    cache: Arc<[Candle]>,
    anchor_ms: i64,
    config: MockSourceConfig,
    rng: Mutex<StdRng>,
}

impl MockDataSource {
    pub fn new(config: MockSourceConfig, anchor: DateTime<Utc>) -> Result<Self, ReplayError> {
        config.validate()?;

        let anchor_ms = anchor.timestamp_millis();
        let step = config.granularity.step_ms();
        let start_ms = anchor_ms - config.history_len as i64 * step;

        let mut generator = CandleGenerator::new(config.seed);
        let history = generator.generate(
            start_ms,
            config.history_len,
            config.granularity,
            Trend::Mixed,
            config.base_price,
        );

        debug!(
            candles = history.len(),
            start_ms,
            anchor_ms,
            "Mock data source cached history"
        );

        Ok(Self {
            cache: history.into(),
            anchor_ms,
            rng: Mutex::new(StdRng::seed_from_u64(config.seed.wrapping_add(1))),
            config,
        })
    }

    /// Shared view of the cached history.
    pub fn history(&self) -> Arc<[Candle]> {
        Arc::clone(&self.cache)
    }

    pub fn config(&self) -> &MockSourceConfig {
        &self.config
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        // a panic while holding the lock cannot leave the rng inconsistent
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self, range: LatencyRange) {
        let delay_ms = self.rng().gen_range(range.min_ms..=range.max_ms);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    fn should_fail(&self) -> bool {
        match self.config.error_rate {
            Some(rate) if rate > 0.0 => self.rng().r#gen::<f64>() < rate,
            _ => false,
        }
    }

    fn next_generator(&self) -> CandleGenerator {
        CandleGenerator::new(self.rng().r#gen())
    }
}

impl DataSource for MockDataSource {
    async fn fetch_by_time_range(
        &self,
        start: i64,
        end: i64,
        granularity: Granularity,
    ) -> ApiResponse<Vec<Candle>> {
        self.simulate_latency(self.config.query_latency).await;

        if self.should_fail() {
            warn!(start, end, "Simulated failure fetching time range");
            return ApiResponse::failed(Vec::new(), "An error occurred while fetching data.");
        }

        let data = ChartDataFilter::time_range(start, end).apply(&self.cache);
        debug!(start, end, %granularity, candles = data.len(), "Time range served");
        ApiResponse::ok(data)
    }

    async fn fetch_page(
        &self,
        page: usize,
        page_size: usize,
        filter: Option<ChartDataFilter>,
    ) -> PaginatedResponse<Candle> {
        self.simulate_latency(self.config.query_latency).await;

        if page == 0 || page_size == 0 {
            let error = ReplayError::invalid_config("page", "page and page_size start at 1");
            return PaginatedResponse {
                response: ApiResponse::failed(Vec::new(), error.to_string()),
                pagination: PaginationInfo::new(page, page_size, 0),
            };
        }

        if self.should_fail() {
            warn!(page, page_size, "Simulated failure fetching page");
            return PaginatedResponse {
                response: ApiResponse::failed(
                    Vec::new(),
                    "An error occurred during the server request.",
                ),
                pagination: PaginationInfo::new(page, page_size, 0),
            };
        }

        let filtered = match filter {
            Some(filter) => filter.apply(&self.cache),
            None => self.cache.to_vec(),
        };
        let pagination = PaginationInfo::new(page, page_size, filtered.len());
        let data = filtered[pagination.bounds()].to_vec();

        PaginatedResponse {
            response: ApiResponse::ok(data),
            pagination,
        }
    }

    async fn generate(
        &self,
        count: usize,
        trend: Trend,
        base_price: f64,
    ) -> ApiResponse<Vec<Candle>> {
        self.simulate_latency(self.config.generate_latency).await;

        if self.should_fail() {
            warn!(count, ?trend, "Simulated failure generating data");
            return ApiResponse::failed(Vec::new(), "An error occurred while generating data.");
        }

        let data = self.next_generator().generate(
            self.anchor_ms,
            count,
            Granularity::Minute,
            trend,
            base_price,
        );
        ApiResponse::ok(data)
    }

    async fn fetch_streaming(&self, last_timestamp: i64, count: usize) -> ApiResponse<Vec<Candle>> {
        self.simulate_latency(self.config.streaming_latency).await;

        if self.should_fail() {
            warn!(last_timestamp, "Simulated failure streaming data");
            return ApiResponse::failed(
                Vec::new(),
                "An error occurred while receiving streaming data.",
            );
        }

        let found = self
            .cache
            .binary_search_by_key(&last_timestamp, Candle::get_timestamp)
            .ok();

        match found {
            Some(index) if index + 1 < self.cache.len() => {
                let end = (index + 1 + count).min(self.cache.len());
                ApiResponse::ok(self.cache[index + 1..end].to_vec())
            }
            _ => {
                // past the cached history: continue with fresh candles
                let base = found
                    .map(|index| self.cache[index])
                    .or_else(|| self.cache.last().copied())
                    .map_or(self.config.base_price, |c| c.get_close());
                let step = Granularity::Minute.step_ms();
                let data = self.next_generator().generate(
                    last_timestamp + step,
                    count,
                    Granularity::Minute,
                    Trend::Mixed,
                    base,
                );
                ApiResponse::ok(data)
            }
        }
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
