//! Candle data: the sample type, trend generation and the data source contract.

pub mod api;
pub mod candle;
pub mod generator;
pub mod granularity;
pub mod mock_source;

// Re-exports for convenience
pub use api::{ApiResponse, ChartDataFilter, PaginatedResponse, PaginationInfo};
pub use candle::Candle;
pub use generator::{CandleGenerator, Trend};
pub use granularity::Granularity;
pub use mock_source::{DataSource, LatencyRange, MockDataSource, MockSourceConfig};
