//! Response envelopes returned by data sources.

use serde::{Deserialize, Serialize};

use crate::error::ReplayError;
use crate::market::candle::Candle;
use crate::market::generator::Trend;
use crate::market::granularity::Granularity;

/// `{ success, data, error? }` envelope.
///
/// A failed response carries an empty `data` and a human-readable `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }

    /// Maps `success = false` to [`ReplayError::DataUnavailable`].
    pub fn into_result(self) -> Result<T, ReplayError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ReplayError::data_unavailable(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    /// 1-based page number
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl PaginationInfo {
    pub fn new(page: usize, page_size: usize, total_items: usize) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_items.div_ceil(page_size)
        };
        Self {
            page,
            page_size,
            total_items,
            total_pages,
        }
    }

    /// Index range of this page within the filtered data.
    pub fn bounds(&self) -> std::ops::Range<usize> {
        let start = self.page.saturating_sub(1).saturating_mul(self.page_size);
        let start = start.min(self.total_items);
        let end = start.saturating_add(self.page_size).min(self.total_items);
        start..end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(flatten)]
    pub response: ApiResponse<Vec<T>>,
    pub pagination: PaginationInfo,
}

/// Optional constraints for paged queries. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataFilter {
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub interval: Option<Granularity>,
    pub trend: Option<Trend>,
}

impl ChartDataFilter {
    pub fn time_range(start: i64, end: i64) -> Self {
        Self {
            start_timestamp: Some(start),
            end_timestamp: Some(end),
            ..Self::default()
        }
    }

    pub fn matches(&self, candle: &Candle) -> bool {
        let ts = candle.get_timestamp();
        self.start_timestamp.is_none_or(|start| ts >= start)
            && self.end_timestamp.is_none_or(|end| ts <= end)
    }

    pub fn apply(&self, candles: &[Candle]) -> Vec<Candle> {
        candles.iter().filter(|c| self.matches(c)).copied().collect()
    }
}
