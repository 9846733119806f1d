//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over price sources (Yahoo Finance, in-memory
//! fixtures) so the breadth engine can be driven by a mock in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Raw daily OHLCV bar from a data provider, dated in exchange-local time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub adj_close: f64,
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and log lines.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no usable price history for '{symbol}'")]
    EmptyHistory { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NetworkUnreachable(_) | Self::RateLimited { .. } | Self::Other(_)
        )
    }
}

/// Result of a successful data fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<RawBar>,
    pub source: DataSource,
}

/// Where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    YahooFinance,
    InMemory,
}

/// Trait for price data providers.
///
/// Implementations make a single attempt per call; retry, batching and
/// throttling live in [`crate::data::fetch`].
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for a symbol over an inclusive date range.
    fn fetch(&self, symbol: &str, start: NaiveDate, end: NaiveDate)
        -> Result<FetchResult, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol fetches.
///
/// Called from worker threads, hence `Sync`.
pub trait FetchProgress: Send + Sync {
    /// Called after each symbol finishes (successfully or not).
    /// `Ok` carries the number of usable observations.
    fn on_symbol_complete(
        &self,
        symbol: &str,
        completed: usize,
        total: usize,
        result: &Result<usize, DataError>,
    );

    /// Called once when every batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Progress reporter that writes through `tracing`.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_symbol_complete(
        &self,
        symbol: &str,
        completed: usize,
        total: usize,
        result: &Result<usize, DataError>,
    ) {
        match result {
            Ok(n) => debug!(%symbol, completed, total, observations = n, "fetched"),
            Err(e) => warn!(%symbol, completed, total, error = %e, "fetch failed"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!(succeeded, failed, total, "universe fetch complete");
    }
}

/// Progress reporter that ignores every event.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn on_symbol_complete(&self, _: &str, _: usize, _: usize, _: &Result<usize, DataError>) {}

    fn on_batch_complete(&self, _: usize, _: usize, _: usize) {}
}
