//! Benchmark index history, rebased for overlay against breadth.

use super::calendar;
use crate::clock::Clock;
use crate::data::{fetch_universe, DataProvider, FetchOptions, NoProgress};
use crate::domain::IndexSeries;
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

/// Fetches one index symbol and rebases it to its first close in the window.
///
/// Dates come out of the same canonicalization as constituent prices, so an
/// index point and a breadth point for the same session share a date.
pub struct IndexNormalizer<'a> {
    provider: &'a dyn DataProvider,
    clock: Arc<dyn Clock>,
    symbol: String,
    fetch: FetchOptions,
}

impl<'a> IndexNormalizer<'a> {
    pub fn new(provider: &'a dyn DataProvider, clock: Arc<dyn Clock>, symbol: impl Into<String>) -> Self {
        Self {
            provider,
            clock,
            symbol: symbol.into(),
            fetch: FetchOptions::default(),
        }
    }

    pub fn with_fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Index closes over the last `lookback_days` calendar days.
    ///
    /// Empty (never an error) when the source has nothing.
    pub fn get_rebased_index(&self, lookback_days: u32) -> IndexSeries {
        let end = calendar::exchange_today(self.clock.now());
        let start = end - Duration::days(i64::from(lookback_days));

        let symbols = [self.symbol.clone()];
        let mut fetched = fetch_universe(self.provider, &symbols, start, end, &self.fetch, &NoProgress);

        if let Some((_, err)) = fetched.failures.first() {
            warn!(symbol = %self.symbol, error = %err, "index fetch failed; returning empty series");
            return IndexSeries::empty(&self.symbol);
        }
        match fetched.series.pop() {
            Some(prices) => {
                let series = IndexSeries::rebased(&prices);
                info!(symbol = %self.symbol, points = series.len(), "index series ready");
                series
            }
            None => IndexSeries::empty(&self.symbol),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::data::InMemoryProvider;
    use crate::domain::PricePoint;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 8, 21, 0, 0).unwrap()))
    }

    #[test]
    fn rebases_to_first_close_in_window() {
        let mut provider = InMemoryProvider::new();
        provider.insert(
            "^GSPC",
            vec![
                PricePoint::new(d(2, 1), 10.0), // outside a 7-day window
                PricePoint::new(d(3, 4), 200.0),
                PricePoint::new(d(3, 5), 210.0),
                PricePoint::new(d(3, 8), 190.0),
            ],
        );
        let normalizer = IndexNormalizer::new(&provider, clock(), "^GSPC")
            .with_fetch_options(FetchOptions::immediate());

        let index = normalizer.get_rebased_index(7);
        assert_eq!(index.len(), 3);
        assert_eq!(index.points()[0].change_pct, 0.0);
        assert_eq!(index.points()[1].change_pct, 5.0);
        assert_eq!(index.points()[2].change_pct, -5.0);
        assert_eq!(index.latest_close(), Some(190.0));
    }

    #[test]
    fn missing_symbol_is_empty_not_error() {
        let provider = InMemoryProvider::new();
        let normalizer = IndexNormalizer::new(&provider, clock(), "^NOPE")
            .with_fetch_options(FetchOptions::immediate());
        let index = normalizer.get_rebased_index(30);
        assert!(index.is_empty());
        assert_eq!(index.symbol, "^NOPE");
    }
}
