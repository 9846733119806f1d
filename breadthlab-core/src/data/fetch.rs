//! Fetch orchestrator: pulls histories for a whole universe with bounded
//! concurrency.
//!
//! Symbols are processed in batches. Each batch runs on a capped rayon pool,
//! and the orchestrator sleeps between batches so the provider never sees an
//! unbounded burst. A failing symbol is retried with a fixed delay, then
//! recorded and skipped. Once the provider reports itself unavailable, the
//! remaining symbols fail without a request.

use super::canonicalize::canonicalize;
use super::provider::{DataError, DataProvider, FetchProgress};
use crate::config::FetchSettings;
use crate::domain::PriceSeries;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Knobs for [`fetch_universe`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    pub batch_size: usize,
    pub max_workers: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
    /// Total attempts per symbol, including the first.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            max_workers: 10,
            batch_delay: Duration::from_secs(1),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl From<&FetchSettings> for FetchOptions {
    fn from(s: &FetchSettings) -> Self {
        Self {
            batch_size: s.batch_size.max(1),
            max_workers: s.max_workers.max(1),
            batch_delay: Duration::from_millis(s.batch_delay_ms),
            max_attempts: s.max_attempts.max(1),
            retry_delay: Duration::from_millis(s.retry_delay_ms),
        }
    }
}

impl FetchOptions {
    /// No sleeping anywhere; for tests and in-memory providers.
    pub fn immediate() -> Self {
        Self {
            batch_delay: Duration::ZERO,
            retry_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Outcome of a universe fetch.
#[derive(Debug, Default)]
pub struct UniverseFetch {
    /// Non-empty canonical series, in input symbol order.
    pub series: Vec<PriceSeries>,
    pub failures: Vec<(String, DataError)>,
}

impl UniverseFetch {
    pub fn all_failed(&self) -> bool {
        self.series.is_empty()
    }
}

/// Fetch `[start, end]` for every symbol.
///
/// Never fails as a whole: each symbol lands either in `series` or in
/// `failures`. The caller decides whether "nothing succeeded" is fatal.
pub fn fetch_universe(
    provider: &dyn DataProvider,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
    options: &FetchOptions,
    progress: &dyn FetchProgress,
) -> UniverseFetch {
    let total = symbols.len();
    let completed = AtomicUsize::new(0);
    let mut out = UniverseFetch::default();

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(options.max_workers.max(1))
        .thread_name(|i| format!("fetch-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, "could not build fetch pool; fetching sequentially");
            None
        }
    };

    let batch_size = options.batch_size.max(1);
    let batch_count = total.div_ceil(batch_size);

    for (batch_idx, batch) in symbols.chunks(batch_size).enumerate() {
        let fetch_one = |symbol: &String| {
            let result = fetch_with_retry(provider, symbol, start, end, options);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            let summary = result.as_ref().map(|s| s.len()).map_err(DataError::clone);
            progress.on_symbol_complete(symbol, done, total, &summary);
            (symbol.clone(), result)
        };

        // collect() on an indexed parallel iterator keeps input order
        let results: Vec<(String, Result<PriceSeries, DataError>)> = match &pool {
            Some(pool) => pool.install(|| batch.par_iter().map(fetch_one).collect()),
            None => batch.iter().map(fetch_one).collect(),
        };

        for (symbol, result) in results {
            match result {
                Ok(series) => out.series.push(series),
                Err(e) => out.failures.push((symbol, e)),
            }
        }

        if batch_idx + 1 < batch_count && !options.batch_delay.is_zero() {
            std::thread::sleep(options.batch_delay);
        }
    }

    progress.on_batch_complete(out.series.len(), out.failures.len(), total);
    out
}

/// One symbol, up to `max_attempts` tries with a fixed delay in between.
fn fetch_with_retry(
    provider: &dyn DataProvider,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    options: &FetchOptions,
) -> Result<PriceSeries, DataError> {
    let attempts = options.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 && !options.retry_delay.is_zero() {
            std::thread::sleep(options.retry_delay);
        }

        if !provider.is_available() {
            debug!(%symbol, provider = provider.name(), "provider unavailable, skipping");
            return Err(DataError::CircuitBreakerTripped);
        }

        match provider.fetch(symbol, start, end) {
            Ok(fetched) => {
                let series = canonicalize(symbol, &fetched.bars);
                if series.is_empty() {
                    return Err(DataError::EmptyHistory {
                        symbol: symbol.to_string(),
                    });
                }
                return Ok(series);
            }
            Err(e) if e.is_transient() && attempt < attempts => {
                debug!(%symbol, attempt, error = %e, "retrying fetch");
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| DataError::Other(format!("no attempts made for {symbol}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryProvider;
    use crate::data::provider::NoProgress;
    use crate::domain::PricePoint;
    use std::sync::Mutex;
    use std::time::Instant;

    /// Records every callback it receives.
    #[derive(Default)]
    struct Recorder {
        symbols: Mutex<Vec<(String, usize, usize, bool)>>,
        batches: Mutex<Vec<(usize, usize, usize)>>,
    }

    impl FetchProgress for Recorder {
        fn on_symbol_complete(
            &self,
            symbol: &str,
            completed: usize,
            total: usize,
            result: &Result<usize, DataError>,
        ) {
            self.symbols
                .lock()
                .unwrap()
                .push((symbol.to_string(), completed, total, result.is_ok()));
        }

        fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
            self.batches.lock().unwrap().push((succeeded, failed, total));
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn preserves_input_order_across_batches() {
        let mut provider = InMemoryProvider::new();
        let names = ["E", "D", "C", "B", "A"];
        for name in names {
            provider.insert(name, vec![PricePoint::new(d(2), 10.0)]);
        }
        let opts = FetchOptions {
            batch_size: 2,
            ..FetchOptions::immediate()
        };
        let out = fetch_universe(&provider, &symbols(&names), d(1), d(31), &opts, &NoProgress);
        let got: Vec<&str> = out.series.iter().map(|s| s.symbol()).collect();
        assert_eq!(got, names.to_vec());
        assert!(out.failures.is_empty());
    }

    #[test]
    fn transient_failures_are_retried() {
        let mut provider = InMemoryProvider::new();
        provider.insert("A", vec![PricePoint::new(d(2), 10.0)]);
        provider.fail_first("A", 2);
        let out = fetch_universe(
            &provider,
            &symbols(&["A"]),
            d(1),
            d(31),
            &FetchOptions::immediate(),
            &NoProgress,
        );
        assert_eq!(out.series.len(), 1);
        assert_eq!(provider.calls("A"), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut provider = InMemoryProvider::new();
        provider.insert("A", vec![PricePoint::new(d(2), 10.0)]);
        provider.fail_first("A", 5);
        let out = fetch_universe(
            &provider,
            &symbols(&["A"]),
            d(1),
            d(31),
            &FetchOptions::immediate(),
            &NoProgress,
        );
        assert!(out.all_failed());
        assert_eq!(out.failures.len(), 1);
        assert_eq!(provider.calls("A"), 3);
    }

    #[test]
    fn unknown_symbol_is_not_retried() {
        let provider = InMemoryProvider::new();
        let out = fetch_universe(
            &provider,
            &symbols(&["NOPE"]),
            d(1),
            d(31),
            &FetchOptions::immediate(),
            &NoProgress,
        );
        assert!(matches!(out.failures[0].1, DataError::SymbolNotFound { .. }));
        assert_eq!(provider.calls("NOPE"), 1);
    }

    #[test]
    fn options_from_settings_clamp_zeroes() {
        let settings = FetchSettings {
            batch_size: 0,
            max_workers: 0,
            batch_delay_ms: 250,
            max_attempts: 0,
            retry_delay_ms: 10,
        };
        let opts = FetchOptions::from(&settings);
        assert_eq!(opts.batch_size, 1);
        assert_eq!(opts.max_workers, 1);
        assert_eq!(opts.max_attempts, 1);
        assert_eq!(opts.batch_delay, Duration::from_millis(250));
    }

    #[test]
    fn progress_reports_every_symbol_and_one_summary() {
        let mut provider = InMemoryProvider::new();
        for name in ["A", "B", "C", "D"] {
            provider.insert(name, vec![PricePoint::new(d(2), 10.0)]);
        }
        let names = symbols(&["A", "MISSING", "B", "C", "GONE", "D"]);
        let opts = FetchOptions {
            batch_size: 4,
            ..FetchOptions::immediate()
        };
        let recorder = Recorder::default();
        let out = fetch_universe(&provider, &names, d(1), d(31), &opts, &recorder);

        let mut calls = recorder.symbols.lock().unwrap().clone();
        assert_eq!(calls.len(), 6);
        calls.sort_by_key(|c| c.1);
        let completed: Vec<usize> = calls.iter().map(|c| c.1).collect();
        assert_eq!(completed, (1..=6).collect::<Vec<_>>());
        assert!(calls.iter().all(|c| c.2 == 6));

        let mut failed: Vec<&str> = calls.iter().filter(|c| !c.3).map(|c| c.0.as_str()).collect();
        failed.sort_unstable();
        assert_eq!(failed, vec!["GONE", "MISSING"]);

        assert_eq!(*recorder.batches.lock().unwrap(), vec![(4, 2, 6)]);
        assert_eq!(out.series.len(), 4);
        assert_eq!(out.failures.len(), 2);
    }

    #[test]
    fn sleeps_between_batches_but_not_after_the_last() {
        let mut provider = InMemoryProvider::new();
        let names = ["A", "B", "C", "D", "E"];
        for name in names {
            provider.insert(name, vec![PricePoint::new(d(2), 10.0)]);
        }
        let delay = Duration::from_millis(150);
        let opts = FetchOptions {
            batch_size: 2,
            batch_delay: delay,
            ..FetchOptions::immediate()
        };

        // three batches, two pauses
        let started = Instant::now();
        let out = fetch_universe(&provider, &symbols(&names), d(1), d(31), &opts, &NoProgress);
        let elapsed = started.elapsed();
        assert_eq!(out.series.len(), 5);
        assert!(elapsed >= delay * 2, "elapsed {elapsed:?}");
        assert!(elapsed < delay * 3, "elapsed {elapsed:?}");
    }

    #[test]
    fn single_batch_does_not_sleep() {
        let mut provider = InMemoryProvider::new();
        provider.insert("A", vec![PricePoint::new(d(2), 10.0)]);
        let delay = Duration::from_millis(300);
        let opts = FetchOptions {
            batch_delay: delay,
            ..FetchOptions::immediate()
        };

        let started = Instant::now();
        fetch_universe(&provider, &symbols(&["A"]), d(1), d(31), &opts, &NoProgress);
        assert!(started.elapsed() < delay);
    }

    #[test]
    fn unavailable_provider_is_not_called() {
        let mut provider = InMemoryProvider::new();
        provider.insert("A", vec![PricePoint::new(d(2), 10.0)]);
        provider.set_blocked(true);
        let out = fetch_universe(
            &provider,
            &symbols(&["A"]),
            d(1),
            d(31),
            &FetchOptions::immediate(),
            &NoProgress,
        );
        assert!(matches!(out.failures[0].1, DataError::CircuitBreakerTripped));
        assert_eq!(provider.calls("A"), 0);

        provider.set_blocked(false);
        let out = fetch_universe(
            &provider,
            &symbols(&["A"]),
            d(1),
            d(31),
            &FetchOptions::immediate(),
            &NoProgress,
        );
        assert_eq!(out.series.len(), 1);
        assert_eq!(provider.calls("A"), 1);
    }
}
