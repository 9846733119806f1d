//! Breadth computation.
//!
//! Per symbol, SMAs are computed once over the full fetched history; each
//! grid date then reads the values at that symbol's last observation on or
//! before the date. Symbols are evaluated in parallel into per-symbol
//! standings, which are folded into per-date counts afterwards.

use super::cache::{BreadthCache, CacheKey};
use super::calendar;
use crate::clock::Clock;
use crate::data::{fetch_universe, DataProvider, FetchOptions, FetchProgress, NoProgress};
use crate::domain::{BreadthMode, BreadthPoint, BreadthSeries, PriceSeries};
use crate::indicators::Sma;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default maximum age of a cached series.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Errors that abort a breadth computation.
#[derive(Debug, Error)]
pub enum BreadthError {
    #[error("symbol universe is empty")]
    EmptyUniverse,

    #[error("lookback must be at least one day")]
    InvalidLookback,

    #[error("moving-average period must be positive")]
    InvalidPeriod,

    #[error("no price data: all {failed} of {attempted} symbols failed to fetch")]
    NoData { attempted: usize, failed: usize },
}

/// Where a symbol stands on one grid date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    /// Not enough history yet; outside the denominator.
    Ineligible,
    Eligible { qualifies: bool },
}

pub struct BreadthEngine<'a> {
    provider: &'a dyn DataProvider,
    cache: Option<&'a BreadthCache>,
    clock: Arc<dyn Clock>,
    fetch: FetchOptions,
    max_age: Duration,
}

impl<'a> BreadthEngine<'a> {
    pub fn new(provider: &'a dyn DataProvider, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            cache: None,
            clock,
            fetch: FetchOptions::default(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn with_cache(mut self, cache: &'a BreadthCache, max_age: Duration) -> Self {
        self.cache = Some(cache);
        self.max_age = max_age;
        self
    }

    pub fn with_fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    /// Daily breadth for `symbols` over the last `lookback_days` calendar
    /// days.
    pub fn compute_breadth(
        &self,
        symbols: &[String],
        mode: BreadthMode,
        lookback_days: u32,
    ) -> Result<BreadthSeries, BreadthError> {
        self.compute_breadth_with_progress(symbols, mode, lookback_days, &NoProgress)
    }

    pub fn compute_breadth_with_progress(
        &self,
        symbols: &[String],
        mode: BreadthMode,
        lookback_days: u32,
        progress: &dyn FetchProgress,
    ) -> Result<BreadthSeries, BreadthError> {
        if lookback_days == 0 {
            return Err(BreadthError::InvalidLookback);
        }
        if mode.periods().contains(&0) {
            return Err(BreadthError::InvalidPeriod);
        }
        let universe = dedupe(symbols);
        if universe.is_empty() {
            return Err(BreadthError::EmptyUniverse);
        }

        let key = CacheKey::new(mode, universe.len(), lookback_days);
        if let Some(cache) = self.cache {
            if let Some(series) = cache.get(&key, self.max_age) {
                info!(key = %key, points = series.len(), "using cached breadth");
                return Ok(series);
            }
        }

        let today = calendar::exchange_today(self.clock.now());
        let grid = calendar::grid(today, lookback_days);
        let grid_start = grid.first().copied().unwrap_or(today);
        let start = calendar::fetch_start(grid_start, mode.required_history());

        info!(
            symbols = universe.len(),
            mode = %mode,
            lookback_days,
            %start,
            end = %today,
            "computing breadth"
        );

        let fetched = fetch_universe(self.provider, &universe, start, today, &self.fetch, progress);
        for (symbol, err) in &fetched.failures {
            warn!(symbol = %symbol, error = %err, "excluding symbol from breadth");
        }
        if fetched.all_failed() {
            return Err(BreadthError::NoData {
                attempted: universe.len(),
                failed: fetched.failures.len(),
            });
        }

        let series = breadth_from_series(&fetched.series, mode, &grid);
        info!(
            points = series.len(),
            used = fetched.series.len(),
            failed = fetched.failures.len(),
            "breadth computed"
        );

        match self.cache {
            Some(cache) if !series.is_empty() => {
                if let Err(e) = cache.put(&key, &series) {
                    warn!(key = %key, error = %e, "could not write breadth cache");
                }
            }
            Some(_) => debug!(key = %key, "empty breadth series not cached"),
            None => {}
        }

        Ok(series)
    }
}

/// Pure breadth fold over already-fetched histories.
///
/// `grid` must be ascending; the output is the subsequence of grid dates
/// with at least one eligible symbol.
pub fn breadth_from_series(
    histories: &[PriceSeries],
    mode: BreadthMode,
    grid: &[NaiveDate],
) -> BreadthSeries {
    let record_symbols = matches!(mode, BreadthMode::BullishAlignment);

    let standings: Vec<Vec<Standing>> = histories
        .par_iter()
        .map(|h| symbol_standings(h, mode, grid))
        .collect();

    let points = grid
        .iter()
        .enumerate()
        .filter_map(|(i, &date)| {
            let mut eligible = 0;
            let mut qualifying = 0;
            let mut names = Vec::new();
            for (history, per_date) in histories.iter().zip(&standings) {
                if let Standing::Eligible { qualifies } = per_date[i] {
                    eligible += 1;
                    if qualifies {
                        qualifying += 1;
                        if record_symbols {
                            names.push(history.symbol().to_string());
                        }
                    }
                }
            }
            BreadthPoint::new(date, qualifying, eligible, names)
        })
        .collect();

    BreadthSeries::new(points)
}

/// One symbol's standing on every grid date.
fn symbol_standings(history: &PriceSeries, mode: BreadthMode, grid: &[NaiveDate]) -> Vec<Standing> {
    let required = mode.required_history();
    let closes = history.closes();
    let dates = history.dates();
    let averages: Vec<Sma> = mode.periods().into_iter().map(Sma::new).collect();

    // grid is ascending, so the as-of cursor only moves forward; holidays
    // repeat the previous index and reuse its standing
    let mut seen = 0;
    let mut last: Option<(usize, Standing)> = None;
    grid.iter()
        .map(|&date| {
            while seen < dates.len() && dates[seen] <= date {
                seen += 1;
            }
            if seen < required {
                return Standing::Ineligible;
            }
            let idx = seen - 1;
            if let Some((prev, standing)) = last {
                if prev == idx {
                    return standing;
                }
            }
            let mas: Vec<f64> = averages.iter().map(|sma| sma.mean_at(&closes, idx)).collect();
            let standing = Standing::Eligible {
                qualifies: qualifies(closes[idx], &mas),
            };
            last = Some((idx, standing));
            standing
        })
        .collect()
}

/// `close > mas[0] > mas[1] > ...`, strictly, with every value finite.
fn qualifies(close: f64, mas: &[f64]) -> bool {
    if !close.is_finite() || mas.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let mut prev = close;
    for &ma in mas {
        if prev <= ma {
            return false;
        }
        prev = ma;
    }
    true
}

/// Drop repeated tickers, keeping first occurrence order.
fn dedupe(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}
