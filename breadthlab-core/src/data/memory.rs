//! In-memory price provider.
//!
//! Serves fixed histories, can inject transient failures, and counts calls.
//! Used for offline runs, tests and benchmarks.

use super::provider::{DataError, DataProvider, DataSource, FetchResult, RawBar};
use crate::domain::PricePoint;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryProvider {
    histories: HashMap<String, Vec<PricePoint>>,
    failures_left: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
    blocked: AtomicBool,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, points: Vec<PricePoint>) {
        self.histories.insert(symbol.into(), points);
    }

    /// Make the next `n` fetches of `symbol` fail with a network error.
    pub fn fail_first(&mut self, symbol: impl Into<String>, n: usize) {
        self.failures_left
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .insert(symbol.into(), n);
    }

    /// Make every fetch of `symbol` fail with a network error.
    pub fn fail_always(&mut self, symbol: impl Into<String>) {
        self.fail_first(symbol, usize::MAX);
    }

    /// Report the provider as unavailable (or available again).
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Number of `fetch` calls made for `symbol`.
    pub fn calls(&self, symbol: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .sum()
    }
}

impl DataProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(symbol.to_string())
            .or_default() += 1;

        {
            let mut failures = self.failures_left.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(left) = failures.get_mut(symbol) {
                if *left > 0 {
                    *left -= 1;
                    return Err(DataError::NetworkUnreachable(format!(
                        "injected failure for {symbol}"
                    )));
                }
            }
        }

        let points = self
            .histories
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            })?;

        let bars = points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .map(|p| RawBar {
                date: p.date,
                open: p.close,
                high: p.close,
                low: p.close,
                close: p.close,
                volume: 0,
                adj_close: p.close,
            })
            .collect();

        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
            source: DataSource::InMemory,
        })
    }

    fn is_available(&self) -> bool {
        !self.blocked.load(Ordering::SeqCst)
    }
}
