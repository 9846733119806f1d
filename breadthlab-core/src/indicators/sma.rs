//! Simple Moving Average (SMA).
//!
//! Arithmetic mean of the trailing `period` closes.
//! Lookback: period - 1 (first valid value at index period-1). No partial
//! windows: fewer than `period` closes yields NaN.
//!
//! Every window is summed on its own, never carried over from the previous
//! one, so the mean at an index depends only on the closes inside the window.
//! A window of identical closes returns that close exactly.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    name: String,
}

impl Sma {
    /// `period` of zero is treated as one.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("sma_{period}"),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Mean of the `period` closes ending at `idx` (inclusive).
    ///
    /// NaN for an incomplete window or one holding a non-finite close.
    pub fn mean_at(&self, closes: &[f64], idx: usize) -> f64 {
        let p = self.period;
        if idx >= closes.len() || idx + 1 < p {
            return f64::NAN;
        }
        let window = &closes[idx + 1 - p..=idx];
        if window.iter().any(|c| !c.is_finite()) {
            return f64::NAN;
        }
        let first = window[0];
        if window.iter().all(|&c| c == first) {
            return first;
        }
        window.iter().sum::<f64>() / p as f64
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, closes: &[f64]) -> Vec<f64> {
        (0..closes.len()).map(|i| self.mean_at(closes, i)).collect()
    }
}
