//! Benchmark index series rebased to its first observation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::price::PriceSeries;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub date: NaiveDate,
    pub close: f64,
    /// `100 * (close - first_close) / first_close`
    pub change_pct: f64,
}

/// Benchmark closes with percentage change from the first close in the window.
///
/// Invariant: a non-empty series has `points[0].change_pct == 0.0`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexSeries {
    pub symbol: String,
    points: Vec<IndexPoint>,
}

impl IndexSeries {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            points: Vec::new(),
        }
    }

    /// Rebase a canonical price series to its own first close.
    pub fn rebased(prices: &PriceSeries) -> Self {
        let Some(first) = prices.first() else {
            return Self::empty(prices.symbol());
        };
        let base = first.close;
        let points = prices
            .points()
            .iter()
            .map(|p| IndexPoint {
                date: p.date,
                close: p.close,
                change_pct: if p.date == first.date {
                    0.0
                } else {
                    100.0 * (p.close - base) / base
                },
            })
            .collect();
        Self {
            symbol: prices.symbol().to_string(),
            points,
        }
    }

    /// Restrict to `[start, end]` and rebase to the first remaining close,
    /// for overlaying against a breadth series covering that span.
    pub fn clipped(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let pairs: Vec<(NaiveDate, f64)> = self
            .points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .map(|p| (p.date, p.close))
            .collect();
        Self::rebased(&PriceSeries::from_pairs(self.symbol.clone(), &pairs))
    }

    pub fn points(&self) -> &[IndexPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    /// The last `n` closes (fewer if the series is shorter).
    pub fn tail_closes(&self, n: usize) -> Vec<f64> {
        let start = self.points.len().saturating_sub(n);
        self.points[start..].iter().map(|p| p.close).collect()
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    /// Change from first to last close, in percent.
    pub fn total_change_pct(&self) -> Option<f64> {
        self.points.last().map(|p| p.change_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn rebase_starts_at_zero() {
        let prices = PriceSeries::from_pairs("^GSPC", &[(d(1), 200.0), (d(2), 210.0), (d(3), 190.0)]);
        let idx = IndexSeries::rebased(&prices);
        assert_eq!(idx.points()[0].change_pct, 0.0);
        assert!((idx.points()[1].change_pct - 5.0).abs() < 1e-12);
        assert!((idx.points()[2].change_pct + 5.0).abs() < 1e-12);
        assert_eq!(idx.latest_close(), Some(190.0));
    }

    #[test]
    fn rebase_empty_is_empty() {
        let idx = IndexSeries::rebased(&PriceSeries::new("^GSPC", vec![]));
        assert!(idx.is_empty());
        assert_eq!(idx.symbol, "^GSPC");
        assert_eq!(idx.total_change_pct(), None);
    }

    #[test]
    fn clipped_rebases_from_window_start() {
        let prices = PriceSeries::from_pairs("^GSPC", &[(d(1), 100.0), (d(2), 120.0), (d(3), 132.0)]);
        let idx = IndexSeries::rebased(&prices).clipped(d(2), d(3));
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.points()[0].change_pct, 0.0);
        assert!((idx.points()[1].change_pct - 10.0).abs() < 1e-9);
    }
}
