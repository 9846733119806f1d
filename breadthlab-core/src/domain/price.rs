//! Closing-price history for a single symbol.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::canonicalize::clean_points;

/// One daily close, already normalized to an exchange-local calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Date-ordered closes for one symbol.
///
/// Construction always canonicalizes: points are sorted ascending, duplicate
/// dates collapse to the last observation, and non-finite or non-positive
/// closes are dropped. Gaps (holidays, halts) are kept as gaps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            symbol: symbol.into(),
            points: clean_points(points),
        }
    }

    /// Build from parallel `(date, close)` pairs.
    pub fn from_pairs(symbol: impl Into<String>, pairs: &[(NaiveDate, f64)]) -> Self {
        let points = pairs
            .iter()
            .map(|&(date, close)| PricePoint::new(date, close))
            .collect();
        Self::new(symbol, points)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn new_sorts_and_dedupes() {
        let s = PriceSeries::from_pairs("AAPL", &[(d(4), 3.0), (d(2), 1.0), (d(4), 4.0), (d(3), 2.0)]);
        assert_eq!(s.dates(), vec![d(2), d(3), d(4)]);
        // last observation for a duplicated date wins
        assert_eq!(s.closes(), vec![1.0, 2.0, 4.0]);
    }

    #[test]
    fn malformed_closes_are_dropped() {
        let s = PriceSeries::from_pairs(
            "AAPL",
            &[(d(2), f64::NAN), (d(3), -1.0), (d(4), f64::INFINITY), (d(5), 10.0)],
        );
        assert_eq!(s.len(), 1);
        assert_eq!(s.first().unwrap().date, d(5));
    }
}
