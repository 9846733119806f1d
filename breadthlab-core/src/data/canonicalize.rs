//! Boundary normalization for fetched prices.
//!
//! Providers hand back timestamps in whatever zone they like. Everything past
//! this module works on exchange-local `NaiveDate`s, so cross-symbol and
//! breadth-vs-index comparisons are exact date equality.

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;

use super::provider::RawBar;
use crate::domain::{PricePoint, PriceSeries};

/// Calendar date of a UNIX timestamp on the exchange's wall clock.
///
/// Prefers the IANA zone; falls back to a fixed UTC offset, then to UTC.
pub fn exchange_date(timestamp: i64, zone: Option<Tz>, gmtoffset: Option<i32>) -> Option<NaiveDate> {
    let utc = DateTime::from_timestamp(timestamp, 0)?;
    if let Some(tz) = zone {
        return Some(utc.with_timezone(&tz).date_naive());
    }
    if let Some(offset) = gmtoffset.and_then(FixedOffset::east_opt) {
        return Some(utc.with_timezone(&offset).date_naive());
    }
    Some(utc.date_naive())
}

/// Sort ascending, keep the last observation per date, drop closes that are
/// not finite and positive.
pub fn clean_points(mut points: Vec<PricePoint>) -> Vec<PricePoint> {
    points.retain(|p| p.close.is_finite() && p.close > 0.0);
    points.sort_by_key(|p| p.date);
    points.reverse();
    points.dedup_by_key(|p| p.date);
    points.reverse();
    points
}

/// Reduce raw bars to a canonical close series.
pub fn canonicalize(symbol: &str, bars: &[RawBar]) -> PriceSeries {
    let points = bars
        .iter()
        .map(|b| PricePoint::new(b.date, b.close))
        .collect();
    PriceSeries::new(symbol, points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_york_evening_stays_on_same_day() {
        // 2024-03-01 21:00 ET is 2024-03-02 02:00 UTC
        let ts = 1_709_344_800;
        let ny: Tz = "America/New_York".parse().unwrap();
        assert_eq!(
            exchange_date(ts, Some(ny), None),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(
            exchange_date(ts, None, None),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
    }

    #[test]
    fn gmtoffset_fallback() {
        let ts = 1_709_344_800;
        assert_eq!(
            exchange_date(ts, None, Some(-5 * 3600)),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn canonicalize_drops_nan_closes() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = vec![
            RawBar {
                date,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: f64::NAN,
                volume: 0,
                adj_close: f64::NAN,
            },
            RawBar {
                date: date.succ_opt().unwrap(),
                open: 1.0,
                high: 2.0,
                low: 1.0,
                close: 2.0,
                volume: 10,
                adj_close: 2.0,
            },
        ];
        let s = canonicalize("X", &bars);
        assert_eq!(s.len(), 1);
        assert_eq!(s.symbol(), "X");
        assert_eq!(s.closes(), vec![2.0]);
    }
}
