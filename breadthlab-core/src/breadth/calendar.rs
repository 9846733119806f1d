//! The business-day grid breadth is reported on.
//!
//! The grid is Monday through Friday in exchange-local dates. It ignores
//! exchange holidays: a holiday simply carries the previous session's
//! standings forward, since each symbol is read as of its last observation.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

/// Exchange timezone that defines "today".
pub const EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

/// Calendar days added on top of the weekday conversion, covering holidays.
const HOLIDAY_SLACK_DAYS: i64 = 14;

/// The exchange-local calendar date at instant `now`.
pub fn exchange_today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&EXCHANGE_TZ).date_naive()
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Every weekday in `[start, end]`, ascending. Empty if `start > end`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| is_business_day(*d))
        .collect()
}

/// The output date axis: business days from `today - lookback_days` through
/// `today`.
pub fn grid(today: NaiveDate, lookback_days: u32) -> Vec<NaiveDate> {
    business_days(today - Duration::days(i64::from(lookback_days)), today)
}

/// Calendar days needed to cover `trading_days` sessions.
///
/// Five sessions per seven calendar days, rounded up, plus slack for
/// holidays.
pub fn warmup_calendar_days(trading_days: usize) -> i64 {
    let trading_days = trading_days as i64;
    (trading_days * 7 + 4) / 5 + HOLIDAY_SLACK_DAYS
}

/// First date to fetch so the earliest grid date already has a full
/// `required_history` window behind it.
pub fn fetch_start(grid_start: NaiveDate, required_history: usize) -> NaiveDate {
    grid_start - Duration::days(warmup_calendar_days(required_history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn today_is_new_york_date() {
        // 2024-03-02 02:00 UTC is still Friday evening in New York.
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap();
        assert_eq!(exchange_today(now), d(2024, 3, 1));
        let later = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(exchange_today(later), d(2024, 3, 2));
    }

    #[test]
    fn business_days_skip_weekends() {
        // Thu 2024-03-07 .. Tue 2024-03-12
        let days = business_days(d(2024, 3, 7), d(2024, 3, 12));
        assert_eq!(
            days,
            vec![d(2024, 3, 7), d(2024, 3, 8), d(2024, 3, 11), d(2024, 3, 12)]
        );
        assert!(business_days(d(2024, 3, 12), d(2024, 3, 7)).is_empty());
    }

    #[test]
    fn grid_is_inclusive_of_both_ends() {
        // Fri 2024-03-15, lookback 7 calendar days -> Fri 2024-03-08 .. Fri
        let g = grid(d(2024, 3, 15), 7);
        assert_eq!(g.first(), Some(&d(2024, 3, 8)));
        assert_eq!(g.last(), Some(&d(2024, 3, 15)));
        assert_eq!(g.len(), 6);
    }

    #[test]
    fn grid_on_a_weekend_ends_friday() {
        let g = grid(d(2024, 3, 17), 3); // Sun, lookback to Thu
        assert_eq!(g, vec![d(2024, 3, 14), d(2024, 3, 15)]);
    }

    #[test]
    fn warmup_covers_sessions() {
        assert_eq!(warmup_calendar_days(5), 7 + 14);
        assert_eq!(warmup_calendar_days(21), 30 + 14); // ceil(147/5) = 30
        assert_eq!(warmup_calendar_days(127), 178 + 14); // ceil(889/5) = 178
        assert_eq!(warmup_calendar_days(0), 14);

        // Enough weekdays really exist in the warm-up span.
        for n in [1usize, 21, 63, 127, 200] {
            let start = d(2024, 1, 2);
            let from = fetch_start(start, n);
            let available = business_days(from, start - Duration::days(1)).len();
            assert!(available >= n, "period {n}: only {available} weekdays");
        }
    }
}
