//! Breadth modes, daily breadth observations and the breadth series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Periods that must line up for a symbol to be in bullish alignment:
/// close > MA21 > MA63 > MA127.
pub const ALIGNMENT_PERIODS: [usize; 3] = [21, 63, 127];

/// Which cross-sectional condition is being measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreadthMode {
    /// Share of symbols whose latest close is above their `period`-day SMA.
    MovingAverage { period: usize },
    /// Share of symbols in full bullish alignment.
    BullishAlignment,
}

impl BreadthMode {
    pub fn moving_average(period: usize) -> Self {
        Self::MovingAverage { period }
    }

    /// SMA periods this mode evaluates, shortest first.
    pub fn periods(&self) -> Vec<usize> {
        match self {
            Self::MovingAverage { period } => vec![*period],
            Self::BullishAlignment => ALIGNMENT_PERIODS.to_vec(),
        }
    }

    /// Observations a symbol needs before it counts toward the denominator.
    pub fn required_history(&self) -> usize {
        self.periods().into_iter().max().unwrap_or(0)
    }

    /// Short stable tag used in cache file names (`ma21`, `bullish`).
    pub fn tag(&self) -> String {
        match self {
            Self::MovingAverage { period } => format!("ma{period}"),
            Self::BullishAlignment => "bullish".to_string(),
        }
    }
}

impl fmt::Display for BreadthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MovingAverage { period } => write!(f, "{period}-day MA"),
            Self::BullishAlignment => write!(f, "bullish alignment (MA21 > MA63 > MA127)"),
        }
    }
}

impl FromStr for BreadthMode {
    type Err = String;

    /// Accepts `21`, `ma21`, `bullish` or `alignment`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "bullish" || lower == "alignment" {
            return Ok(Self::BullishAlignment);
        }
        let digits = lower.strip_prefix("ma").unwrap_or(&lower);
        match digits.parse::<usize>() {
            Ok(period) if period > 0 => Ok(Self::MovingAverage { period }),
            _ => Err(format!(
                "invalid breadth mode '{s}': expected an MA period (e.g. 21) or 'bullish'"
            )),
        }
    }
}

/// Breadth on one grid date.
///
/// `breadth` is `100 * qualifying_count / eligible_count`. Symbols without
/// enough history on `date` are not part of `eligible_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreadthPoint {
    pub date: NaiveDate,
    pub breadth: f64,
    pub qualifying_count: usize,
    pub eligible_count: usize,
    /// Symbols that met the condition (populated in alignment mode).
    pub qualifying_symbols: Vec<String>,
}

impl BreadthPoint {
    /// Returns `None` when nothing was eligible; such dates are omitted
    /// from a series rather than reported as zero.
    pub fn new(
        date: NaiveDate,
        qualifying_count: usize,
        eligible_count: usize,
        qualifying_symbols: Vec<String>,
    ) -> Option<Self> {
        if eligible_count == 0 {
            return None;
        }
        debug_assert!(qualifying_count <= eligible_count);
        Some(Self {
            date,
            breadth: 100.0 * qualifying_count as f64 / eligible_count as f64,
            qualifying_count,
            eligible_count,
            qualifying_symbols,
        })
    }
}

/// Daily breadth observations, ascending by date with unique dates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BreadthSeries {
    points: Vec<BreadthPoint>,
}

impl BreadthSeries {
    pub fn new(mut points: Vec<BreadthPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        // keep the last point for a repeated date
        points.reverse();
        points.dedup_by_key(|p| p.date);
        points.reverse();
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[BreadthPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&BreadthPoint> {
        self.points.last()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.breadth).collect()
    }

    /// The last `n` breadth values (fewer if the series is shorter).
    pub fn tail_values(&self, n: usize) -> Vec<f64> {
        let start = self.points.len().saturating_sub(n);
        self.points[start..].iter().map(|p| p.breadth).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BreadthPoint> {
        self.points.iter()
    }
}
