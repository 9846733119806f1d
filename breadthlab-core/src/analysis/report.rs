//! Rule-based market condition report.
//!
//! A pure function of the latest breadth value, the recent breadth window,
//! the recent index closes and (optionally) the current bullish-alignment
//! percentage. All thresholds are fixed.

use crate::domain::{BreadthSeries, IndexSeries};
use serde::Serialize;

/// Points of history the report looks at.
pub const RECENT_WINDOW: usize = 20;

pub const EXTREME_OVERSOLD: f64 = 20.0;
pub const OVERSOLD: f64 = 40.0;
pub const STRONG: f64 = 60.0;
pub const OVERBOUGHT: f64 = 80.0;
pub const DIVERGENCE_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Success,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    ExtremeOversold,
    Oversold,
    Neutral,
    Strong,
    Overbought,
}

impl MarketStatus {
    /// Bands are checked in order: <=20, <=40, >=80, >=60, else neutral.
    pub fn classify(breadth: f64) -> Self {
        if breadth <= EXTREME_OVERSOLD {
            Self::ExtremeOversold
        } else if breadth <= OVERSOLD {
            Self::Oversold
        } else if breadth >= OVERBOUGHT {
            Self::Overbought
        } else if breadth >= STRONG {
            Self::Strong
        } else {
            Self::Neutral
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ExtremeOversold => "Market is extremely oversold; a rebound may be near",
            Self::Oversold => "Market is oversold; watch for signs of stabilization",
            Self::Neutral => "Market is neutral; waiting is reasonable",
            Self::Strong => "Market is strong; optimism is warranted",
            Self::Overbought => "Market is overbought; beware of a pullback",
        }
    }

    pub fn alert_level(&self) -> AlertLevel {
        match self {
            Self::ExtremeOversold | Self::Oversold => AlertLevel::Warning,
            Self::Overbought => AlertLevel::Danger,
            Self::Strong => AlertLevel::Success,
            Self::Neutral => AlertLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub strength: Strength,
    /// Mean day-over-day change in breadth points; NaN with fewer than two
    /// observations.
    pub mean_change: f64,
    pub description: &'static str,
}

impl Trend {
    /// Anything not above zero and not below -1 (including NaN) is weak-down.
    pub fn classify(window: &[f64]) -> Self {
        let mean_change = mean(&diffs(window));
        let (direction, strength, description) = if mean_change > 1.0 {
            (TrendDirection::Up, Strength::Strong, "Breadth is rising clearly")
        } else if mean_change > 0.0 {
            (TrendDirection::Up, Strength::Weak, "Breadth is rising slowly")
        } else if mean_change < -1.0 {
            (TrendDirection::Down, Strength::Strong, "Breadth is falling clearly")
        } else {
            (TrendDirection::Down, Strength::Weak, "Breadth is falling slowly")
        };
        Self {
            direction,
            strength,
            mean_change,
            description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
    /// Breadth outperforming the index.
    Positive,
    /// Breadth lagging the index.
    Negative,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    /// Sum of periodic percent changes of breadth over the window.
    pub breadth_change: f64,
    /// Sum of periodic percent changes of index closes over the window.
    pub index_change: f64,
    pub description: &'static str,
}

impl Divergence {
    /// Changes are summed, not compounded.
    pub fn classify(breadth_window: &[f64], index_window: &[f64]) -> Self {
        let breadth_change = summed_pct_change(breadth_window);
        let index_change = summed_pct_change(index_window);
        let (kind, description) = if (breadth_change - index_change).abs() > DIVERGENCE_THRESHOLD {
            if breadth_change > index_change {
                (
                    DivergenceKind::Positive,
                    "Breadth is stronger than the index; may precede a rally",
                )
            } else {
                (
                    DivergenceKind::Negative,
                    "Breadth is weaker than the index; beware of a pullback",
                )
            }
        } else {
            (DivergenceKind::None, "Breadth and the index are moving together")
        };
        Self {
            kind,
            breadth_change,
            index_change,
            description,
        }
    }

    pub fn exists(&self) -> bool {
        self.kind != DivergenceKind::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Risk {
    pub level: RiskLevel,
    /// Sample standard deviation of breadth over the window.
    pub volatility: f64,
    pub description: &'static str,
}

impl Risk {
    pub fn classify(window: &[f64]) -> Self {
        let volatility = sample_std(window);
        let (level, description) = if volatility > 15.0 {
            (RiskLevel::High, "Breadth is swinging sharply; risk is elevated")
        } else if volatility > 10.0 {
            (RiskLevel::Medium, "Breadth volatility is moderate; risk is manageable")
        } else {
            (RiskLevel::Low, "Breadth is steady; risk is low")
        };
        Self {
            level,
            volatility,
            description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Buy,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub strength: Strength,
    pub description: &'static str,
}

/// Buy at or below the extreme-oversold band, sell at or above overbought.
pub fn signals(latest: f64) -> Vec<Signal> {
    let mut out = Vec::new();
    if latest <= EXTREME_OVERSOLD {
        out.push(Signal {
            kind: SignalKind::Buy,
            strength: Strength::Strong,
            description: "Extremely oversold; consider buying weakness",
        });
    }
    if latest >= OVERBOUGHT {
        out.push(Signal {
            kind: SignalKind::Sell,
            strength: Strength::Strong,
            description: "Overbought; consider trimming exposure",
        });
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    Strong,
    ModeratelyStrong,
    Neutral,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignmentAssessment {
    pub percentage: f64,
    pub status: AlignmentStatus,
    pub alert_level: AlertLevel,
    pub description: &'static str,
}

impl AlignmentAssessment {
    pub fn classify(percentage: f64) -> Self {
        let (status, alert_level, description) = if percentage >= 50.0 {
            (
                AlignmentStatus::Strong,
                AlertLevel::Success,
                "More than half of stocks are in bullish alignment; the market is strong",
            )
        } else if percentage >= 30.0 {
            (
                AlignmentStatus::ModeratelyStrong,
                AlertLevel::Info,
                "Many stocks are in bullish alignment; the market leans optimistic",
            )
        } else if percentage >= 15.0 {
            (
                AlignmentStatus::Neutral,
                AlertLevel::Warning,
                "Some stocks are in bullish alignment; the trend is unclear",
            )
        } else {
            (
                AlignmentStatus::Weak,
                AlertLevel::Danger,
                "Few stocks are in bullish alignment; the market may be weak",
            )
        };
        Self {
            percentage,
            status,
            alert_level,
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusAssessment {
    pub status: MarketStatus,
    pub alert_level: AlertLevel,
    pub description: &'static str,
}

impl From<MarketStatus> for StatusAssessment {
    fn from(status: MarketStatus) -> Self {
        Self {
            status,
            alert_level: status.alert_level(),
            description: status.description(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketReport {
    pub latest_breadth: f64,
    pub status: StatusAssessment,
    pub trend: Trend,
    pub divergence: Divergence,
    pub signals: Vec<Signal>,
    pub risk: Risk,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bullish_alignment: Option<AlignmentAssessment>,
}

impl MarketReport {
    /// Report on the last [`RECENT_WINDOW`] points of each series.
    ///
    /// `None` when there is no breadth to report on. An empty index series
    /// contributes zero change.
    pub fn analyze(
        breadth: &BreadthSeries,
        index: &IndexSeries,
        alignment_pct: Option<f64>,
    ) -> Option<Self> {
        let latest = breadth.latest()?.breadth;
        Some(Self::from_windows(
            latest,
            &breadth.tail_values(RECENT_WINDOW),
            &index.tail_closes(RECENT_WINDOW),
            alignment_pct,
        ))
    }

    pub fn from_windows(
        latest_breadth: f64,
        breadth_window: &[f64],
        index_window: &[f64],
        alignment_pct: Option<f64>,
    ) -> Self {
        Self {
            latest_breadth,
            status: MarketStatus::classify(latest_breadth).into(),
            trend: Trend::classify(breadth_window),
            divergence: Divergence::classify(breadth_window, index_window),
            signals: signals(latest_breadth),
            risk: Risk::classify(breadth_window),
            bullish_alignment: alignment_pct.map(AlignmentAssessment::classify),
        }
    }
}

fn diffs(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// `sum(100 * (v[t] - v[t-1]) / v[t-1])`.
///
/// A flat step from zero is undefined and skipped. A rise from zero is an
/// infinite change and is kept, so it dominates the sum.
fn summed_pct_change(values: &[f64]) -> f64 {
    values
        .windows(2)
        .map(|w| 100.0 * (w[1] - w[0]) / w[0])
        .filter(|c| !c.is_nan())
        .sum()
}

/// Standard deviation with one degree of freedom; NaN below two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}
