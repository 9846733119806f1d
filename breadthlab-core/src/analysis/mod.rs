//! Market condition analysis on top of a breadth series.

pub mod report;

pub use report::{
    AlertLevel, AlignmentAssessment, AlignmentStatus, Divergence, DivergenceKind, MarketReport,
    MarketStatus, Risk, RiskLevel, Signal, SignalKind, StatusAssessment, Strength, Trend,
    TrendDirection, RECENT_WINDOW,
};
