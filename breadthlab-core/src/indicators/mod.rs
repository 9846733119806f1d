//! Indicators over a symbol's close series.
//!
//! Indicators are pure functions: closes in, a same-length numeric series out.
//! The breadth engine precomputes them once per symbol and then reads the
//! value at each grid date's last observation.

pub mod sma;

pub use sma::Sma;

/// Trait for close-based indicators.
///
/// The first `lookback()` outputs are `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No output at index t may depend on a close at index t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g. "sma_21").
    fn name(&self) -> &str;

    /// Number of leading outputs that are warmup NaN.
    fn lookback(&self) -> usize;

    /// Compute over the whole close series; output has the same length.
    fn compute(&self, closes: &[f64]) -> Vec<f64>;
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
