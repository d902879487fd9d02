//! Rolling indicators over daily closes.
//!
//! `window` holds the pure statistics (range normalization and log-linear
//! projection); `engine` walks each symbol's history and emits one
//! `FeatureRow` per bar with a full long window behind it.

pub mod engine;
pub mod window;

pub use engine::{FeatureBatch, IndicatorEngine, InsufficientHistory, SymbolFeatures};
pub use window::{normalize, project_price, DomainError};

/// Build a daily price series from closes for testing.
///
/// Dates start at 2024-01-02 and advance one calendar day per point.
#[cfg(test)]
pub fn make_series(symbol: &str, closes: &[f64]) -> crate::domain::PriceSeries {
    use crate::domain::{PricePoint, PriceSeries};
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let points = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            PricePoint::new(base_date + chrono::Duration::days(i as i64), symbol, close)
        })
        .collect();
    PriceSeries::new(symbol, points)
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
