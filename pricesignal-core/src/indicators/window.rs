//! Window statistics: range-normalized position and log-linear trend projection.
//!
//! Both functions are pure and operate on a window of closes ordered oldest to
//! newest. The window excludes the current bar; the current price is passed
//! separately where it participates.

use thiserror::Error;

/// The log transform is undefined for a non-positive price.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("non-positive price in window (value {value} at offset {offset})")]
pub struct DomainError {
    pub offset: usize,
    pub value: f64,
}

/// Position of `current` inside the range spanned by `window` and `current`.
///
/// Returns 0.0 at the low end, 1.0 at the high end and exactly 0.5 when every
/// value (window and current) is identical.
pub fn normalize(window: &[f64], current: f64) -> f64 {
    let (lo, hi) = window
        .iter()
        .fold((current, current), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if hi == lo {
        return 0.5;
    }
    ((current - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Fit `ln(price) = intercept + slope * t` over `t = 0..window.len()` and
/// evaluate the fit at `horizon_steps`.
///
/// `horizon_steps` counts from the oldest point of the window. To project N
/// bars past the current bar (which sits at `t = window.len()`), pass
/// `window.len() + N`. The window must not be empty.
pub fn project_price(window: &[f64], horizon_steps: usize) -> Result<f64, DomainError> {
    debug_assert!(!window.is_empty(), "projection window must not be empty");
    if let Some((offset, &value)) = window
        .iter()
        .enumerate()
        .find(|(_, &v)| v.is_nan() || v <= 0.0)
    {
        return Err(DomainError { offset, value });
    }

    let n = window.len() as f64;
    let t_mean = (n - 1.0) / 2.0;
    let y_mean = window.iter().map(|p| p.ln()).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (t, &p) in window.iter().enumerate() {
        let dt = t as f64 - t_mean;
        sxy += dt * (p.ln() - y_mean);
        sxx += dt * dt;
    }

    // Single-point window: flat fit through the only observation.
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    let intercept = y_mean - slope * t_mean;

    Ok((intercept + slope * horizon_steps as f64).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn normalize_typical_range_above_middle() {
        let result = normalize(&[100.0, 105.0, 110.0, 95.0, 100.0], 107.0);
        assert!((0.0..=1.0).contains(&result));
        assert!(result > 0.5);
    }

    #[test]
    fn normalize_at_max_is_one() {
        assert_eq!(normalize(&[100.0, 105.0, 110.0, 95.0, 100.0], 110.0), 1.0);
    }

    #[test]
    fn normalize_at_min_is_zero() {
        assert_eq!(normalize(&[100.0, 105.0, 110.0, 95.0, 100.0], 95.0), 0.0);
    }

    #[test]
    fn normalize_flat_is_neutral() {
        assert_eq!(normalize(&[100.0, 100.0, 100.0, 100.0], 100.0), 0.5);
    }

    #[test]
    fn normalize_current_outside_window_extends_range() {
        // Current above every window value: it becomes the max.
        assert_eq!(normalize(&[10.0, 11.0, 12.0], 20.0), 1.0);
        // Current below every window value: it becomes the min.
        assert_eq!(normalize(&[10.0, 11.0, 12.0], 5.0), 0.0);
    }

    #[test]
    fn normalize_empty_window_is_neutral() {
        assert_eq!(normalize(&[], 42.0), 0.5);
    }

    #[test]
    fn project_late_jump_trails_last_close() {
        // The fit averages the whole window; one late spike pulls it only part way.
        let window = [1.0, 1.001, 1.002, 1.003, 100.0];
        let result = project_price(&window, window.len()).unwrap();
        assert!(result > 1.003 && result < 100.0, "result={result}");
    }

    #[test]
    fn project_rising_trend_extrapolates_upward() {
        let result = project_price(&[100.0, 102.0, 104.0, 106.0, 108.0], 10).unwrap();
        assert!(result > 108.0);
    }

    #[test]
    fn project_exact_exponential_is_recovered() {
        // p(t) = 50 * e^(0.01 t)
        let window: Vec<f64> = (0..20).map(|t| 50.0 * (0.01 * t as f64).exp()).collect();
        let projected = project_price(&window, 220).unwrap();
        assert_approx(projected, 50.0 * (2.2f64).exp(), 1e-8);
    }

    #[test]
    fn project_constant_window_is_flat() {
        let projected = project_price(&[75.0; 10], 500).unwrap();
        assert_approx(projected, 75.0, DEFAULT_EPSILON);
    }

    #[test]
    fn project_single_point_is_flat() {
        let projected = project_price(&[42.0], 30).unwrap();
        assert_approx(projected, 42.0, DEFAULT_EPSILON);
    }

    #[test]
    fn project_rejects_negative_price() {
        let err = project_price(&[100.0, -50.0, 104.0], 5).unwrap_err();
        assert_eq!(err.offset, 1);
        assert_eq!(err.value, -50.0);
    }

    #[test]
    fn project_rejects_zero_price() {
        assert!(project_price(&[100.0, 0.0, 104.0], 0).is_err());
    }

    #[test]
    fn project_rejects_nan_price() {
        assert!(project_price(&[100.0, f64::NAN], 3).is_err());
    }
}
