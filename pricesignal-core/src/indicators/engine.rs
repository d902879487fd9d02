//! Indicator engine — per-symbol feature rows from closing prices.
//!
//! Only bars with a full long window of history behind them are eligible:
//! index `i` qualifies when `i >= window_long`. Earlier bars are warmup and
//! are skipped (counted, not errors). A symbol with no eligible bar at all is
//! reported as `InsufficientHistory` and left out of the batch.

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::window::{normalize, project_price};
use crate::config::{ConfigError, MetricsConfig};
use crate::domain::{FeatureRow, PriceSeries};

/// A symbol has too few points for the long window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient history for {symbol}: {points} points, need at least {required}")]
pub struct InsufficientHistory {
    pub symbol: String,
    pub points: usize,
    pub required: usize,
}

/// Feature rows for one symbol plus bookkeeping.
#[derive(Debug, Clone)]
pub struct SymbolFeatures {
    pub symbol: String,
    /// Chronological rows.
    pub rows: Vec<FeatureRow>,
    /// Bars skipped because the long window was not yet full.
    pub warmup_skipped: usize,
    /// Projection fields left undefined because of a non-positive price.
    pub undefined_projections: usize,
}

/// Feature rows for a batch of symbols.
#[derive(Debug, Clone, Default)]
pub struct FeatureBatch {
    /// Rows grouped by symbol (input order), chronological within a symbol.
    pub rows: Vec<FeatureRow>,
    pub symbols_processed: usize,
    pub skipped: Vec<InsufficientHistory>,
    pub warmup_skipped: usize,
    pub undefined_projections: usize,
}

/// Computes short/long window features for price series.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorEngine {
    short: usize,
    long: usize,
    horizon: usize,
}

impl IndicatorEngine {
    /// Build an engine from validated metrics settings.
    pub fn new(config: &MetricsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            short: config.window_short,
            long: config.window_long,
            horizon: config.predict_days,
        })
    }

    /// Minimum number of points a symbol needs to yield one row.
    pub fn required_points(&self) -> usize {
        self.long + 1
    }

    /// Compute feature rows for a single symbol.
    pub fn compute(&self, series: &PriceSeries) -> Result<SymbolFeatures, InsufficientHistory> {
        let n = series.len();
        if n < self.required_points() {
            return Err(InsufficientHistory {
                symbol: series.symbol.clone(),
                points: n,
                required: self.required_points(),
            });
        }

        let closes = series.closes();
        let mut rows = Vec::with_capacity(n - self.long);
        let mut undefined = 0;

        for i in self.long..n {
            let current = closes[i];
            let short_window = &closes[i - self.short..i];
            let long_window = &closes[i - self.long..i];

            let projected_return_short =
                self.projected_return(short_window, current, &series.symbol, i);
            let projected_return_long =
                self.projected_return(long_window, current, &series.symbol, i);
            undefined += usize::from(projected_return_short.is_none())
                + usize::from(projected_return_long.is_none());

            let point = &series.points[i];
            rows.push(FeatureRow {
                date: point.date,
                symbol: series.symbol.clone(),
                current_price: current,
                normalized_short: normalize(short_window, current),
                normalized_long: normalize(long_window, current),
                projected_return_short,
                projected_return_long,
            });
        }

        debug!(
            symbol = %series.symbol,
            rows = rows.len(),
            warmup = self.long,
            "computed features"
        );

        Ok(SymbolFeatures {
            symbol: series.symbol.clone(),
            rows,
            warmup_skipped: self.long,
            undefined_projections: undefined,
        })
    }

    /// Compute feature rows for many symbols.
    ///
    /// Symbols are processed in parallel; the output keeps input symbol order.
    /// Symbols with insufficient history are skipped and listed in the batch.
    pub fn compute_all(&self, series: &[PriceSeries]) -> FeatureBatch {
        let results: Vec<Result<SymbolFeatures, InsufficientHistory>> =
            series.par_iter().map(|s| self.compute(s)).collect();

        let mut batch = FeatureBatch::default();
        for result in results {
            match result {
                Ok(features) => {
                    info!(
                        symbol = %features.symbol,
                        rows = features.rows.len(),
                        skipped = features.warmup_skipped,
                        "processed symbol"
                    );
                    batch.symbols_processed += 1;
                    batch.warmup_skipped += features.warmup_skipped;
                    batch.undefined_projections += features.undefined_projections;
                    batch.rows.extend(features.rows);
                }
                Err(skip) => {
                    warn!(
                        symbol = %skip.symbol,
                        points = skip.points,
                        required = skip.required,
                        "skipping symbol: insufficient history"
                    );
                    batch.skipped.push(skip);
                }
            }
        }
        batch
    }

    /// Projected price `horizon` bars past the current bar, relative to the
    /// current price. `None` when the ratio is undefined.
    fn projected_return(
        &self,
        window: &[f64],
        current: f64,
        symbol: &str,
        index: usize,
    ) -> Option<f64> {
        if current == 0.0 {
            return None;
        }
        match project_price(window, window.len() + self.horizon) {
            Ok(projected) => Some(projected / current),
            Err(e) => {
                debug!(symbol, index, window = window.len(), error = %e, "projection undefined");
                None
            }
        }
    }
}
