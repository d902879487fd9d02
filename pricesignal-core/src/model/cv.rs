//! Chronological cross-validation and hyperparameter grid search.
//!
//! Rows must already be in time order. Fold `k` trains on every row before
//! its test block and tests on the next `n / (folds + 1)` rows, so the
//! training window expands and no fold ever sees the future. Rows are never
//! shuffled.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::evaluation::macro_f1;
use super::forest::{ForestParams, RandomForest};
use super::ModelError;
use crate::domain::Signal;

// ─── Folds ───────────────────────────────────────────────────────────

/// One train/test split, as half-open row ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub fold_index: usize,
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl Fold {
    pub fn train_range(&self) -> std::ops::Range<usize> {
        0..self.train_end
    }

    pub fn test_range(&self) -> std::ops::Range<usize> {
        self.test_start..self.test_end
    }
}

/// Expanding-window folds over `n_samples` time-ordered rows.
///
/// The test blocks are the last `folds * (n / (folds + 1))` rows; any
/// remainder goes to the first training window.
pub fn time_series_folds(n_samples: usize, folds: usize) -> Result<Vec<Fold>, ModelError> {
    let required = folds + 1;
    if folds < 2 || n_samples < required {
        return Err(ModelError::InsufficientSamples {
            samples: n_samples,
            folds,
            required,
        });
    }

    let test_size = n_samples / required;
    let first_test = n_samples - folds * test_size;

    Ok((0..folds)
        .map(|k| {
            let test_start = first_test + k * test_size;
            Fold {
                fold_index: k,
                train_end: test_start,
                test_start,
                test_end: test_start + test_size,
            }
        })
        .collect())
}

// ─── Grid search ─────────────────────────────────────────────────────

/// Candidate values per hyperparameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100, 200],
            max_depth: vec![None, Some(10), Some(20), Some(30)],
            min_samples_split: vec![2, 5, 10],
        }
    }
}

impl ParamGrid {
    /// Cartesian product, `n_estimators` varying slowest.
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(
            self.n_estimators.len() * self.max_depth.len() * self.min_samples_split.len(),
        );
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    out.push(ForestParams {
                        n_estimators,
                        max_depth,
                        min_samples_split,
                    });
                }
            }
        }
        out
    }
}

/// Outcome of a grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub best_params: ForestParams,
    /// Mean macro-F1 of the best candidate across folds.
    pub best_score: f64,
    /// Every candidate with its mean score, in grid order.
    pub scores: Vec<(ForestParams, f64)>,
}

/// Score every candidate by mean macro-F1 over chronological folds.
///
/// Candidates are evaluated in parallel. The first candidate (grid order)
/// with the highest mean score wins.
pub fn grid_search(
    x: &[Vec<f64>],
    y: &[Signal],
    grid: &ParamGrid,
    folds: usize,
    seed: u64,
) -> Result<GridSearchResult, ModelError> {
    let splits = time_series_folds(x.len(), folds)?;
    let candidates = grid.candidates();
    if candidates.is_empty() {
        return Err(ModelError::EmptyInput("search an empty grid of"));
    }

    let scores: Vec<(ForestParams, f64)> = candidates
        .par_iter()
        .map(|&params| {
            let fold_scores = splits
                .iter()
                .map(|fold| score_fold(params, seed, x, y, fold))
                .collect::<Result<Vec<f64>, ModelError>>()?;
            let mean = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            debug!(%params, score = mean, "scored candidate");
            Ok((params, mean))
        })
        .collect::<Result<_, ModelError>>()?;

    let (best_params, best_score) = scores
        .iter()
        .copied()
        .fold(None, |best: Option<(ForestParams, f64)>, (p, s)| match best {
            Some((_, b)) if s <= b => best,
            _ => Some((p, s)),
        })
        .ok_or(ModelError::EmptyInput("search an empty grid of"))?;

    info!(
        params = %best_params,
        score = best_score,
        candidates = scores.len(),
        folds,
        "grid search finished"
    );

    Ok(GridSearchResult {
        best_params,
        best_score,
        scores,
    })
}

fn score_fold(
    params: ForestParams,
    seed: u64,
    x: &[Vec<f64>],
    y: &[Signal],
    fold: &Fold,
) -> Result<f64, ModelError> {
    let forest = RandomForest::fit(params, seed, &x[fold.train_range()], &y[fold.train_range()])?;
    let predicted = forest.predict(&x[fold.test_range()]);
    Ok(macro_f1(&y[fold.test_range()], &predicted))
}
