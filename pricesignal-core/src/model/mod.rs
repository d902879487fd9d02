//! Signal classifier: random forest over indicator features.
//!
//! - `features` — fixed feature-column selection and mean imputation
//! - `scaler` — per-column standardization
//! - `tree` / `forest` — multiclass gini trees and their bootstrap ensemble
//! - `cv` — chronological folds and hyperparameter grid search
//! - `evaluation` — accuracy, per-class precision/recall/F1, confusion matrix
//! - `classifier` — `SignalClassifier`, the trained-state owner

pub mod classifier;
pub mod cv;
pub mod evaluation;
pub mod features;
pub mod forest;
pub mod scaler;
pub mod tree;

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{LabeledRow, NumericRecord, Signal};

pub use classifier::{SignalClassifier, TrainSummary};
pub use cv::{grid_search, time_series_folds, Fold, GridSearchResult, ParamGrid};
pub use evaluation::{macro_f1, ClassMetrics, EvaluationReport};
pub use features::FeatureSet;
pub use forest::{ForestParams, RandomForest};
pub use scaler::StandardScaler;

/// Errors from training, inference and model persistence.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Predict, evaluate, importance or save called before `train`.
    #[error("model has not been trained")]
    NotTrained,

    #[error("no rows to {0}")]
    EmptyInput(&'static str),

    #[error("row has no column '{0}' required by the trained feature set")]
    MissingFeature(String),

    #[error("{samples} samples cannot form {folds} chronological folds (need at least {required})")]
    InsufficientSamples {
        samples: usize,
        folds: usize,
        required: usize,
    },

    #[error("model serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A trainable signal model.
pub trait TradingModel {
    /// Fit on labeled rows. With `tune`, hyperparameters are chosen by
    /// chronological `cv_folds`-fold cross-validation first.
    fn train(
        &mut self,
        rows: &[LabeledRow],
        tune: bool,
        cv_folds: usize,
    ) -> Result<TrainSummary, ModelError>;

    /// One signal per row, in input order.
    fn predict<R: NumericRecord>(&self, rows: &[R]) -> Result<Vec<Signal>, ModelError>;

    fn evaluate(&self, rows: &[LabeledRow]) -> Result<EvaluationReport, ModelError>;
}
