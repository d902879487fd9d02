//! PriceSignal Runner — pipeline stages over the files named in `[data]`.
//!
//! This crate builds on `pricesignal-core` to provide:
//! - Fetch stage: symbol list → provider → price history CSV
//! - Metrics stage: price history → indicator engine → metrics CSV
//! - Training workflow: metrics → labels → chronological holdout → model file
//! - Prediction workflow: metrics + model file → predictions CSV

pub mod pipeline;
pub mod training;

use thiserror::Error;

use pricesignal_core::config::ConfigError;
use pricesignal_core::data::DataError;
use pricesignal_core::model::ModelError;

pub use pipeline::{compute_metrics, fetch_prices, FetchSummary, MetricsSummary};
pub use training::{
    chronological_split, predict_signals, train_model, HoldoutSplit, PredictionSummary,
    TrainingReport,
};

/// Errors from a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("{labeled} labeled rows span {dates} date(s); a holdout needs at least 2")]
    TooFewDates { labeled: usize, dates: usize },

    #[error("no training rows left after purging {purged} overlapping the holdout")]
    NoTrainingRows { purged: usize },
}
