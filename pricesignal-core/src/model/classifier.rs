//! `SignalClassifier`: owns the fitted feature set, scaler and forest.
//!
//! A classifier starts untrained. `train` moves it to trained and every later
//! `train` refits in place; every other operation fails with
//! `ModelError::NotTrained` until then. The feature columns are fixed by the
//! first successful training call and reused by all later calls, including
//! retraining.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::cv::{grid_search, ParamGrid};
use super::evaluation::EvaluationReport;
use super::features::FeatureSet;
use super::forest::{ForestParams, RandomForest};
use super::scaler::StandardScaler;
use super::{ModelError, TradingModel};
use crate::config::ModelConfig;
use crate::domain::{LabeledRow, NumericRecord, Signal};
use crate::labels::LabelCounts;

/// Fitted parameters of a trained classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub features: FeatureSet,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
enum ModelState {
    Untrained,
    Trained(TrainedModel),
}

/// What a training call did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    pub samples: usize,
    pub features: Vec<String>,
    pub params: ForestParams,
    /// Mean cross-validated macro-F1 of the chosen parameters, when tuned.
    pub cv_score: Option<f64>,
    pub label_counts: LabelCounts,
}

/// Random-forest signal classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalClassifier {
    config: ModelConfig,
    grid: ParamGrid,
    state: ModelState,
}

impl SignalClassifier {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            grid: ParamGrid::default(),
            state: ModelState::Untrained,
        }
    }

    /// Replace the hyperparameter grid searched when training with tuning.
    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.state, ModelState::Trained(_))
    }

    pub fn trained(&self) -> Result<&TrainedModel, ModelError> {
        match &self.state {
            ModelState::Trained(model) => Ok(model),
            ModelState::Untrained => Err(ModelError::NotTrained),
        }
    }

    /// Per-row class probabilities in Hold, Buy, Sell order.
    pub fn predict_proba<R: NumericRecord>(
        &self,
        rows: &[R],
    ) -> Result<Vec<[f64; Signal::COUNT]>, ModelError> {
        let model = self.trained()?;
        let x = model.scaler.transform(&model.features.matrix(rows)?);
        Ok(x.iter().map(|row| model.forest.predict_proba_row(row)).collect())
    }

    /// `(feature name, importance)` for every feature, in feature order.
    pub fn feature_importance(&self) -> Result<Vec<(String, f64)>, ModelError> {
        let model = self.trained()?;
        Ok(model
            .features
            .names()
            .iter()
            .cloned()
            .zip(model.forest.feature_importances().iter().copied())
            .collect())
    }

    /// Write the classifier as JSON.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        self.trained()?;
        let io_err = |source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(io_err)?;
        info!(path = %path.display(), "saved model");
        Ok(())
    }

    /// Read a classifier written by `save`.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let file = File::open(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let classifier: Self = serde_json::from_reader(BufReader::new(file))?;
        info!(path = %path.display(), trained = classifier.is_trained(), "loaded model");
        Ok(classifier)
    }
}

impl TradingModel for SignalClassifier {
    fn train(
        &mut self,
        rows: &[LabeledRow],
        tune: bool,
        cv_folds: usize,
    ) -> Result<TrainSummary, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyInput("train on"));
        }

        // Folds and the holdout assume time order; stable so same-date rows
        // keep their relative order.
        let mut ordered: Vec<&LabeledRow> = rows.iter().collect();
        ordered.sort_by_key(|row| row.features.date);

        let features = match &self.state {
            ModelState::Trained(model) => model.features.clone(),
            ModelState::Untrained => FeatureSet::select(&ordered)?,
        };
        let x = features.matrix(&ordered)?;
        let y: Vec<Signal> = ordered.iter().map(|row| row.signal).collect();

        let scaler = StandardScaler::fit(&x);
        let x = scaler.transform(&x);

        let seed = self.config.random_state;
        let (params, cv_score) = if tune {
            let search = grid_search(&x, &y, &self.grid, cv_folds, seed)?;
            (search.best_params, Some(search.best_score))
        } else {
            (ForestParams::from_config(&self.config), None)
        };

        let forest = RandomForest::fit(params, seed, &x, &y)?;
        let label_counts = LabelCounts::from_rows(rows);
        info!(
            samples = rows.len(),
            features = features.len(),
            %params,
            tuned = tune,
            "trained classifier"
        );

        let summary = TrainSummary {
            samples: rows.len(),
            features: features.names().to_vec(),
            params,
            cv_score,
            label_counts,
        };
        self.state = ModelState::Trained(TrainedModel {
            features,
            scaler,
            forest,
        });
        Ok(summary)
    }

    fn predict<R: NumericRecord>(&self, rows: &[R]) -> Result<Vec<Signal>, ModelError> {
        let model = self.trained()?;
        let x = model.scaler.transform(&model.features.matrix(rows)?);
        Ok(model.forest.predict(&x))
    }

    fn evaluate(&self, rows: &[LabeledRow]) -> Result<EvaluationReport, ModelError> {
        self.trained()?;
        if rows.is_empty() {
            return Err(ModelError::EmptyInput("evaluate"));
        }
        let predicted = self.predict(rows)?;
        let truth: Vec<Signal> = rows.iter().map(|row| row.signal).collect();
        let report = EvaluationReport::from_predictions(&truth, &predicted);
        info!(
            samples = report.samples,
            accuracy = report.accuracy,
            macro_f1 = report.macro_f1,
            "evaluated classifier"
        );
        Ok(report)
    }
}
