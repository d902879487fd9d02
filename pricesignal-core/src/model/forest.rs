//! Random forest: bootstrap-sampled trees built in parallel.
//!
//! Every tree draws its bootstrap sample and split-feature order from its own
//! RNG, seeded from `(seed, tree index)` through the RNG hierarchy. The fitted
//! forest is therefore identical however rayon schedules the trees.

use std::fmt;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{DecisionTree, TreeParams};
use super::ModelError;
use crate::config::ModelConfig;
use crate::domain::Signal;
use crate::rng::RngHierarchy;

/// The tunable forest hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl ForestParams {
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
        }
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n_estimators={}, max_depth=", self.n_estimators)?;
        match self.max_depth {
            Some(d) => write!(f, "{d}")?,
            None => f.write_str("none")?,
        }
        write!(f, ", min_samples_split={}", self.min_samples_split)
    }
}

/// A fitted random forest classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Fit `params.n_estimators` trees on bootstrap samples of `(x, y)`.
    pub fn fit(
        params: ForestParams,
        seed: u64,
        x: &[Vec<f64>],
        y: &[Signal],
    ) -> Result<Self, ModelError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ModelError::EmptyInput("fit a forest on"));
        }
        let n = x.len();
        let n_features = x[0].len();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            max_features: ((n_features as f64).sqrt() as usize).max(1),
        };
        let rngs = RngHierarchy::new(seed);

        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut rng = rngs.rng_for("tree", i as u64);
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, &sample, &tree_params, &mut rng)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            for (total, &imp) in importances.iter_mut().zip(tree.importances()) {
                *total += imp;
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut importances {
                *imp /= sum;
            }
        }

        debug!(
            trees = trees.len(),
            samples = n,
            features = n_features,
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "fitted forest"
        );

        Ok(Self {
            trees,
            importances,
        })
    }

    /// Mean of the per-tree leaf distributions, in Hold, Buy, Sell order.
    pub fn predict_proba_row(&self, row: &[f64]) -> [f64; Signal::COUNT] {
        let mut proba = [0.0; Signal::COUNT];
        for tree in &self.trees {
            for (p, q) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *p += q;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for p in &mut proba {
            *p /= n;
        }
        proba
    }

    /// Most probable class; ties go to the earlier class in Hold, Buy, Sell order.
    pub fn predict_row(&self, row: &[f64]) -> Signal {
        argmax(&self.predict_proba_row(row))
    }

    pub fn predict(&self, x: &[Vec<f64>]) -> Vec<Signal> {
        x.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Mean-decrease-impurity importance per feature, summing to 1 unless
    /// no tree ever split.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

pub(crate) fn argmax(proba: &[f64; Signal::COUNT]) -> Signal {
    let mut best = 0;
    for (i, &p) in proba.iter().enumerate().skip(1) {
        if p > proba[best] {
            best = i;
        }
    }
    Signal::from_index(best).unwrap_or(Signal::Hold)
}
