//! Multiclass CART decision tree with gini impurity.
//!
//! Trees are grown on a sample of row indices (a bootstrap sample may repeat
//! rows). At each node a random subset of `max_features` columns is searched;
//! candidate thresholds are midpoints between consecutive distinct values and
//! rows with `value <= threshold` go left.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::Signal;

type ClassCounts = [usize; Signal::COUNT];

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Columns examined per split.
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        /// Class fractions in Hold, Buy, Sell order.
        distribution: [f64; Signal::COUNT],
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        samples: usize,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn leaf(counts: &ClassCounts, samples: usize) -> Self {
        let mut distribution = [0.0; Signal::COUNT];
        if samples > 0 {
            for (d, &c) in distribution.iter_mut().zip(counts) {
                *d = c as f64 / samples as f64;
            }
        }
        TreeNode::Leaf {
            distribution,
            samples,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }
}

/// A fitted classification tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
    /// Impurity decrease per feature, normalized to sum 1 (all zero for a
    /// single-leaf tree).
    importances: Vec<f64>,
}

impl DecisionTree {
    /// Grow a tree on the rows named by `sample`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[Signal],
        sample: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            y,
            params,
            n_features,
            importances: vec![0.0; n_features],
        };
        let mut indices = sample.to_vec();
        let root = builder.build(&mut indices, 0, rng);

        let mut importances = builder.importances;
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        Self { root, importances }
    }

    /// Class distribution of the leaf `row` falls into.
    pub fn predict_proba(&self, row: &[f64]) -> [f64; Signal::COUNT] {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { distribution, .. } => return *distribution,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

struct Builder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [Signal],
    params: &'a TreeParams,
    n_features: usize,
    importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// `n * gini(parent) - n_left * gini(left) - n_right * gini(right)`.
    decrease: f64,
}

impl Builder<'_> {
    fn build(&mut self, indices: &mut [usize], depth: usize, rng: &mut StdRng) -> TreeNode {
        let n = indices.len();
        let counts = self.class_counts(indices);
        let impurity = gini(&counts, n);

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || n < self.params.min_samples_split || impurity <= 0.0 {
            return TreeNode::leaf(&counts, n);
        }

        let Some(split) = self.best_split(indices, &counts, impurity, rng) else {
            return TreeNode::leaf(&counts, n);
        };
        self.importances[split.feature] += split.decrease;

        let x = self.x;
        let mid = partition(indices, |i| x[i][split.feature] <= split.threshold);
        let (left_idx, right_idx) = indices.split_at_mut(mid);
        let left = self.build(left_idx, depth + 1, rng);
        let right = self.build(right_idx, depth + 1, rng);

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            samples: n,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn class_counts(&self, indices: &[usize]) -> ClassCounts {
        let mut counts = [0; Signal::COUNT];
        for &i in indices {
            counts[self.y[i].index()] += 1;
        }
        counts
    }

    fn best_split(
        &self,
        indices: &[usize],
        counts: &ClassCounts,
        impurity: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let parent = n as f64 * impurity;

        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();
        for &feature in features.iter().take(self.params.max_features) {
            let x = self.x;
            sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let mut left = [0usize; Signal::COUNT];
            for k in 0..n - 1 {
                left[self.y[sorted[k]].index()] += 1;
                let value = x[sorted[k]][feature];
                let next = x[sorted[k + 1]][feature];
                if next <= value {
                    continue;
                }

                let n_left = k + 1;
                let n_right = n - n_left;
                let mut right = *counts;
                for (r, l) in right.iter_mut().zip(&left) {
                    *r -= l;
                }
                let decrease = parent
                    - n_left as f64 * gini(&left, n_left)
                    - n_right as f64 * gini(&right, n_right);

                if decrease > 1e-12 && best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    let mut threshold = (value + next) / 2.0;
                    if threshold >= next {
                        threshold = value;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: &ClassCounts, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Move indices satisfying `pred` to the front; returns how many did.
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for k in 0..indices.len() {
        if pred(indices[k]) {
            indices.swap(mid, k);
            mid += 1;
        }
    }
    mid
}
