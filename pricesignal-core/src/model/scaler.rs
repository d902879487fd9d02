//! Z-score standardization fitted on training features.

use serde::{Deserialize, Serialize};

/// Per-column mean and population standard deviation.
///
/// A constant column keeps scale 1.0 so it maps to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(x: &[Vec<f64>]) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let n = x.len() as f64;
        let mut mean = vec![0.0; n_features];
        let mut scale = vec![1.0; n_features];
        if x.is_empty() {
            return Self { mean, scale };
        }

        for j in 0..n_features {
            let m = x.iter().map(|row| row[j]).sum::<f64>() / n;
            let variance = x.iter().map(|row| (row[j] - m).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            mean[j] = m;
            if std > 1e-12 {
                scale[j] = std;
            }
        }
        Self { mean, scale }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&v, (&m, &s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform_row(row)).collect()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }
}
