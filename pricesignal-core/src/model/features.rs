//! Feature-column selection and matrix assembly.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ModelError;
use crate::domain::{columns, NumericRecord};

/// The ordered model inputs, fixed at selection time.
///
/// Undefined or non-finite values are replaced with the column mean observed
/// when the set was selected; a column with no defined value at all falls
/// back to 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    names: Vec<String>,
    fill_values: Vec<f64>,
}

impl FeatureSet {
    /// Every numeric column of the rows except label and identity columns.
    pub fn select<R: NumericRecord>(rows: &[R]) -> Result<Self, ModelError> {
        let first = rows.first().ok_or(ModelError::EmptyInput("select features from"))?;
        let names: Vec<String> = first
            .numeric_fields()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| !columns::NON_FEATURE.contains(name))
            .map(str::to_string)
            .collect();

        let mut sums = vec![0.0; names.len()];
        let mut counts = vec![0usize; names.len()];
        for row in rows {
            let fields = row.numeric_fields();
            for (j, name) in names.iter().enumerate() {
                if let Some(v) = lookup(&fields, name).filter(|v| v.is_finite()) {
                    sums[j] += v;
                    counts[j] += 1;
                }
            }
        }
        let fill_values = sums
            .iter()
            .zip(&counts)
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect();

        debug!(rows = rows.len(), features = names.len(), columns = ?names, "selected features");
        Ok(Self { names, fill_values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn fill_values(&self) -> &[f64] {
        &self.fill_values
    }

    /// Row-major matrix of the selected columns, imputed.
    pub fn matrix<R: NumericRecord>(&self, rows: &[R]) -> Result<Vec<Vec<f64>>, ModelError> {
        rows.iter()
            .map(|row| {
                let fields = row.numeric_fields();
                self.names
                    .iter()
                    .zip(&self.fill_values)
                    .map(|(name, &fill)| {
                        if !fields.iter().any(|(n, _)| n == name) {
                            return Err(ModelError::MissingFeature(name.clone()));
                        }
                        Ok(lookup(&fields, name)
                            .filter(|v| v.is_finite())
                            .unwrap_or(fill))
                    })
                    .collect()
            })
            .collect()
    }
}

fn lookup(fields: &[(&'static str, Option<f64>)], name: &str) -> Option<f64> {
    fields
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureRow, LabeledRow, Signal};
    use chrono::NaiveDate;

    fn feature_row(day: u32, projected_long: Option<f64>) -> FeatureRow {
        FeatureRow {
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            symbol: "AAPL".into(),
            current_price: 100.0 + day as f64,
            normalized_short: 0.25,
            normalized_long: 0.5,
            projected_return_short: Some(1.1),
            projected_return_long: projected_long,
        }
    }

    fn labeled(day: u32, projected_long: Option<f64>) -> LabeledRow {
        LabeledRow {
            features: feature_row(day, projected_long),
            signal: Signal::Buy,
            future_price: 120.0,
            future_return: 0.1,
        }
    }

    #[test]
    fn label_and_identity_columns_are_excluded() {
        let set = FeatureSet::select(&[labeled(1, Some(1.2))]).unwrap();
        assert_eq!(
            set.names(),
            &[
                "CurrentPrice",
                "Normalized_20",
                "Normalized_200",
                "PredReturn_20exp",
                "PredReturn_200exp"
            ]
        );
    }

    #[test]
    fn undefined_values_take_selection_time_mean() {
        let rows = vec![labeled(1, Some(1.0)), labeled(2, None), labeled(3, Some(2.0))];
        let set = FeatureSet::select(&rows).unwrap();
        assert_eq!(set.fill_values()[4], 1.5);

        // A later batch reuses the stored mean, not its own.
        let later = vec![feature_row(10, None), feature_row(11, Some(9.0))];
        let matrix = set.matrix(&later).unwrap();
        assert_eq!(matrix[0][4], 1.5);
        assert_eq!(matrix[1][4], 9.0);
    }

    #[test]
    fn all_undefined_column_fills_zero() {
        let rows = vec![labeled(1, None), labeled(2, None)];
        let set = FeatureSet::select(&rows).unwrap();
        assert_eq!(set.fill_values()[4], 0.0);
    }

    #[test]
    fn feature_rows_work_with_labeled_selection() {
        let set = FeatureSet::select(&[labeled(1, Some(1.0))]).unwrap();
        let matrix = set.matrix(&[feature_row(2, Some(1.3))]).unwrap();
        assert_eq!(matrix, vec![vec![102.0, 0.25, 0.5, 1.1, 1.3]]);
    }

    #[test]
    fn empty_rows_rejected() {
        let rows: Vec<FeatureRow> = Vec::new();
        assert!(matches!(FeatureSet::select(&rows), Err(ModelError::EmptyInput(_))));
    }

    #[test]
    fn unknown_column_is_missing_feature() {
        let set = FeatureSet {
            names: vec!["Volume".into()],
            fill_values: vec![0.0],
        };
        let err = set.matrix(&[feature_row(1, None)]).unwrap_err();
        assert!(matches!(err, ModelError::MissingFeature(name) if name == "Volume"));
    }
}
