//! Training and prediction workflows.
//!
//! Training holds out the latest `test_fraction` of dates for evaluation and
//! purges training rows whose labels reach into that period, so the reported
//! metrics never reward looking into the future. The fitted
//! model is written to `[data] model_file`; prediction reloads it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use pricesignal_core::broker::{intent_from_signal, TradeIntent};
use pricesignal_core::config::AppConfig;
use pricesignal_core::data::{read_features, write_predictions};
use pricesignal_core::domain::{LabeledRow, NumericRecord, Signal};
use pricesignal_core::labels::{create_labels, LabelCounts};
use pricesignal_core::model::{EvaluationReport, SignalClassifier, TradingModel, TrainSummary};

use crate::PipelineError;

/// Feature importances listed in the training report.
const TOP_FEATURES: usize = 5;

/// Labeled rows split at a date boundary.
#[derive(Debug, Clone)]
pub struct HoldoutSplit {
    /// Rows dated before `split_date` whose labels only use earlier prices.
    pub train: Vec<LabeledRow>,
    /// Rows dated on or after `split_date`.
    pub test: Vec<LabeledRow>,
    pub split_date: NaiveDate,
    /// Training rows dropped because their label horizon reaches the test dates.
    pub purged: usize,
}

/// Split rows so the latest `test_fraction` of distinct dates form the test
/// set. Both sides keep at least one date.
///
/// The last `forward_days` training rows of each symbol are labeled from
/// prices at or past the split, so they are purged from the training side.
/// `rows` must be ordered by (symbol, date), as `create_labels` returns them.
pub fn chronological_split(
    rows: Vec<LabeledRow>,
    test_fraction: f64,
    forward_days: usize,
) -> Result<HoldoutSplit, PipelineError> {
    let dates: Vec<NaiveDate> = rows
        .iter()
        .map(|r| r.date())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if dates.len() < 2 {
        return Err(PipelineError::TooFewDates {
            labeled: rows.len(),
            dates: dates.len(),
        });
    }

    let test_dates =
        ((dates.len() as f64 * test_fraction).ceil() as usize).clamp(1, dates.len() - 1);
    let split_date = dates[dates.len() - test_dates];
    let (test, before): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|r| r.date() >= split_date);

    let mut train = Vec::with_capacity(before.len());
    let mut purged = 0;
    let mut start = 0;
    while start < before.len() {
        let symbol = before[start].symbol();
        let len = before[start..]
            .iter()
            .take_while(|r| r.symbol() == symbol)
            .count();
        let keep = len.saturating_sub(forward_days);
        train.extend_from_slice(&before[start..start + keep]);
        purged += len - keep;
        start += len;
    }
    if train.is_empty() {
        return Err(PipelineError::NoTrainingRows { purged });
    }

    Ok(HoldoutSplit {
        train,
        test,
        split_date,
        purged,
    })
}

/// Result of the training workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub train_samples: usize,
    pub test_samples: usize,
    /// Training rows purged at the split.
    pub purged_samples: usize,
    pub split_date: NaiveDate,
    pub summary: TrainSummary,
    /// Holdout evaluation.
    pub evaluation: EvaluationReport,
    /// Most important features, highest first.
    pub top_features: Vec<(String, f64)>,
    pub model_path: PathBuf,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = &self.summary.label_counts;
        writeln!(
            f,
            "Trained on {} rows (hold {}, buy {}, sell {}), tested on {} rows from {}",
            self.train_samples,
            counts.hold,
            counts.buy,
            counts.sell,
            self.test_samples,
            self.split_date
        )?;
        writeln!(
            f,
            "Purged {} training rows labeled from test-period prices",
            self.purged_samples
        )?;
        writeln!(f, "Parameters: {}", self.summary.params)?;
        if let Some(score) = self.summary.cv_score {
            writeln!(f, "Cross-validated macro F1: {score:.4}")?;
        }
        writeln!(f)?;
        writeln!(f, "Holdout evaluation")?;
        write!(f, "{}", self.evaluation)?;
        writeln!(f)?;
        writeln!(f, "Top features")?;
        for (name, importance) in &self.top_features {
            writeln!(f, "  {name:<20} {importance:.4}")?;
        }
        writeln!(f)?;
        writeln!(f, "Model saved to {}", self.model_path.display())
    }
}

/// Label the metrics table, train on all but the latest dates, evaluate on
/// the held-out dates and save the model.
pub fn train_model(config: &AppConfig, tune: bool) -> Result<TrainingReport, PipelineError> {
    config.validate()?;
    let rows = read_features(&config.data.metrics_path())?;
    let labeled = create_labels(&rows, &config.labels)?;
    let split = chronological_split(
        labeled,
        config.model.test_fraction,
        config.labels.forward_days,
    )?;
    info!(
        train = split.train.len(),
        test = split.test.len(),
        purged = split.purged,
        split_date = %split.split_date,
        "chronological holdout"
    );

    let mut classifier = SignalClassifier::new(config.model.clone());
    let summary = classifier.train(&split.train, tune, config.model.cv_folds)?;
    let evaluation = classifier.evaluate(&split.test)?;

    let mut top_features = classifier.feature_importance()?;
    top_features.sort_by(|a, b| b.1.total_cmp(&a.1));
    top_features.truncate(TOP_FEATURES);

    let model_path = config.data.model_path();
    classifier.save(&model_path)?;

    Ok(TrainingReport {
        train_samples: split.train.len(),
        test_samples: split.test.len(),
        purged_samples: split.purged,
        split_date: split.split_date,
        summary,
        evaluation,
        top_features,
        model_path,
    })
}

/// Result of the prediction workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub rows: usize,
    pub counts: LabelCounts,
    /// Signal on each symbol's most recent date.
    pub latest: Vec<(String, NaiveDate, Signal)>,
    pub output: PathBuf,
}

impl fmt::Display for PredictionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Predicted {} rows (hold {}, buy {}, sell {}) -> {}",
            self.rows,
            self.counts.hold,
            self.counts.buy,
            self.counts.sell,
            self.output.display()
        )?;
        for (symbol, date, signal) in &self.latest {
            writeln!(f, "  {symbol:<8} {date}  {signal}")?;
        }
        Ok(())
    }
}

impl PredictionSummary {
    /// Dry-run market intents for each symbol's latest non-hold signal.
    pub fn intents(&self, quantity: f64) -> Vec<TradeIntent> {
        self.latest
            .iter()
            .filter_map(|(symbol, _, signal)| intent_from_signal(*signal, symbol, quantity))
            .collect()
    }
}

/// Score every metrics row with the saved model and write the predictions table.
pub fn predict_signals(config: &AppConfig) -> Result<PredictionSummary, PipelineError> {
    let rows = read_features(&config.data.metrics_path())?;
    let classifier = SignalClassifier::load(&config.data.model_path())?;
    let signals = classifier.predict(&rows)?;

    let output = config.data.predictions_path();
    write_predictions(&output, &rows, &signals)?;

    let mut by_symbol: BTreeMap<&str, (NaiveDate, Signal)> = BTreeMap::new();
    for (row, &signal) in rows.iter().zip(&signals) {
        let entry = by_symbol.entry(row.symbol()).or_insert((row.date(), signal));
        if entry.0 <= row.date() {
            *entry = (row.date(), signal);
        }
    }
    let latest: Vec<(String, NaiveDate, Signal)> = by_symbol
        .into_iter()
        .map(|(symbol, (date, signal))| (symbol.to_string(), date, signal))
        .collect();

    let counts = LabelCounts::from_signals(signals.iter().copied());
    info!(
        rows = rows.len(),
        hold = counts.hold,
        buy = counts.buy,
        sell = counts.sell,
        "predicted signals"
    );

    Ok(PredictionSummary {
        rows: rows.len(),
        counts,
        latest,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricesignal_core::config::LabelConfig;
    use pricesignal_core::domain::FeatureRow;

    fn labeled(day: u32, symbol: &str) -> LabeledRow {
        LabeledRow {
            features: FeatureRow {
                date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                symbol: symbol.into(),
                current_price: 10.0,
                normalized_short: 0.5,
                normalized_long: 0.5,
                projected_return_short: None,
                projected_return_long: None,
            },
            signal: Signal::Hold,
            future_price: 10.0,
            future_return: 0.0,
        }
    }

    fn by_symbol(days: std::ops::RangeInclusive<u32>, symbols: &[&str]) -> Vec<LabeledRow> {
        symbols
            .iter()
            .flat_map(|s| days.clone().map(move |d| labeled(d, s)))
            .collect()
    }

    #[test]
    fn split_holds_out_latest_dates() {
        let split = chronological_split(by_symbol(1..=10, &["AAA", "BBB"]), 0.2, 0).unwrap();
        assert_eq!(split.split_date, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(split.train.len(), 16);
        assert_eq!(split.test.len(), 4);
        assert_eq!(split.purged, 0);
        assert!(split
            .train
            .iter()
            .all(|r| r.features.date < split.split_date));
    }

    #[test]
    fn split_purges_each_symbols_last_horizon() {
        let split = chronological_split(by_symbol(1..=10, &["AAA", "BBB"]), 0.2, 3).unwrap();
        assert_eq!(split.purged, 6);
        assert_eq!(split.train.len(), 10);
        for symbol in ["AAA", "BBB"] {
            let last = split
                .train
                .iter()
                .filter(|r| r.features.symbol == symbol)
                .map(|r| r.features.date)
                .max();
            assert_eq!(last, NaiveDate::from_ymd_opt(2024, 3, 5));
        }
    }

    #[test]
    fn training_labels_never_use_test_period_prices() {
        let rows: Vec<FeatureRow> = (1..=20)
            .map(|d| FeatureRow {
                current_price: 99.0 + d as f64,
                ..labeled(d, "AAA").features
            })
            .collect();
        let config = LabelConfig {
            forward_days: 5,
            ..LabelConfig::default()
        };
        let labeled_rows = create_labels(&rows, &config).unwrap();
        let split = chronological_split(labeled_rows, 0.2, config.forward_days).unwrap();

        assert_eq!(split.split_date, NaiveDate::from_ymd_opt(2024, 3, 13).unwrap());
        assert_eq!(split.purged, 5);
        assert_eq!(split.train.len(), 7);
        let first_test_price = split.test[0].features.current_price;
        assert!(split
            .train
            .iter()
            .all(|r| r.future_price < first_test_price));
    }

    #[test]
    fn split_keeps_both_sides_non_empty() {
        let rows = vec![labeled(1, "AAA"), labeled(2, "AAA")];
        let split = chronological_split(rows.clone(), 0.99, 0).unwrap();
        assert_eq!((split.train.len(), split.test.len()), (1, 1));
        let split = chronological_split(rows, 0.01, 0).unwrap();
        assert_eq!((split.train.len(), split.test.len()), (1, 1));
    }

    #[test]
    fn split_needs_two_dates() {
        let rows = vec![labeled(1, "AAA"), labeled(1, "BBB")];
        assert!(matches!(
            chronological_split(rows, 0.2, 0),
            Err(PipelineError::TooFewDates { labeled: 2, dates: 1 })
        ));
    }

    #[test]
    fn split_fails_when_purging_empties_training() {
        let rows = by_symbol(1..=4, &["AAA"]);
        assert!(matches!(
            chronological_split(rows, 0.25, 5),
            Err(PipelineError::NoTrainingRows { purged: 3 })
        ));
    }

    #[test]
    fn latest_signals_become_dry_run_intents() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let summary = PredictionSummary {
            rows: 3,
            counts: LabelCounts::from_signals([Signal::Buy, Signal::Hold, Signal::Sell]),
            latest: vec![
                ("AAA".into(), day, Signal::Buy),
                ("BBB".into(), day, Signal::Hold),
                ("CCC".into(), day, Signal::Sell),
            ],
            output: PathBuf::from("predictions.csv"),
        };
        let intents = summary.intents(5.0);
        let described: Vec<String> = intents.iter().map(TradeIntent::describe).collect();
        assert_eq!(described, vec!["BUY 5 AAA @ MKT", "SELL 5 CCC @ MKT"]);
        assert!(intents.iter().all(|i| i.dry_run));
    }

    #[test]
    fn predicting_without_a_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.data.dir = dir.path().to_path_buf();
        let rows = vec![labeled(1, "AAA").features];
        pricesignal_core::data::write_features(&config.data.metrics_path(), &rows).unwrap();
        assert!(matches!(
            predict_signals(&config),
            Err(PipelineError::Model(_))
        ));
    }
}
