//! Classification metrics over Hold/Buy/Sell.
//!
//! Ratios whose denominator is zero (a class never predicted or never
//! present) are reported as 0.0.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::Signal;

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub signal: Signal,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Rows whose true label is this class.
    pub support: usize,
}

/// Evaluation of predictions against true labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub samples: usize,
    pub accuracy: f64,
    /// Hold, Buy, Sell in that order.
    pub per_class: [ClassMetrics; Signal::COUNT],
    /// `confusion[true][predicted]`, classes in Hold, Buy, Sell order.
    pub confusion: [[usize; Signal::COUNT]; Signal::COUNT],
    /// Unweighted F1 mean over the classes present in truth or predictions.
    pub macro_f1: f64,
}

impl EvaluationReport {
    /// Compare `predicted` against `truth` row by row.
    pub fn from_predictions(truth: &[Signal], predicted: &[Signal]) -> Self {
        let confusion = confusion_matrix(truth, predicted);
        let samples = truth.len().min(predicted.len());
        let correct: usize = (0..Signal::COUNT).map(|k| confusion[k][k]).sum();

        let per_class = Signal::ALL.map(|signal| class_metrics(&confusion, signal));

        Self {
            samples,
            accuracy: ratio(correct, samples),
            per_class,
            confusion,
            macro_f1: macro_f1_from_confusion(&confusion),
        }
    }

    pub fn class(&self, signal: Signal) -> &ClassMetrics {
        &self.per_class[signal.index()]
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "samples:  {}", self.samples)?;
        writeln!(f, "accuracy: {:.4}", self.accuracy)?;
        writeln!(f, "macro F1: {:.4}", self.macro_f1)?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<6} {:>9} {:>9} {:>9} {:>8}",
            "class", "precision", "recall", "f1", "support"
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:<6} {:>9.4} {:>9.4} {:>9.4} {:>8}",
                m.signal.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "confusion (rows = true, cols = predicted)")?;
        writeln!(f, "{:<6} {:>6} {:>6} {:>6}", "", "hold", "buy", "sell")?;
        for signal in Signal::ALL {
            let row = &self.confusion[signal.index()];
            writeln!(
                f,
                "{:<6} {:>6} {:>6} {:>6}",
                signal.as_str(),
                row[0],
                row[1],
                row[2]
            )?;
        }
        Ok(())
    }
}

/// Macro-averaged F1 over the classes present in either sequence.
pub fn macro_f1(truth: &[Signal], predicted: &[Signal]) -> f64 {
    macro_f1_from_confusion(&confusion_matrix(truth, predicted))
}

fn confusion_matrix(
    truth: &[Signal],
    predicted: &[Signal],
) -> [[usize; Signal::COUNT]; Signal::COUNT] {
    let mut confusion = [[0; Signal::COUNT]; Signal::COUNT];
    for (t, p) in truth.iter().zip(predicted) {
        confusion[t.index()][p.index()] += 1;
    }
    confusion
}

fn class_metrics(
    confusion: &[[usize; Signal::COUNT]; Signal::COUNT],
    signal: Signal,
) -> ClassMetrics {
    let k = signal.index();
    let tp = confusion[k][k];
    let support: usize = confusion[k].iter().sum();
    let predicted: usize = confusion.iter().map(|row| row[k]).sum();

    let precision = ratio(tp, predicted);
    let recall = ratio(tp, support);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    ClassMetrics {
        signal,
        precision,
        recall,
        f1,
        support,
    }
}

fn macro_f1_from_confusion(confusion: &[[usize; Signal::COUNT]; Signal::COUNT]) -> f64 {
    let present: Vec<ClassMetrics> = Signal::ALL
        .into_iter()
        .filter(|s| {
            let k = s.index();
            confusion[k].iter().sum::<usize>() > 0 || confusion.iter().any(|row| row[k] > 0)
        })
        .map(|s| class_metrics(confusion, s))
        .collect();
    if present.is_empty() {
        return 0.0;
    }
    present.iter().map(|m| m.f1).sum::<f64>() / present.len() as f64
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use Signal::{Buy, Hold, Sell};

    #[test]
    fn perfect_predictions() {
        let truth = vec![Hold, Buy, Sell, Buy];
        let report = EvaluationReport::from_predictions(&truth, &truth);
        assert_eq!(report.accuracy, 1.0);
        assert_eq!(report.macro_f1, 1.0);
        assert_eq!(report.confusion, [[1, 0, 0], [0, 2, 0], [0, 0, 1]]);
        assert_eq!(report.class(Buy).support, 2);
    }

    #[test]
    fn mixed_predictions() {
        let truth = vec![Hold, Hold, Buy, Buy, Sell, Sell];
        let pred = vec![Hold, Buy, Buy, Buy, Sell, Hold];
        let report = EvaluationReport::from_predictions(&truth, &pred);

        assert_approx(report.accuracy, 4.0 / 6.0, DEFAULT_EPSILON);
        assert_eq!(report.confusion, [[1, 1, 0], [0, 2, 0], [1, 0, 1]]);

        let buy = report.class(Buy);
        assert_approx(buy.precision, 2.0 / 3.0, DEFAULT_EPSILON);
        assert_approx(buy.recall, 1.0, DEFAULT_EPSILON);
        assert_approx(buy.f1, 0.8, DEFAULT_EPSILON);

        let sell = report.class(Sell);
        assert_approx(sell.precision, 1.0, DEFAULT_EPSILON);
        assert_approx(sell.recall, 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn single_class_reports_recall_without_division_error() {
        let truth = vec![Buy; 5];
        let pred = vec![Buy, Buy, Hold, Buy, Sell];
        let report = EvaluationReport::from_predictions(&truth, &pred);

        assert_approx(report.class(Buy).recall, 0.6, DEFAULT_EPSILON);
        assert_eq!(report.class(Buy).precision, 1.0);
        // Hold and Sell never occur in truth: recall is 0, not NaN.
        assert_eq!(report.class(Hold).recall, 0.0);
        assert_eq!(report.class(Sell).precision, 0.0);
        assert!(report.per_class.iter().all(|m| m.f1.is_finite()));
    }

    #[test]
    fn absent_class_is_all_zero() {
        let truth = vec![Hold, Buy];
        let report = EvaluationReport::from_predictions(&truth, &truth);
        let sell = report.class(Sell);
        assert_eq!((sell.precision, sell.recall, sell.f1, sell.support), (0.0, 0.0, 0.0, 0));
        // Sell is absent from both sides, so it does not drag the macro mean.
        assert_eq!(report.macro_f1, 1.0);
    }

    #[test]
    fn macro_f1_counts_classes_only_predicted() {
        let truth = vec![Hold, Hold];
        let pred = vec![Hold, Buy];
        // Hold: p=1, r=0.5, f1=2/3. Buy: f1=0. Mean over {Hold, Buy}.
        assert_approx(macro_f1(&truth, &pred), 1.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn empty_input_is_zero() {
        let report = EvaluationReport::from_predictions(&[], &[]);
        assert_eq!(report.samples, 0);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.macro_f1, 0.0);
    }

    #[test]
    fn display_lists_every_class() {
        let report = EvaluationReport::from_predictions(&[Hold, Buy], &[Hold, Sell]);
        let text = report.to_string();
        for name in ["hold", "buy", "sell", "accuracy", "confusion"] {
            assert!(text.contains(name), "missing {name}");
        }
    }
}
