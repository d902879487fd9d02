//! Feature and labeled rows produced by the indicator engine and label generator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::signal::Signal;

/// Column names of the metrics table. Part of the external CSV contract.
pub mod columns {
    pub const DATE: &str = "Date";
    pub const SYMBOL: &str = "Symbol";
    pub const CLOSE: &str = "Close";
    pub const CURRENT_PRICE: &str = "CurrentPrice";
    pub const NORMALIZED_SHORT: &str = "Normalized_20";
    pub const NORMALIZED_LONG: &str = "Normalized_200";
    pub const PRED_RETURN_SHORT: &str = "PredReturn_20exp";
    pub const PRED_RETURN_LONG: &str = "PredReturn_200exp";
    pub const SIGNAL: &str = "signal";
    pub const FUTURE_PRICE: &str = "future_price";
    pub const FUTURE_RETURN: &str = "future_return";

    /// Output header of the metrics CSV, in order.
    pub const METRICS_HEADER: [&str; 7] = [
        DATE,
        SYMBOL,
        CURRENT_PRICE,
        NORMALIZED_SHORT,
        NORMALIZED_LONG,
        PRED_RETURN_SHORT,
        PRED_RETURN_LONG,
    ];

    /// Columns that are never model inputs.
    pub const NON_FEATURE: [&str; 5] = [SIGNAL, DATE, SYMBOL, FUTURE_PRICE, FUTURE_RETURN];
}

/// A row exposing its numeric columns by name.
///
/// The classifier derives its feature set from these names, so any record
/// type can be fed to it as long as the names line up with training.
pub trait NumericRecord {
    /// `(column, value)` pairs; `None` marks an undefined value.
    fn numeric_fields(&self) -> Vec<(&'static str, Option<f64>)>;

    fn date(&self) -> NaiveDate;

    fn symbol(&self) -> &str;

    fn numeric_value(&self, column: &str) -> Option<f64> {
        self.numeric_fields()
            .into_iter()
            .find(|(name, _)| *name == column)
            .and_then(|(_, v)| v)
    }
}

impl<T: NumericRecord + ?Sized> NumericRecord for &T {
    fn numeric_fields(&self) -> Vec<(&'static str, Option<f64>)> {
        (**self).numeric_fields()
    }

    fn date(&self) -> NaiveDate {
        (**self).date()
    }

    fn symbol(&self) -> &str {
        (**self).symbol()
    }
}

/// Indicator snapshot for one (symbol, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub current_price: f64,
    /// Position of the current price in the short window range, in [0, 1].
    pub normalized_short: f64,
    /// Position of the current price in the long window range, in [0, 1].
    pub normalized_long: f64,
    /// Projected price / current price from the short-window trend fit.
    pub projected_return_short: Option<f64>,
    /// Projected price / current price from the long-window trend fit.
    pub projected_return_long: Option<f64>,
}

impl NumericRecord for FeatureRow {
    fn numeric_fields(&self) -> Vec<(&'static str, Option<f64>)> {
        vec![
            (columns::CURRENT_PRICE, Some(self.current_price)),
            (columns::NORMALIZED_SHORT, Some(self.normalized_short)),
            (columns::NORMALIZED_LONG, Some(self.normalized_long)),
            (columns::PRED_RETURN_SHORT, self.projected_return_short),
            (columns::PRED_RETURN_LONG, self.projected_return_long),
        ]
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }
}

/// Feature row with its forward-looking label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub features: FeatureRow,
    pub signal: Signal,
    pub future_price: f64,
    pub future_return: f64,
}

impl NumericRecord for LabeledRow {
    fn numeric_fields(&self) -> Vec<(&'static str, Option<f64>)> {
        let mut fields = self.features.numeric_fields();
        fields.push((columns::FUTURE_PRICE, Some(self.future_price)));
        fields.push((columns::FUTURE_RETURN, Some(self.future_return)));
        fields.push((columns::SIGNAL, Some(self.signal.index() as f64)));
        fields
    }

    fn date(&self) -> NaiveDate {
        self.features.date
    }

    fn symbol(&self) -> &str {
        &self.features.symbol
    }
}
