//! PricePoint — the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily closing price for a single symbol.
///
/// Within one symbol, points are expected strictly ordered by date with no
/// duplicates. The core does not re-check this; the loader sorts by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub symbol: String,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, symbol: impl Into<String>, close: f64) -> Self {
        Self {
            date,
            symbol: symbol.into(),
            close,
        }
    }
}

/// Chronological price history for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, points: Vec<PricePoint>) -> Self {
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closing prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_exposes_closes_in_order() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let series = PriceSeries::new(
            "SPY",
            vec![
                PricePoint::new(d, "SPY", 470.0),
                PricePoint::new(d.succ_opt().unwrap(), "SPY", 472.5),
            ],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![470.0, 472.5]);
    }

    #[test]
    fn price_point_serialization_roundtrip() {
        let p = PricePoint::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), "AAPL", 185.6);
        let json = serde_json::to_string(&p).unwrap();
        let back: PricePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
