//! Forward-return labels for supervised training.
//!
//! Each row is labeled from the price `forward_days` rows later within the
//! same symbol. Rows near the end of a symbol's history have no such price and
//! are dropped, so an undefined target never reaches training data.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ConfigError, LabelConfig};
use crate::domain::{FeatureRow, LabeledRow, Signal};

/// Class counts of a labeled set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub hold: usize,
    pub buy: usize,
    pub sell: usize,
}

impl LabelCounts {
    pub fn from_rows(rows: &[LabeledRow]) -> Self {
        Self::from_signals(rows.iter().map(|r| r.signal))
    }

    pub fn from_signals(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut counts = Self::default();
        for signal in signals {
            match signal {
                Signal::Hold => counts.hold += 1,
                Signal::Buy => counts.buy += 1,
                Signal::Sell => counts.sell += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.hold + self.buy + self.sell
    }

    /// Most frequent class (ties resolved in Hold, Buy, Sell order).
    pub fn majority(&self) -> Signal {
        let mut best = (Signal::Hold, self.hold);
        for (signal, count) in [(Signal::Buy, self.buy), (Signal::Sell, self.sell)] {
            if count > best.1 {
                best = (signal, count);
            }
        }
        best.0
    }
}

/// Discretize a forward return into a signal.
pub fn classify_return(future_return: f64, buy_threshold: f64, sell_threshold: f64) -> Signal {
    if future_return > buy_threshold {
        Signal::Buy
    } else if future_return < sell_threshold {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Label feature rows from their forward price within the same symbol.
///
/// Output is sorted by (symbol, date). Rows without a price `forward_days`
/// ahead in their own symbol are dropped.
pub fn create_labels(
    rows: &[FeatureRow],
    config: &LabelConfig,
) -> Result<Vec<LabeledRow>, ConfigError> {
    config.validate()?;

    let mut sorted: Vec<&FeatureRow> = rows.iter().collect();
    sorted.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.date.cmp(&b.date)));

    let mut labeled = Vec::with_capacity(sorted.len());
    let mut start = 0;
    while start < sorted.len() {
        let symbol = &sorted[start].symbol;
        let end = start
            + sorted[start..]
                .iter()
                .take_while(|r| &r.symbol == symbol)
                .count();
        let group = &sorted[start..end];

        for (i, row) in group.iter().enumerate() {
            let Some(future) = group.get(i + config.forward_days) else {
                break;
            };
            let future_return = (future.current_price - row.current_price) / row.current_price;
            labeled.push(LabeledRow {
                features: (*row).clone(),
                signal: classify_return(
                    future_return,
                    config.buy_threshold,
                    config.sell_threshold,
                ),
                future_price: future.current_price,
                future_return,
            });
        }
        start = end;
    }

    let counts = LabelCounts::from_rows(&labeled);
    info!(
        samples = counts.total(),
        buy = counts.buy,
        sell = counts.sell,
        hold = counts.hold,
        dropped = rows.len() - counts.total(),
        "created labels"
    );

    Ok(labeled)
}
