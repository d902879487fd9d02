//! Price provider trait and progress reporting.
//!
//! `PriceProvider` abstracts over history sources so the download
//! orchestrator can be driven by Yahoo in production and by a stub in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::DataError;

/// One daily bar as delivered by a provider.
///
/// Fields other than `close` are carried through to the price history file
/// but never read back by the indicator pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
}

/// History for one symbol, chronological.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub symbol: String,
    pub bars: Vec<DailyBar>,
}

/// A source of daily price history.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Daily bars for `symbol` between `start` and `end`, inclusive.
    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError>;

    /// False while the provider refuses requests (rate limit, ban).
    fn is_available(&self) -> bool;
}

/// Progress callback for multi-symbol downloads.
pub trait FetchProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// `result` carries the number of bars fetched.
    fn on_complete(
        &self,
        symbol: &str,
        index: usize,
        total: usize,
        result: Result<usize, &DataError>,
    );

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Reports download progress through `tracing`.
pub struct LogProgress;

impl FetchProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        info!(symbol, "[{}/{}] fetching", index + 1, total);
    }

    fn on_complete(
        &self,
        symbol: &str,
        _index: usize,
        _total: usize,
        result: Result<usize, &DataError>,
    ) {
        match result {
            Ok(bars) => info!(symbol, bars, "fetched"),
            Err(e) => warn!(symbol, error = %e, "fetch failed, skipping symbol"),
        }
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        info!(succeeded, failed, total, "download complete");
    }
}
