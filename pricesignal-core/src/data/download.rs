//! Download orchestrator: multi-symbol history retrieval with progress reporting.
//!
//! A failed symbol is logged and skipped; the batch only fails when no symbol
//! at all could be fetched.

use chrono::{Duration, NaiveDate};

use super::provider::{FetchProgress, FetchResult, PriceProvider};
use super::DataError;

/// `(start, end)` covering `lookback_days` calendar days up to `today`.
pub fn lookback_range(today: NaiveDate, lookback_days: u32) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(i64::from(lookback_days)), today)
}

/// Outcome of a batch download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    /// Fetched histories, in symbol-list order.
    pub fetched: Vec<FetchResult>,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn succeeded(&self) -> usize {
        self.fetched.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Fetch every symbol's history between `start` and `end`.
///
/// Stops early once the provider becomes unavailable (circuit breaker),
/// marking the remaining symbols as failed.
pub fn download_history(
    provider: &dyn PriceProvider,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
    progress: &dyn FetchProgress,
) -> Result<DownloadSummary, DataError> {
    let total = symbols.len();
    let mut fetched = Vec::with_capacity(total);
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        let result = provider.fetch(symbol, start, end);
        progress.on_complete(symbol, i, total, result.as_ref().map(|r| r.bars.len()));

        match result {
            Ok(history) => fetched.push(history),
            Err(e) => errors.push((symbol.clone(), e)),
        }

        if !provider.is_available() {
            for rest in &symbols[i + 1..] {
                errors.push((rest.clone(), DataError::CircuitBreakerTripped));
            }
            break;
        }
    }

    progress.on_batch_complete(fetched.len(), errors.len(), total);

    if fetched.is_empty() {
        return Err(DataError::EmptyInput(format!(
            "no price history could be fetched for {total} symbol(s) from {}",
            provider.name()
        )));
    }

    Ok(DownloadSummary {
        total,
        fetched,
        errors,
    })
}
