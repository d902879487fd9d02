//! Price history retrieval and CSV persistence.
//!
//! - `provider` / `yahoo` / `circuit_breaker` — remote daily bars
//! - `download` — multi-symbol retrieval with progress reporting
//! - `ingest` — price history CSV → per-symbol series
//! - `export` — metrics and prediction tables
//! - `symbols` — the symbol list

pub mod circuit_breaker;
pub mod download;
pub mod export;
pub mod ingest;
pub mod provider;
pub mod symbols;
pub mod yahoo;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use circuit_breaker::CircuitBreaker;
pub use download::{download_history, lookback_range, DownloadSummary};
pub use export::{read_features, write_features, write_predictions, write_price_history};
pub use ingest::load_price_history;
pub use provider::{DailyBar, FetchProgress, FetchResult, LogProgress, PriceProvider};
pub use symbols::load_symbols;
pub use yahoo::YahooProvider;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("no data: {0}")]
    EmptyInput(String),

    #[error("{path}, line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        DataError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Position of a required column in a CSV header.
pub(crate) fn column_index(
    headers: &csv::StringRecord,
    column: &'static str,
    path: &Path,
) -> Result<usize, DataError> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| DataError::MissingColumn {
            path: path.to_path_buf(),
            column,
        })
}

/// Create the parent directory of `path` if it has one.
pub(crate) fn ensure_parent(path: &Path) -> Result<(), DataError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// 1-based line of a record, for error messages.
pub(crate) fn record_line(record: &csv::StringRecord) -> u64 {
    record.position().map_or(0, csv::Position::line)
}
