//! Price history CSV ingest.
//!
//! Columns are located by header name. `Date`, `Symbol` and `Close` are
//! required; anything else (Open, High, Volume, ...) is ignored. Rows with an
//! empty close are skipped.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::{column_index, record_line, DataError};
use crate::domain::{columns, PricePoint, PriceSeries};

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix
/// (`2024-01-02 00:00:00-05:00`, `2024-01-02T14:30:00Z`).
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().split([' ', 'T']).next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Load a price history file into per-symbol series.
///
/// Series are ordered by symbol; points within a series by date.
pub fn load_price_history(path: &Path) -> Result<Vec<PriceSeries>, DataError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| DataError::csv(path, e))?;
    let headers = reader.headers().map_err(|e| DataError::csv(path, e))?.clone();
    if headers.is_empty() {
        return Err(DataError::EmptyInput(format!(
            "price history {} is empty",
            path.display()
        )));
    }
    let date_idx = column_index(&headers, columns::DATE, path)?;
    let symbol_idx = column_index(&headers, columns::SYMBOL, path)?;
    let close_idx = column_index(&headers, columns::CLOSE, path)?;

    let parse_err = |line: u64, message: String| DataError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut by_symbol: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
    let mut rows = 0usize;
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| DataError::csv(path, e))?;
        let line = record_line(&record);
        rows += 1;

        let raw_close = record.get(close_idx).unwrap_or("").trim();
        if raw_close.is_empty() {
            skipped += 1;
            continue;
        }
        let close: f64 = raw_close
            .parse()
            .map_err(|_| parse_err(line, format!("invalid close '{raw_close}'")))?;

        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date)
            .ok_or_else(|| parse_err(line, format!("invalid date '{raw_date}'")))?;

        let symbol = record.get(symbol_idx).unwrap_or("").trim();
        if symbol.is_empty() {
            return Err(parse_err(line, "empty symbol".into()));
        }

        by_symbol
            .entry(symbol.to_string())
            .or_default()
            .push(PricePoint::new(date, symbol, close));
    }

    if by_symbol.is_empty() {
        return Err(DataError::EmptyInput(format!(
            "price history {} has no usable rows ({rows} read, {skipped} without a close)",
            path.display()
        )));
    }

    let series: Vec<PriceSeries> = by_symbol
        .into_iter()
        .map(|(symbol, mut points)| {
            points.sort_by_key(|p| p.date);
            debug!(symbol = %symbol, points = points.len(), "loaded series");
            PriceSeries::new(symbol, points)
        })
        .collect();

    info!(
        path = %path.display(),
        symbols = series.len(),
        rows,
        skipped_empty_close = skipped,
        "loaded price history"
    );
    Ok(series)
}
