//! Symbol list loading.

use std::path::Path;

use tracing::info;

use super::{column_index, DataError};
use crate::domain::columns;

/// Symbols from the `Symbol` column of a CSV file.
///
/// Values are trimmed; blanks and repeats are dropped, first occurrence wins.
pub fn load_symbols(path: &Path) -> Result<Vec<String>, DataError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| DataError::csv(path, e))?;
    let headers = reader.headers().map_err(|e| DataError::csv(path, e))?.clone();
    let idx = column_index(&headers, columns::SYMBOL, path)?;

    let mut symbols: Vec<String> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DataError::csv(path, e))?;
        let symbol = record.get(idx).unwrap_or("").trim();
        if !symbol.is_empty() && !symbols.iter().any(|s| s == symbol) {
            symbols.push(symbol.to_string());
        }
    }

    if symbols.is_empty() {
        return Err(DataError::EmptyInput(format!(
            "no symbols listed in {}",
            path.display()
        )));
    }
    info!(path = %path.display(), count = symbols.len(), "loaded symbols");
    Ok(symbols)
}
