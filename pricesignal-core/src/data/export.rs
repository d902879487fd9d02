//! CSV writers and readers for the pipeline's tables.
//!
//! The metrics table header is an external contract (`columns::METRICS_HEADER`).
//! Undefined projections are written as empty cells and read back as `None`.

use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use super::ingest::parse_date;
use super::provider::FetchResult;
use super::{column_index, ensure_parent, record_line, DataError};
use crate::domain::{columns, FeatureRow, Signal};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Header of the predictions table.
pub const PREDICTIONS_HEADER: [&str; 4] = [
    columns::DATE,
    columns::SYMBOL,
    columns::CURRENT_PRICE,
    "Signal",
];

/// Header of the price history table written by the fetch stage.
pub const PRICE_HISTORY_HEADER: [&str; 8] = [
    columns::DATE,
    columns::SYMBOL,
    "Open",
    "High",
    "Low",
    columns::CLOSE,
    "Adj Close",
    "Volume",
];

fn writer(path: &Path) -> Result<csv::Writer<std::fs::File>, DataError> {
    ensure_parent(path)?;
    csv::Writer::from_path(path).map_err(|e| DataError::csv(path, e))
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn date_cell(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Write the metrics table. Returns the number of rows written.
pub fn write_features(path: &Path, rows: &[FeatureRow]) -> Result<usize, DataError> {
    let mut wtr = writer(path)?;
    wtr.write_record(columns::METRICS_HEADER)
        .map_err(|e| DataError::csv(path, e))?;
    for row in rows {
        wtr.write_record([
            date_cell(row.date),
            row.symbol.clone(),
            row.current_price.to_string(),
            row.normalized_short.to_string(),
            row.normalized_long.to_string(),
            cell(row.projected_return_short),
            cell(row.projected_return_long),
        ])
        .map_err(|e| DataError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| DataError::io(path, e))?;
    info!(path = %path.display(), rows = rows.len(), "wrote metrics");
    Ok(rows.len())
}

/// Read a metrics table written by `write_features`.
pub fn read_features(path: &Path) -> Result<Vec<FeatureRow>, DataError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| DataError::csv(path, e))?;
    let headers = reader.headers().map_err(|e| DataError::csv(path, e))?.clone();
    if headers.is_empty() {
        return Err(DataError::EmptyInput(format!("metrics {} is empty", path.display())));
    }
    let mut idx = [0usize; 7];
    for (slot, column) in idx.iter_mut().zip(columns::METRICS_HEADER) {
        *slot = column_index(&headers, column, path)?;
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DataError::csv(path, e))?;
        let line = record_line(&record);
        let field = |i: usize| record.get(idx[i]).unwrap_or("").trim();
        let parse_err = |message: String| DataError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };
        let optional = |i: usize| -> Result<Option<f64>, DataError> {
            let raw = field(i);
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse()
                .map(Some)
                .map_err(|_| parse_err(format!("invalid {} '{raw}'", columns::METRICS_HEADER[i])))
        };
        let required = |i: usize| -> Result<f64, DataError> {
            optional(i)?.ok_or_else(|| {
                parse_err(format!("missing value for {}", columns::METRICS_HEADER[i]))
            })
        };

        let date = parse_date(field(0))
            .ok_or_else(|| parse_err(format!("invalid date '{}'", field(0))))?;
        let symbol = field(1);
        if symbol.is_empty() {
            return Err(parse_err("empty symbol".into()));
        }

        rows.push(FeatureRow {
            date,
            symbol: symbol.to_string(),
            current_price: required(2)?,
            normalized_short: required(3)?,
            normalized_long: required(4)?,
            projected_return_short: optional(5)?,
            projected_return_long: optional(6)?,
        });
    }

    if rows.is_empty() {
        return Err(DataError::EmptyInput(format!("metrics {} has no rows", path.display())));
    }
    info!(path = %path.display(), rows = rows.len(), "read metrics");
    Ok(rows)
}

/// Write one signal per feature row. Returns the number of rows written.
pub fn write_predictions(
    path: &Path,
    rows: &[FeatureRow],
    signals: &[Signal],
) -> Result<usize, DataError> {
    if rows.len() != signals.len() {
        return Err(DataError::Other(format!(
            "{} rows but {} signals",
            rows.len(),
            signals.len()
        )));
    }
    let mut wtr = writer(path)?;
    wtr.write_record(PREDICTIONS_HEADER)
        .map_err(|e| DataError::csv(path, e))?;
    for (row, signal) in rows.iter().zip(signals) {
        wtr.write_record([
            date_cell(row.date),
            row.symbol.clone(),
            row.current_price.to_string(),
            signal.as_str().to_string(),
        ])
        .map_err(|e| DataError::csv(path, e))?;
    }
    wtr.flush().map_err(|e| DataError::io(path, e))?;
    info!(path = %path.display(), rows = rows.len(), "wrote predictions");
    Ok(rows.len())
}

/// Write fetched histories as one long table. Returns the number of bars written.
pub fn write_price_history(path: &Path, histories: &[FetchResult]) -> Result<usize, DataError> {
    let mut wtr = writer(path)?;
    wtr.write_record(PRICE_HISTORY_HEADER)
        .map_err(|e| DataError::csv(path, e))?;
    let mut written = 0;
    for history in histories {
        for bar in &history.bars {
            wtr.write_record([
                date_cell(bar.date),
                history.symbol.clone(),
                cell(bar.open),
                cell(bar.high),
                cell(bar.low),
                cell(bar.close),
                cell(bar.adj_close),
                bar.volume.map(|v| v.to_string()).unwrap_or_default(),
            ])
            .map_err(|e| DataError::csv(path, e))?;
            written += 1;
        }
    }
    wtr.flush().map_err(|e| DataError::io(path, e))?;
    info!(
        path = %path.display(),
        symbols = histories.len(),
        bars = written,
        "wrote price history"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ingest::load_price_history;
    use crate::data::provider::DailyBar;

    fn row(day: u32, short: Option<f64>, long: Option<f64>) -> FeatureRow {
        FeatureRow {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            symbol: "NVDA".into(),
            current_price: 880.08,
            normalized_short: 0.123456789,
            normalized_long: 1.0,
            projected_return_short: short,
            projected_return_long: long,
        }
    }

    #[test]
    fn metrics_header_is_the_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        write_features(&path, &[row(1, Some(1.5), None)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Symbol,CurrentPrice,Normalized_20,Normalized_200,PredReturn_20exp,PredReturn_200exp")
        );
        assert_eq!(lines.next(), Some("2024-04-01,NVDA,880.08,0.123456789,1,1.5,"));
    }

    #[test]
    fn undefined_projections_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.csv");
        let rows = vec![row(1, Some(1.0123), None), row(2, None, Some(0.97))];
        assert_eq!(write_features(&path, &rows).unwrap(), 2);
        assert_eq!(read_features(&path).unwrap(), rows);
    }

    #[test]
    fn reading_requires_every_metric_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        std::fs::write(&path, "Date,Symbol,CurrentPrice\n2024-01-01,A,1\n").unwrap();
        assert!(matches!(
            read_features(&path),
            Err(DataError::MissingColumn { column: "Normalized_20", .. })
        ));
    }

    #[test]
    fn empty_required_cell_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        std::fs::write(
            &path,
            format!("{}\n2024-01-01,A,,0.5,0.5,1,1\n", columns::METRICS_HEADER.join(",")),
        )
        .unwrap();
        assert!(matches!(read_features(&path), Err(DataError::Parse { line: 2, .. })));
    }

    #[test]
    fn predictions_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let rows = vec![row(1, None, None), row(2, None, None)];
        write_predictions(&path, &rows, &[Signal::Buy, Signal::Hold]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Date,Symbol,CurrentPrice,Signal\n2024-04-01,NVDA,880.08,buy\n2024-04-02,NVDA,880.08,hold\n"
        );
        assert!(write_predictions(&path, &rows, &[Signal::Sell]).is_err());
    }

    #[test]
    fn price_history_is_readable_by_ingest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_prices.csv");
        let bar = |day, close| DailyBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: Some(1.0),
            high: None,
            low: None,
            close,
            adj_close: None,
            volume: Some(1000),
        };
        let histories = vec![
            FetchResult {
                symbol: "MSFT".into(),
                bars: vec![bar(1, Some(410.0)), bar(4, None), bar(5, Some(412.5))],
            },
            FetchResult {
                symbol: "AAPL".into(),
                bars: vec![bar(1, Some(180.0))],
            },
        ];
        assert_eq!(write_price_history(&path, &histories).unwrap(), 4);

        let series = load_price_history(&path).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].symbol, "AAPL");
        assert_eq!(series[1].closes(), vec![410.0, 412.5]);
    }
}
