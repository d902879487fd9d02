//! Fetch and metrics stages.
//!
//! Each stage reads and writes the files named in `[data]`, so stages can be
//! run independently from the CLI.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use pricesignal_core::config::AppConfig;
use pricesignal_core::data::{
    download_history, load_price_history, load_symbols, lookback_range, write_features,
    write_price_history, LogProgress, PriceProvider,
};
use pricesignal_core::indicators::IndicatorEngine;

use crate::PipelineError;

/// What the metrics stage did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub symbols_total: usize,
    pub symbols_processed: usize,
    pub symbols_skipped: Vec<String>,
    pub rows_written: usize,
    /// Bars left out because the long window was not yet full.
    pub rows_skipped_warmup: usize,
    /// Projection cells written empty.
    pub undefined_projections: usize,
    pub output: PathBuf,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Metrics: {} rows for {}/{} symbols -> {}",
            self.rows_written,
            self.symbols_processed,
            self.symbols_total,
            self.output.display()
        )?;
        writeln!(f, "  warmup bars skipped:    {}", self.rows_skipped_warmup)?;
        writeln!(f, "  undefined projections:  {}", self.undefined_projections)?;
        if !self.symbols_skipped.is_empty() {
            writeln!(
                f,
                "  skipped (short history): {}",
                self.symbols_skipped.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Load the price history, compute indicator rows for every symbol and write
/// the metrics table. Rows are ordered by symbol, then date.
///
/// Symbols without enough history are skipped; if none qualifies the table is
/// written with its header only.
pub fn compute_metrics(config: &AppConfig) -> Result<MetricsSummary, PipelineError> {
    config.validate()?;
    let engine = IndicatorEngine::new(&config.metrics)?;

    let prices_path = config.data.stock_prices_path();
    let series = load_price_history(&prices_path)?;
    info!(
        symbols = series.len(),
        window_short = config.metrics.window_short,
        window_long = config.metrics.window_long,
        predict_days = config.metrics.predict_days,
        "computing metrics"
    );

    let mut batch = engine.compute_all(&series);
    batch
        .rows
        .sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.date.cmp(&b.date)));
    if batch.rows.is_empty() {
        warn!(
            symbols = series.len(),
            required = engine.required_points(),
            "no symbol has enough history; writing an empty metrics table"
        );
    }

    let output = config.data.metrics_path();
    let rows_written = write_features(&output, &batch.rows)?;

    Ok(MetricsSummary {
        symbols_total: series.len(),
        symbols_processed: batch.symbols_processed,
        symbols_skipped: batch.skipped.into_iter().map(|s| s.symbol).collect(),
        rows_written,
        rows_skipped_warmup: batch.warmup_skipped,
        undefined_projections: batch.undefined_projections,
        output,
    })
}

/// What the fetch stage did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchSummary {
    pub provider: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub symbols_total: usize,
    pub symbols_fetched: usize,
    pub failed: Vec<String>,
    pub bars_written: usize,
    pub output: PathBuf,
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Fetched {}/{} symbols from {} ({} to {}), {} bars -> {}",
            self.symbols_fetched,
            self.symbols_total,
            self.provider,
            self.start,
            self.end,
            self.bars_written,
            self.output.display()
        )?;
        if !self.failed.is_empty() {
            writeln!(f, "  failed: {}", self.failed.join(", "))?;
        }
        Ok(())
    }
}

/// Download `lookback_days` of history up to `today` for every listed symbol
/// and write the price history table.
///
/// Individual symbol failures are reported in the summary; the stage only
/// fails when nothing could be fetched.
pub fn fetch_prices(
    config: &AppConfig,
    provider: &dyn PriceProvider,
    today: NaiveDate,
) -> Result<FetchSummary, PipelineError> {
    config.validate()?;
    let symbols = load_symbols(&config.data.symbols_path())?;
    let (start, end) = lookback_range(today, config.fetch.lookback_days);
    info!(
        provider = provider.name(),
        symbols = symbols.len(),
        %start,
        %end,
        "fetching price history"
    );

    let summary = download_history(provider, &symbols, start, end, &LogProgress)?;
    let output = config.data.stock_prices_path();
    let bars_written = write_price_history(&output, &summary.fetched)?;

    Ok(FetchSummary {
        provider: provider.name().to_string(),
        start,
        end,
        symbols_total: summary.total,
        symbols_fetched: summary.succeeded(),
        failed: summary.errors.into_iter().map(|(symbol, _)| symbol).collect(),
        bars_written,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricesignal_core::config::MetricsConfig;
    use pricesignal_core::data::{read_features, DailyBar, DataError, FetchResult};
    use std::fmt::Write as _;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.data.dir = dir.to_path_buf();
        config.metrics = MetricsConfig {
            window_short: 3,
            window_long: 6,
            predict_days: 4,
        };
        config
    }

    fn write_prices(config: &AppConfig, symbols: &[(&str, usize)]) {
        let mut csv = String::from("Date,Symbol,Open,Close,Volume\n");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for &(symbol, n) in symbols {
            for i in 0..n {
                let date = start + chrono::Duration::days(i as i64);
                let close = 50.0 + (i as f64 * 0.7).sin() * 5.0;
                writeln!(csv, "{date},{symbol},1,{close},100").unwrap();
            }
        }
        std::fs::create_dir_all(&config.data.dir).unwrap();
        std::fs::write(config.data.stock_prices_path(), csv).unwrap();
    }

    #[test]
    fn metrics_stage_writes_sorted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_prices(&config, &[("ZZZ", 10), ("AAA", 12), ("TINY", 4)]);

        let summary = compute_metrics(&config).unwrap();
        assert_eq!(summary.symbols_total, 3);
        assert_eq!(summary.symbols_processed, 2);
        assert_eq!(summary.symbols_skipped, vec!["TINY".to_string()]);
        assert_eq!(summary.rows_written, (12 - 6) + (10 - 6));
        assert_eq!(summary.rows_skipped_warmup, 12);
        assert_eq!(summary.undefined_projections, 0);

        let rows = read_features(&summary.output).unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].symbol, "AAA");
        assert_eq!(rows[9].symbol, "ZZZ");
        assert!(rows[..6].windows(2).all(|w| w[0].date < w[1].date));
        assert!(summary.to_string().contains("skipped (short history): TINY"));
    }

    #[test]
    fn metrics_stage_rejects_invalid_config_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.metrics.window_short = 6;
        assert!(matches!(
            compute_metrics(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn metrics_stage_needs_price_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert!(matches!(compute_metrics(&config), Err(PipelineError::Data(_))));
    }

    #[test]
    fn no_eligible_symbol_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_prices(&config, &[("AAA", 3)]);
        let summary = compute_metrics(&config).unwrap();
        assert_eq!(summary.rows_written, 0);
        let text = std::fs::read_to_string(&summary.output).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn prices_without_closes_stop_the_metrics_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        std::fs::write(
            config.data.stock_prices_path(),
            "Date,Symbol,Close\n2024-01-02,AAA,\n2024-01-03,AAA,\n",
        )
        .unwrap();
        assert!(matches!(
            compute_metrics(&config),
            Err(PipelineError::Data(DataError::EmptyInput(_)))
        ));
        assert!(!config.data.metrics_path().exists());
    }

    struct FixedProvider;

    impl PriceProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch(
            &self,
            symbol: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<FetchResult, DataError> {
            if symbol == "GONE" {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }
            let bars = (0..3)
                .map(|i| DailyBar {
                    date: start + chrono::Duration::days(i),
                    open: None,
                    high: None,
                    low: None,
                    close: Some(10.0 + i as f64),
                    adj_close: None,
                    volume: None,
                })
                .collect();
            Ok(FetchResult {
                symbol: symbol.to_string(),
                bars,
            })
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    #[test]
    fn fetch_stage_writes_price_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.fetch.lookback_days = 30;
        std::fs::write(config.data.symbols_path(), "Symbol\nMSFT\nGONE\nAAPL\n").unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let summary = fetch_prices(&config, &FixedProvider, today).unwrap();
        assert_eq!(summary.start, NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        assert_eq!(summary.end, today);
        assert_eq!(summary.symbols_fetched, 2);
        assert_eq!(summary.failed, vec!["GONE".to_string()]);
        assert_eq!(summary.bars_written, 6);

        let series = load_price_history(&summary.output).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].symbol, "AAPL");
        assert_eq!(series[0].closes(), vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn fetch_stage_needs_symbols() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert!(matches!(
            fetch_prices(&config, &FixedProvider, today),
            Err(PipelineError::Data(_))
        ));
    }
}
