//! PriceSignal CLI — data, metrics, model and trade commands.
//!
//! Commands:
//! - `fetch` — download price history for the symbol list from Yahoo Finance
//! - `metrics` — compute indicator rows from the price history
//! - `all` — `fetch` then `metrics`
//! - `train` — label metrics, train the classifier and save it
//! - `predict` — score the metrics table with the saved model (`--intents` adds
//!   dry-run orders for the latest signals)
//! - `trade` — describe (default) or send an order through the broker gateway

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pricesignal_core::broker::{execute_intent, IbkrGateway, OrderType, Side, TradeIntent};
use pricesignal_core::config::AppConfig;
use pricesignal_core::data::{CircuitBreaker, YahooProvider};
use pricesignal_runner::{compute_metrics, fetch_prices, predict_signals, train_model};

#[derive(Parser)]
#[command(
    name = "pricesignal",
    about = "PriceSignal CLI — price indicators, trading signals and broker intents"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Print stage summaries as JSON.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch price history for every symbol in the symbols file.
    Fetch,
    /// Compute indicator metrics from the price history.
    Metrics,
    /// Run fetch then metrics.
    All,
    /// Train the signal classifier on the metrics table.
    Train {
        /// Grid-search hyperparameters with chronological cross-validation.
        #[arg(long, default_value_t = false)]
        tune: bool,
    },
    /// Predict a signal for every metrics row with the saved model.
    Predict {
        /// Also describe the dry-run order for each symbol's latest signal.
        #[arg(long, default_value_t = false)]
        intents: bool,

        /// Quantity per intent.
        #[arg(long, short = 'q', default_value_t = 1.0)]
        qty: f64,
    },
    /// Describe an order, or send it with --live --confirm.
    Trade {
        /// Ticker symbol to trade.
        #[arg(long, short = 's', default_value = "AAPL")]
        symbol: String,

        /// Quantity to trade.
        #[arg(long, short = 'q', default_value_t = 1.0)]
        qty: f64,

        /// buy or sell.
        #[arg(long, default_value = "buy")]
        side: Side,

        /// market or limit.
        #[arg(long, default_value = "market")]
        order_type: OrderType,

        /// Limit price (required for limit orders).
        #[arg(long)]
        limit: Option<f64>,

        /// Send the order to the broker gateway (requires --confirm).
        #[arg(long, default_value_t = false)]
        live: bool,

        /// Confirmation flag required to send live orders.
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Fetch => run_fetch(&config, cli.json),
        Commands::Metrics => run_metrics(&config, cli.json),
        Commands::All => {
            run_fetch(&config, cli.json)?;
            run_metrics(&config, cli.json)?;
            info!("pipeline complete");
            Ok(())
        }
        Commands::Train { tune } => {
            let report = train_model(&config, tune).context("training failed")?;
            emit(&report, cli.json)
        }
        Commands::Predict { intents, qty } => {
            let summary = predict_signals(&config).context("prediction failed")?;
            emit(&summary, cli.json)?;
            if intents {
                for intent in summary.intents(qty) {
                    run_trade(&config, &intent)?;
                }
            }
            Ok(())
        }
        Commands::Trade {
            symbol,
            qty,
            side,
            order_type,
            limit,
            live,
            confirm,
        } => {
            let intent = TradeIntent {
                symbol,
                quantity: qty,
                side,
                order_type,
                limit_price: limit,
                dry_run: !live_confirmed(live, confirm)?,
            };
            run_trade(&config, &intent)
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let config = if path.exists() {
        AppConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?
    } else {
        warn!(path = %path.display(), "config file not found, using defaults");
        AppConfig::default()
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn emit<T: Serialize + std::fmt::Display>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{value}");
    }
    Ok(())
}

fn run_fetch(config: &AppConfig, json: bool) -> Result<()> {
    let provider = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
    let today = chrono::Local::now().date_naive();
    let summary = fetch_prices(config, &provider, today).context("fetch failed")?;
    emit(&summary, json)
}

fn run_metrics(config: &AppConfig, json: bool) -> Result<()> {
    let summary = compute_metrics(config).with_context(|| {
        format!(
            "metrics failed (run `fetch` first if {} is missing)",
            config.data.stock_prices_path().display()
        )
    })?;
    emit(&summary, json)
}

/// Live orders need both flags; `--live` alone is refused.
fn live_confirmed(live: bool, confirm: bool) -> Result<bool> {
    if live && !confirm {
        bail!("to send a live order you must pass --live --confirm (default is a dry run)");
    }
    Ok(live)
}

fn run_trade(config: &AppConfig, intent: &TradeIntent) -> Result<()> {
    info!(
        symbol = %intent.symbol,
        quantity = intent.quantity,
        order_type = %intent.order_type,
        dry_run = intent.dry_run,
        account = %config.broker.account,
        "trade requested"
    );
    let gateway = IbkrGateway::new(&config.broker)?;
    let ack = execute_intent(intent, &gateway)?;
    println!("{ack}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn live_requires_confirmation() {
        assert!(live_confirmed(true, false).is_err());
        assert!(live_confirmed(true, true).unwrap());
        assert!(!live_confirmed(false, true).unwrap());
        assert!(!live_confirmed(false, false).unwrap());
    }

    #[test]
    fn trade_arguments_parse() {
        let cli = Cli::try_parse_from([
            "pricesignal",
            "trade",
            "--symbol",
            "MSFT",
            "--side",
            "sell",
            "--order-type",
            "limit",
            "--limit",
            "410.5",
        ])
        .unwrap();
        match cli.command {
            Commands::Trade {
                symbol,
                side,
                order_type,
                limit,
                live,
                ..
            } => {
                assert_eq!(symbol, "MSFT");
                assert_eq!(side, Side::Sell);
                assert_eq!(order_type, OrderType::Limit);
                assert_eq!(limit, Some(410.5));
                assert!(!live);
            }
            _ => panic!("expected trade command"),
        }
    }

    #[test]
    fn predict_intents_arguments_parse() {
        let cli = Cli::try_parse_from(["pricesignal", "predict", "--intents", "-q", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Predict { intents: true, qty } if qty == 3.0
        ));
        let cli = Cli::try_parse_from(["pricesignal", "predict"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Predict { intents: false, .. }
        ));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["pricesignal", "train", "--tune", "--config", "alt.toml"])
            .unwrap();
        assert_eq!(cli.config, std::path::PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Commands::Train { tune: true }));
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let config = load_config(Path::new("/nonexistent/pricesignal.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
