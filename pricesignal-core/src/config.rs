//! Application configuration.
//!
//! Loaded once at program start from a TOML file and passed by reference into
//! each stage. Every section has defaults, so a partial file (or none at all)
//! is valid. `validate()` must pass before any computation starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors, reported before any computation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be positive")]
    NonPositive { field: &'static str },

    #[error("window_short ({short}) must be smaller than window_long ({long})")]
    WindowOrder { short: usize, long: usize },

    #[error("buy_threshold ({buy}) must be > 0 and sell_threshold ({sell}) must be < 0")]
    Thresholds { buy: f64, sell: f64 },

    #[error("cv_folds must be at least 2 (got {0})")]
    CvFolds(usize),

    #[error("test_fraction must be strictly between 0 and 1 (got {0})")]
    TestFraction(f64),

    #[error("quantity must be positive (got {0})")]
    NonPositiveQuantity(f64),

    #[error("limit_price must be provided for limit orders")]
    MissingLimitPrice,

    #[error("limit_price must be positive (got {0})")]
    NonPositiveLimitPrice(f64),

    #[error("limit_price is only valid for limit orders")]
    UnexpectedLimitPrice,

    #[error("symbol must not be empty")]
    EmptySymbol,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub fetch: FetchConfig,
    pub metrics: MetricsConfig,
    pub labels: LabelConfig,
    pub model: ModelConfig,
    pub broker: BrokerConfig,
}

impl AppConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Check every section. Called before any stage runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fetch.validate()?;
        self.metrics.validate()?;
        self.labels.validate()?;
        self.model.validate()?;
        Ok(())
    }
}

/// File locations. All files live under `dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    pub symbols_file: String,
    pub stock_prices_file: String,
    pub metrics_file: String,
    pub model_file: String,
    pub predictions_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            symbols_file: "symbols.csv".into(),
            stock_prices_file: "stock_prices.csv".into(),
            metrics_file: "metrics.csv".into(),
            model_file: "model.json".into(),
            predictions_file: "predictions.csv".into(),
        }
    }
}

impl DataConfig {
    pub fn symbols_path(&self) -> PathBuf {
        self.dir.join(&self.symbols_file)
    }

    pub fn stock_prices_path(&self) -> PathBuf {
        self.dir.join(&self.stock_prices_file)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(&self.metrics_file)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.dir.join(&self.predictions_file)
    }
}

/// History retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Calendar days of history requested from the provider.
    pub lookback_days: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            lookback_days: 1000,
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_days == 0 {
            return Err(ConfigError::NonPositive {
                field: "lookback_days",
            });
        }
        Ok(())
    }
}

/// Indicator window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub window_short: usize,
    pub window_long: usize,
    /// Projection horizon in trading days past the current bar.
    pub predict_days: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_short: 20,
            window_long: 200,
            predict_days: 200,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_short == 0 {
            return Err(ConfigError::NonPositive {
                field: "window_short",
            });
        }
        if self.window_long == 0 {
            return Err(ConfigError::NonPositive {
                field: "window_long",
            });
        }
        if self.predict_days == 0 {
            return Err(ConfigError::NonPositive {
                field: "predict_days",
            });
        }
        if self.window_short >= self.window_long {
            return Err(ConfigError::WindowOrder {
                short: self.window_short,
                long: self.window_long,
            });
        }
        Ok(())
    }
}

/// Forward-return labeling settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Trading rows to look ahead within a symbol.
    pub forward_days: usize,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            forward_days: 5,
            buy_threshold: 0.02,
            sell_threshold: -0.02,
        }
    }
}

impl LabelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forward_days == 0 {
            return Err(ConfigError::NonPositive {
                field: "forward_days",
            });
        }
        if !(self.buy_threshold > 0.0 && self.sell_threshold < 0.0) {
            return Err(ConfigError::Thresholds {
                buy: self.buy_threshold,
                sell: self.sell_threshold,
            });
        }
        Ok(())
    }
}

/// Classifier hyperparameters and validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub n_estimators: usize,
    /// `None` grows trees until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub random_state: u64,
    pub cv_folds: usize,
    /// Fraction of the latest dates held out for evaluation.
    pub test_fraction: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            random_state: 42,
            cv_folds: 5,
            test_fraction: 0.2,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_estimators == 0 {
            return Err(ConfigError::NonPositive {
                field: "n_estimators",
            });
        }
        if self.max_depth == Some(0) {
            return Err(ConfigError::NonPositive { field: "max_depth" });
        }
        if self.min_samples_split < 2 {
            return Err(ConfigError::NonPositive {
                field: "min_samples_split",
            });
        }
        if self.cv_folds < 2 {
            return Err(ConfigError::CvFolds(self.cv_folds));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::TestFraction(self.test_fraction));
        }
        Ok(())
    }
}

/// Brokerage gateway connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub account: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            account: "PAPER".into(),
        }
    }
}
