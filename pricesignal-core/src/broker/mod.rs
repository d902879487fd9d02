//! Trade intents and their execution against a brokerage gateway.
//!
//! The classifier only emits signals; turning one into an order is an explicit
//! step through [`execute_intent`]. Dry-run intents are described and logged
//! but never reach a [`Broker`].

pub mod ibkr;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::ConfigError;
use crate::domain::Signal;

pub use ibkr::IbkrGateway;

/// Broker-side failures.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid trade intent: {0}")]
    InvalidIntent(#[from] ConfigError),

    #[error("broker gateway unreachable: {0}")]
    Unreachable(String),

    #[error("broker session is not authenticated")]
    NotAuthenticated,

    #[error("no tradable contract found for {symbol}")]
    ContractNotFound { symbol: String },

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("unexpected gateway response: {0}")]
    UnexpectedResponse(String),
}

/// Order direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(format!("unknown side '{other}' (expected buy or sell)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

impl OrderType {
    /// Gateway order type code.
    pub fn code(self) -> &'static str {
        match self {
            OrderType::Market => "MKT",
            OrderType::Limit => "LMT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => f.write_str("market"),
            OrderType::Limit => f.write_str("limit"),
        }
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" | "mkt" => Ok(OrderType::Market),
            "limit" | "lmt" => Ok(OrderType::Limit),
            other => Err(format!("unknown order type '{other}' (expected market or limit)")),
        }
    }
}

/// A request to trade one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub quantity: f64,
    pub side: Side,
    pub order_type: OrderType,
    /// Required for limit orders, rejected for market orders.
    pub limit_price: Option<f64>,
    pub dry_run: bool,
}

impl TradeIntent {
    /// A dry-run market order.
    pub fn market(symbol: impl Into<String>, quantity: f64, side: Side) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side,
            order_type: OrderType::Market,
            limit_price: None,
            dry_run: true,
        }
    }

    /// A dry-run limit order.
    pub fn limit(symbol: impl Into<String>, quantity: f64, side: Side, limit_price: f64) -> Self {
        Self {
            order_type: OrderType::Limit,
            limit_price: Some(limit_price),
            ..Self::market(symbol, quantity, side)
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            return Err(ConfigError::NonPositiveQuantity(self.quantity));
        }
        match (self.order_type, self.limit_price) {
            (OrderType::Limit, None) => Err(ConfigError::MissingLimitPrice),
            (OrderType::Limit, Some(price)) if !(price.is_finite() && price > 0.0) => {
                Err(ConfigError::NonPositiveLimitPrice(price))
            }
            (OrderType::Market, Some(_)) => Err(ConfigError::UnexpectedLimitPrice),
            _ => Ok(()),
        }
    }

    /// One-line human description, e.g. `BUY 10 AAPL @ LMT 182.5`.
    pub fn describe(&self) -> String {
        match self.limit_price {
            Some(price) => format!(
                "{} {} {} @ {} {price}",
                self.side,
                self.quantity,
                self.symbol,
                self.order_type.code()
            ),
            None => format!(
                "{} {} {} @ {}",
                self.side,
                self.quantity,
                self.symbol,
                self.order_type.code()
            ),
        }
    }
}

/// Outcome of executing an intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderAck {
    /// Nothing was sent.
    DryRun { description: String },
    /// The gateway accepted the order.
    Submitted { order_id: String, status: String },
}

impl fmt::Display for OrderAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAck::DryRun { description } => write!(f, "DRY-RUN: would place {description}"),
            OrderAck::Submitted { order_id, status } => {
                write!(f, "order {order_id} submitted ({status})")
            }
        }
    }
}

/// A venue that accepts orders.
pub trait Broker {
    fn name(&self) -> &str;

    /// Send a validated, live intent.
    fn submit(&self, intent: &TradeIntent) -> Result<OrderAck, BrokerError>;
}

/// Validate `intent`, then either describe it (dry run) or hand it to `broker`.
pub fn execute_intent(intent: &TradeIntent, broker: &dyn Broker) -> Result<OrderAck, BrokerError> {
    intent.validate()?;

    if intent.dry_run {
        let description = intent.describe();
        info!(
            symbol = %intent.symbol,
            side = %intent.side,
            quantity = intent.quantity,
            order_type = %intent.order_type,
            limit_price = ?intent.limit_price,
            "dry-run: order not sent"
        );
        return Ok(OrderAck::DryRun { description });
    }

    info!(broker = broker.name(), order = %intent.describe(), "submitting order");
    let ack = broker.submit(intent)?;
    info!(broker = broker.name(), %ack, "order acknowledged");
    Ok(ack)
}

/// Dry-run market intent for a signal; `Hold` trades nothing.
pub fn intent_from_signal(signal: Signal, symbol: &str, quantity: f64) -> Option<TradeIntent> {
    let side = match signal {
        Signal::Buy => Side::Buy,
        Signal::Sell => Side::Sell,
        Signal::Hold => return None,
    };
    Some(TradeIntent::market(symbol, quantity, side))
}
