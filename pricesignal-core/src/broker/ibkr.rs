//! Interactive Brokers Client Portal gateway.
//!
//! Talks to a locally running gateway over its REST API: the contract id is
//! resolved with `/iserver/secdef/search`, then the order is posted to
//! `/iserver/account/{account}/orders`. Order confirmation prompts returned by
//! the gateway are surfaced as rejections, never answered automatically.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use super::{Broker, BrokerError, OrderAck, TradeIntent};
use crate::config::BrokerConfig;

pub struct IbkrGateway {
    client: reqwest::blocking::Client,
    base_url: String,
    account: String,
}

impl IbkrGateway {
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        // The gateway serves a self-signed certificate on localhost.
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| BrokerError::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("https://{}:{}/v1/api", config.host, config.port),
            account: config.account.clone(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_url(&self, symbol: &str) -> String {
        format!(
            "{}/iserver/secdef/search?symbol={symbol}&secType=STK",
            self.base_url
        )
    }

    fn orders_url(&self) -> String {
        format!("{}/iserver/account/{}/orders", self.base_url, self.account)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value, BrokerError> {
        let resp = request
            .send()
            .map_err(|e| BrokerError::Unreachable(e.to_string()))?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(BrokerError::NotAuthenticated);
        }
        let body: Value = resp
            .json()
            .map_err(|e| BrokerError::UnexpectedResponse(format!("HTTP {status}: {e}")))?;
        if !status.is_success() {
            return Err(BrokerError::Rejected(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    fn resolve_conid(&self, symbol: &str) -> Result<i64, BrokerError> {
        let body = self.send(self.client.get(self.search_url(symbol)))?;
        let conid = first_conid(&body).ok_or_else(|| BrokerError::ContractNotFound {
            symbol: symbol.to_string(),
        })?;
        debug!(symbol, conid, "resolved contract");
        Ok(conid)
    }
}

/// First contract id in a secdef search reply. The gateway sends ids either as
/// numbers or as numeric strings.
fn first_conid(body: &Value) -> Option<i64> {
    body.as_array()?.iter().find_map(|entry| match entry.get("conid")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

fn order_body(intent: &TradeIntent, conid: i64) -> Value {
    let mut order = json!({
        "conid": conid,
        "orderType": intent.order_type.code(),
        "side": intent.side.as_str(),
        "quantity": intent.quantity,
        "tif": "DAY",
    });
    if let Some(price) = intent.limit_price {
        order["price"] = json!(price);
    }
    json!({ "orders": [order] })
}

fn parse_order_reply(body: &Value) -> Result<OrderAck, BrokerError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(BrokerError::Rejected(error.to_string()));
    }
    let reply = body
        .as_array()
        .and_then(|replies| replies.first())
        .ok_or_else(|| BrokerError::UnexpectedResponse(body.to_string()))?;

    if let Some(order_id) = reply.get("order_id") {
        let order_id = match order_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let status = reply
            .get("order_status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Ok(OrderAck::Submitted { order_id, status });
    }

    if let Some(messages) = reply.get("message").and_then(Value::as_array) {
        let text: Vec<&str> = messages.iter().filter_map(Value::as_str).collect();
        return Err(BrokerError::Rejected(format!(
            "gateway requires confirmation: {}",
            text.join("; ")
        )));
    }

    Err(BrokerError::UnexpectedResponse(reply.to_string()))
}

impl Broker for IbkrGateway {
    fn name(&self) -> &str {
        "ibkr"
    }

    fn submit(&self, intent: &TradeIntent) -> Result<OrderAck, BrokerError> {
        intent.validate()?;
        let conid = self.resolve_conid(&intent.symbol)?;
        let body = self.send(
            self.client
                .post(self.orders_url())
                .json(&order_body(intent, conid)),
        )?;
        parse_order_reply(&body)
    }
}
