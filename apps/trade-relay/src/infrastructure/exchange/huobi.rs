//! Huobi Spot Adapter
//!
//! One connection per group against a single endpoint. Every channel is a
//! `market.{symbol}.trade.detail` topic, subscribed with its own message
//! right after the handshake.
//!
//! # Wire Format
//!
//! Every server message is a gzip-compressed binary frame carrying JSON:
//!
//! ```json
//! {"ping":1492420473027}
//! {"id":"market.btcusdt.trade.detail","status":"ok","subbed":"market.btcusdt.trade.detail","ts":1489474081631}
//! {"ch":"market.btcusdt.trade.detail","ts":1489474082831,"tick":{"id":14650745135,"ts":1533265950234,"data":[{"amount":0.0099,"ts":1533265950234,"tradeId":102043495674,"price":401.74,"direction":"buy"}]}}
//! ```
//!
//! Pings must be answered with `{"pong":<same value>}` or the server drops
//! the connection.

use std::io::Read;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::classify;
use crate::application::ports::{
    AdapterError, DecodeError, Decoded, ExchangeAdapter, SubscriptionPlan,
};
use crate::domain::chunking::ConnectionGroup;
use crate::domain::trade::{ChannelId, ExchangeId, TradeEvent};

/// Default public WebSocket URL.
pub const DEFAULT_WS_URL: &str = "wss://api-aws.huobi.pro/ws";

/// Huobi adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuobiConfig {
    /// WebSocket URL.
    pub ws_url: String,
}

impl Default for HuobiConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
        }
    }
}

/// Trade-detail topic for a symbol.
#[must_use]
pub fn channel_id(symbol: &str) -> ChannelId {
    format!("market.{}.trade.detail", symbol.to_lowercase())
}

/// Symbol segment of a `market.{symbol}.*` topic.
fn topic_symbol(topic: &str) -> Option<&str> {
    topic
        .strip_prefix("market.")?
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
}

/// Huobi protocol adapter.
#[derive(Debug, Clone, Default)]
pub struct HuobiAdapter {
    config: HuobiConfig,
}

impl HuobiAdapter {
    /// Create an adapter.
    #[must_use]
    pub const fn new(config: HuobiConfig) -> Self {
        Self { config }
    }
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    sub: &'a str,
    id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Frame {
    Ping {
        ping: u64,
    },
    Channel {
        ch: String,
        tick: Tick,
    },
    Status {
        status: String,
        #[serde(rename = "err-msg")]
        err_msg: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Tick {
    data: Value,
}

/// Decimal string for a price or amount. Numbers keep their JSON text.
fn decimal(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
fn parse_entry(entry: &Value, symbol: &str) -> Option<TradeEvent> {
    let price = decimal(entry.get("price")?)?;
    let amount = decimal(entry.get("amount")?)?;
    let ts_ms = entry.get("ts")?.as_u64()?;
    Some(TradeEvent::new(
        ExchangeId::Huobi,
        symbol,
        price,
        amount,
        ts_ms as f64 / 1000.0,
    ))
}

fn normalize_trades(topic: &str, entries: &Value) -> Result<Decoded, DecodeError> {
    let symbol = topic_symbol(topic).ok_or_else(|| DecodeError::UnexpectedShape {
        message: format!("unrecognized topic {topic}"),
    })?;
    let entries = entries.as_array().ok_or_else(|| DecodeError::UnexpectedShape {
        message: "trade payload is not an array".to_string(),
    })?;

    let mut trades = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match parse_entry(entry, symbol) {
            Some(trade) => trades.push(trade),
            None => {
                tracing::debug!(%topic, ?entry, "Skipping malformed trade entry");
                skipped += 1;
            }
        }
    }
    Ok(Decoded::Trades { trades, skipped })
}

impl ExchangeAdapter for HuobiAdapter {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Huobi
    }

    fn endpoint(&self, _group: &ConnectionGroup) -> String {
        self.config.ws_url.clone()
    }

    fn subscription(&self, group: &ConnectionGroup) -> Result<SubscriptionPlan, AdapterError> {
        let messages = group
            .channels()
            .iter()
            .map(|topic| {
                serde_json::to_string(&SubscribeRequest { sub: topic, id: topic }).map_err(|e| {
                    AdapterError::Encode {
                        message: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SubscriptionPlan::Burst(messages))
    }

    fn decode(&self, frame: &str) -> Result<Decoded, DecodeError> {
        let parsed = serde_json::from_str::<Frame>(frame).map_err(|e| classify(frame, &e))?;
        match parsed {
            Frame::Ping { ping } => {
                let pong = serde_json::json!({ "pong": ping });
                Ok(Decoded::Reply(pong.to_string()))
            }
            Frame::Channel { ch, tick } if ch.ends_with(".trade.detail") => {
                normalize_trades(&ch, &tick.data)
            }
            Frame::Channel { .. } => Ok(Decoded::Other),
            Frame::Status { status, err_msg } => {
                if status == "ok" {
                    Ok(Decoded::Ack)
                } else {
                    Ok(Decoded::Rejected(
                        err_msg.unwrap_or_else(|| format!("status {status}")),
                    ))
                }
            }
        }
    }

    fn decode_binary(&self, frame: &[u8]) -> Result<Decoded, DecodeError> {
        let mut text = String::new();
        GzDecoder::new(frame)
            .read_to_string(&mut text)
            .map_err(|e| DecodeError::Binary {
                message: e.to_string(),
            })?;
        self.decode(&text)
    }
}
