//! Binance Spot Adapter
//!
//! Combined-stream endpoint carrying the group's first channel in the URL;
//! the rest are subscribed in-band with paced `SUBSCRIBE` batches.
//!
//! # Wire Format
//!
//! ```json
//! {"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","s":"BTCUSDT","p":"42000.10","q":"0.5","T":1700000000123}}
//! {"result":null,"id":1}
//! {"code":2,"msg":"Invalid request"}
//! ```

use serde::{Deserialize, Serialize};

use super::classify;
use crate::application::ports::{
    AdapterError, DecodeError, Decoded, ExchangeAdapter, SubscriptionPlan,
};
use crate::domain::chunking::{ConnectionGroup, chunked};
use crate::domain::trade::{ChannelId, ExchangeId, TradeEvent};

/// Default combined-stream base URL.
pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443";

/// Binance adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinanceConfig {
    /// WebSocket base URL (without path).
    pub ws_url: String,
    /// Channels per in-band `SUBSCRIBE` message.
    pub subscribe_batch_size: usize,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            subscribe_batch_size: 25,
        }
    }
}

/// Aggregate-trade channel for a symbol.
#[must_use]
pub fn channel_id(symbol: &str) -> ChannelId {
    format!("{}@aggTrade", symbol.to_lowercase())
}

/// Binance protocol adapter.
#[derive(Debug, Clone, Default)]
pub struct BinanceAdapter {
    config: BinanceConfig,
}

impl BinanceAdapter {
    /// Create an adapter.
    #[must_use]
    pub const fn new(config: BinanceConfig) -> Self {
        Self { config }
    }
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    method: &'static str,
    params: &'a [ChannelId],
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Frame {
    Stream {
        #[allow(dead_code)]
        stream: String,
        data: Payload,
    },
    ErrorEnvelope {
        error: ErrorBody,
    },
    Error(ErrorBody),
    Response {
        #[allow(dead_code)]
        result: Option<serde_json::Value>,
        #[allow(dead_code)]
        id: u64,
    },
    Bare(Payload),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum Payload {
    #[serde(rename = "aggTrade")]
    AggTrade(TradePayload),
    #[serde(rename = "trade")]
    Trade(TradePayload),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TradePayload {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
    #[serde(rename = "q")]
    quantity: String,
    #[serde(rename = "T")]
    trade_time_ms: u64,
}

impl TradePayload {
    #[allow(clippy::cast_precision_loss)]
    fn into_trade(self) -> TradeEvent {
        TradeEvent::new(
            ExchangeId::Binance,
            self.symbol,
            self.price,
            self.quantity,
            self.trade_time_ms as f64 / 1000.0,
        )
    }
}

fn normalize(payload: Payload) -> Decoded {
    match payload {
        Payload::AggTrade(trade) | Payload::Trade(trade) => {
            Decoded::trades(vec![trade.into_trade()])
        }
        Payload::Other => Decoded::Other,
    }
}

impl ExchangeAdapter for BinanceAdapter {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    fn endpoint(&self, group: &ConnectionGroup) -> String {
        format!(
            "{}/stream?streams={}",
            self.config.ws_url.trim_end_matches('/'),
            group.first()
        )
    }

    fn subscription(&self, group: &ConnectionGroup) -> Result<SubscriptionPlan, AdapterError> {
        if group.rest().is_empty() {
            return Ok(SubscriptionPlan::None);
        }

        let batches = chunked(group.rest(), self.config.subscribe_batch_size).map_err(|e| {
            AdapterError::InvalidConfig {
                message: e.to_string(),
            }
        })?;

        let messages = batches
            .zip(1u64..)
            .map(|(batch, id)| {
                let params: Vec<ChannelId> = batch.into_iter().cloned().collect();
                serde_json::to_string(&SubscribeRequest {
                    method: "SUBSCRIBE",
                    params: &params,
                    id,
                })
                .map_err(|e| AdapterError::Encode {
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SubscriptionPlan::InBand(messages))
    }

    fn decode(&self, frame: &str) -> Result<Decoded, DecodeError> {
        match serde_json::from_str::<Frame>(frame) {
            Ok(Frame::Stream { data, .. } | Frame::Bare(data)) => Ok(normalize(data)),
            Ok(Frame::Response { .. }) => Ok(Decoded::Ack),
            Ok(Frame::Error(error) | Frame::ErrorEnvelope { error }) => {
                Ok(Decoded::Rejected(format!("{} ({})", error.msg, error.code)))
            }
            Err(e) => Err(classify(frame, &e)),
        }
    }
}
