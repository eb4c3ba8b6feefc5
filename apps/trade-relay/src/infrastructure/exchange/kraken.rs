//! Kraken Spot Adapter
//!
//! One connection per group; the whole group is subscribed with a single
//! message right after the handshake.
//!
//! # Wire Format
//!
//! Control messages are objects tagged by `event`. Trade data arrives as
//! positional arrays:
//!
//! ```json
//! [0, [["5541.20000", "0.15850568", "1534614057.321597", "s", "l", ""]], "trade", "XBT/USD"]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::classify;
use crate::application::ports::{
    AdapterError, DecodeError, Decoded, ExchangeAdapter, SubscriptionPlan,
};
use crate::domain::chunking::ConnectionGroup;
use crate::domain::trade::{ChannelId, ExchangeId, TradeEvent};

/// Default public WebSocket URL.
pub const DEFAULT_WS_URL: &str = "wss://ws.kraken.com";

/// Kraken adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrakenConfig {
    /// WebSocket URL.
    pub ws_url: String,
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
        }
    }
}

/// Kraken protocol adapter.
#[derive(Debug, Clone, Default)]
pub struct KrakenAdapter {
    config: KrakenConfig,
}

impl KrakenAdapter {
    /// Create an adapter.
    #[must_use]
    pub const fn new(config: KrakenConfig) -> Self {
        Self { config }
    }
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    event: &'static str,
    pair: &'a [ChannelId],
    subscription: SubscriptionName,
}

#[derive(Serialize)]
struct SubscriptionName {
    name: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Frame {
    Event(Event),
    Channel(serde::de::IgnoredAny, Value, String, String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum Event {
    Heartbeat,
    Pong,
    SystemStatus,
    #[serde(rename_all = "camelCase")]
    SubscriptionStatus {
        status: Option<String>,
        error_message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Parse one `[price, volume, time, ...]` entry.
fn parse_entry(entry: &Value, pair: &str) -> Option<TradeEvent> {
    let fields = entry.as_array()?;
    let price = fields.first()?.as_str()?;
    let volume = fields.get(1)?.as_str()?;
    let time = match fields.get(2)? {
        Value::String(s) => s.parse::<f64>().ok()?,
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    Some(TradeEvent::new(ExchangeId::Kraken, pair, price, volume, time))
}

fn normalize_trades(entries: &Value, pair: &str) -> Result<Decoded, DecodeError> {
    let entries = entries.as_array().ok_or_else(|| DecodeError::UnexpectedShape {
        message: "trade payload is not an array".to_string(),
    })?;

    let mut trades = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for entry in entries {
        match parse_entry(entry, pair) {
            Some(trade) => trades.push(trade),
            None => {
                tracing::debug!(%pair, ?entry, "Skipping malformed trade entry");
                skipped += 1;
            }
        }
    }
    Ok(Decoded::Trades { trades, skipped })
}

impl ExchangeAdapter for KrakenAdapter {
    fn exchange(&self) -> ExchangeId {
        ExchangeId::Kraken
    }

    fn endpoint(&self, _group: &ConnectionGroup) -> String {
        self.config.ws_url.clone()
    }

    fn subscription(&self, group: &ConnectionGroup) -> Result<SubscriptionPlan, AdapterError> {
        let message = serde_json::to_string(&SubscribeRequest {
            event: "subscribe",
            pair: group.channels(),
            subscription: SubscriptionName { name: "trade" },
        })
        .map_err(|e| AdapterError::Encode {
            message: e.to_string(),
        })?;
        Ok(SubscriptionPlan::AtHandshake(message))
    }

    fn decode(&self, frame: &str) -> Result<Decoded, DecodeError> {
        let frame = serde_json::from_str::<Frame>(frame).map_err(|e| classify(frame, &e))?;
        match frame {
            Frame::Event(Event::Heartbeat | Event::Pong) => Ok(Decoded::Heartbeat),
            Frame::Event(Event::SubscriptionStatus {
                status,
                error_message,
            }) => {
                if status.as_deref() == Some("error") {
                    Ok(Decoded::Rejected(
                        error_message.unwrap_or_else(|| "subscription error".to_string()),
                    ))
                } else {
                    Ok(Decoded::Ack)
                }
            }
            Frame::Event(Event::SystemStatus | Event::Unknown) => Ok(Decoded::Other),
            Frame::Channel(_, payload, name, pair) if name == "trade" => {
                normalize_trades(&payload, &pair)
            }
            Frame::Channel(..) => Ok(Decoded::Other),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::domain::chunking::partition;

    #[test]
    fn subscribe_message_lists_every_pair() {
        let group = partition(vec!["XBT/USD".to_string(), "ETH/EUR".to_string()], 10)
            .unwrap()
            .remove(0);
        let adapter = KrakenAdapter::default();

        assert_eq!(adapter.endpoint(&group), "wss://ws.kraken.com");
        let SubscriptionPlan::AtHandshake(message) = adapter.subscription(&group).unwrap() else {
            panic!("expected at-handshake plan");
        };
        let value: Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["event"], "subscribe");
        assert_eq!(value["pair"], serde_json::json!(["XBT/USD", "ETH/EUR"]));
        assert_eq!(value["subscription"]["name"], "trade");
    }

    #[test]
    fn trade_array_is_normalized() {
        let frame = r#"[337,[["5541.20000","0.15850568","1534614057.321597","s","l",""],["6060.00000","0.02455000","1534614057.324998","b","l",""]],"trade","XBT/USD"]"#;

        let Decoded::Trades { trades, skipped } = KrakenAdapter::default().decode(frame).unwrap()
        else {
            panic!("expected trades");
        };

        assert_eq!(skipped, 0);
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].symbol, "XBT/USD");
        assert_eq!(trades[0].price, "5541.20000");
        assert_eq!(trades[0].quantity, "0.15850568");
        assert_eq!(trades[0].exchange, "kraken");
        assert!((trades[1].trade_time_seconds - 1_534_614_057.324_998).abs() < 1e-6);
    }

    #[test]
    fn bad_entries_are_skipped_individually() {
        let frame = r#"[337,[["5541.2","0.1","1534614057.3"],["oops"],[1,2,3],["5542.0","0.2","not-a-time"]],"trade","XBT/USD"]"#;

        let Decoded::Trades { trades, skipped } = KrakenAdapter::default().decode(frame).unwrap()
        else {
            panic!("expected trades");
        };

        assert_eq!(trades.len(), 1);
        assert_eq!(skipped, 3);
    }

    #[test_case(r#"{"event":"heartbeat"}"# => Decoded::Heartbeat ; "heartbeat")]
    #[test_case(r#"{"event":"pong","reqid":7}"# => Decoded::Heartbeat ; "pong")]
    #[test_case(r#"{"connectionID":1,"event":"systemStatus","status":"online","version":"1.9.0"}"# => Decoded::Other ; "system status")]
    #[test_case(r#"{"channelID":10001,"channelName":"trade","event":"subscriptionStatus","pair":"XBT/EUR","status":"subscribed","subscription":{"name":"trade"}}"# => Decoded::Ack ; "subscribed")]
    #[test_case(r#"{"errorMessage":"Currency pair not supported","event":"subscriptionStatus","pair":"FOO/BAR","status":"error"}"# => Decoded::Rejected("Currency pair not supported".to_string()) ; "subscribe error")]
    #[test_case(r#"{"event":"somethingNew"}"# => Decoded::Other ; "unknown event")]
    #[test_case(r#"[42,{"a":["1","2"]},"book-10","XBT/USD"]"# => Decoded::Other ; "other channel")]
    fn control_frames(frame: &str) -> Decoded {
        KrakenAdapter::default().decode(frame).unwrap()
    }

    #[test]
    fn truncated_json_is_malformed() {
        let err = KrakenAdapter::default().decode("[337,[[").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedJson { .. }));
    }

    #[test]
    fn wrong_arity_array_is_unexpected() {
        let err = KrakenAdapter::default().decode(r#"[1,"trade"]"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedShape { .. }));
    }
}
