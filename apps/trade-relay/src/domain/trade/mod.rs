//! Trade Types
//!
//! The canonical trade record produced by every exchange normalizer and the
//! identifiers used to address exchange data streams.

use serde::{Deserialize, Serialize};

/// Opaque identifier of one exchange data stream (symbol + stream type),
/// e.g. `btcusdt@aggTrade` on Binance, `XBT/USD` on Kraken or
/// `market.btcusdt.trade.detail` on Huobi.
pub type ChannelId = String;

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeId {
    /// Binance spot (combined streams, in-band subscription).
    #[default]
    Binance,
    /// Kraken spot (subscription sent at handshake).
    Kraken,
    /// Huobi spot (gzip frames, per-topic subscribe at handshake).
    Huobi,
}

impl ExchangeId {
    /// Parse an exchange name, ignoring case.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Some(Self::Binance),
            "kraken" => Some(Self::Kraken),
            "huobi" => Some(Self::Huobi),
            _ => None,
        }
    }

    /// Exchange name as forwarded downstream and used in metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Kraken => "kraken",
            Self::Huobi => "huobi",
        }
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical trade record.
///
/// Price and quantity are kept as the exchange's decimal strings; the relay
/// never does arithmetic on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Trade price (decimal string).
    pub price: String,
    /// Traded quantity (decimal string).
    pub quantity: String,
    /// Trade time in seconds since the Unix epoch.
    pub trade_time_seconds: f64,
    /// Exchange-native symbol.
    pub symbol: String,
    /// Exchange name (see [`ExchangeId::as_str`]).
    pub exchange: String,
}

impl TradeEvent {
    /// Create a trade record for the given exchange.
    #[must_use]
    pub fn new(
        exchange: ExchangeId,
        symbol: impl Into<String>,
        price: impl Into<String>,
        quantity: impl Into<String>,
        trade_time_seconds: f64,
    ) -> Self {
        Self {
            price: price.into(),
            quantity: quantity.into(),
            trade_time_seconds,
            symbol: symbol.into(),
            exchange: exchange.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_parsing() {
        assert_eq!(
            ExchangeId::from_str_case_insensitive("binance"),
            Some(ExchangeId::Binance)
        );
        assert_eq!(
            ExchangeId::from_str_case_insensitive(" KRAKEN "),
            Some(ExchangeId::Kraken)
        );
        assert_eq!(
            ExchangeId::from_str_case_insensitive("Huobi"),
            Some(ExchangeId::Huobi)
        );
        assert_eq!(ExchangeId::from_str_case_insensitive("bittrex"), None);
    }

    #[test]
    fn trade_event_carries_exchange_name() {
        let trade = TradeEvent::new(ExchangeId::Kraken, "XBT/USD", "30000.1", "0.5", 1.5);
        assert_eq!(trade.exchange, "kraken");
        assert_eq!(trade.symbol, "XBT/USD");
        assert_eq!(trade.price, "30000.1");
        assert_eq!(trade.quantity, "0.5");
    }
}
