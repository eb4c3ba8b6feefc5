//! Exchange Adapters
//!
//! One [`ExchangeAdapter`](crate::application::ports::ExchangeAdapter) per
//! supported exchange.

pub mod binance;
pub mod huobi;
pub mod kraken;

use std::sync::Arc;

pub use binance::{BinanceAdapter, BinanceConfig};
pub use huobi::{HuobiAdapter, HuobiConfig};
pub use kraken::{KrakenAdapter, KrakenConfig};

use crate::application::ports::{DecodeError, ExchangeAdapter};
use crate::domain::trade::ExchangeId;
use crate::infrastructure::config::ExchangeSettings;

/// Build the adapter for the configured exchange.
#[must_use]
pub fn adapter_for(exchange: ExchangeId, settings: &ExchangeSettings) -> Arc<dyn ExchangeAdapter> {
    match exchange {
        ExchangeId::Binance => Arc::new(BinanceAdapter::new(BinanceConfig {
            ws_url: settings.binance_ws_url.clone(),
            subscribe_batch_size: settings.subscribe_batch_size,
        })),
        ExchangeId::Kraken => Arc::new(KrakenAdapter::new(KrakenConfig {
            ws_url: settings.kraken_ws_url.clone(),
        })),
        ExchangeId::Huobi => Arc::new(HuobiAdapter::new(HuobiConfig {
            ws_url: settings.huobi_ws_url.clone(),
        })),
    }
}

/// Tell malformed JSON apart from JSON of an unknown shape.
pub(crate) fn classify(frame: &str, error: &serde_json::Error) -> DecodeError {
    if serde_json::from_str::<serde::de::IgnoredAny>(frame).is_ok() {
        DecodeError::UnexpectedShape {
            message: error.to_string(),
        }
    } else {
        DecodeError::MalformedJson {
            message: error.to_string(),
        }
    }
}
