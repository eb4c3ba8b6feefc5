//! Symbol Directory
//!
//! Fetches the tradable instrument list from an exchange's REST API and
//! turns it into channel identifiers for the stream pool.
//!
//! - Binance: `GET /api/v3/exchangeInfo`, symbols in `TRADING` status,
//!   channel `lowercase(symbol)@aggTrade`.
//! - Kraken: `GET /0/public/AssetPairs`, channel = `wsname`, sorted.
//! - Huobi: `GET /v1/common/symbols`, `online` symbols, channel
//!   `market.{symbol}.trade.detail`.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::trade::{ChannelId, ExchangeId};
use crate::infrastructure::config::{DirectorySettings, ExchangeSettings};
use crate::infrastructure::exchange::{binance, huobi};

/// Directory fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// HTTP request or body decoding failed.
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The exchange reported an error.
    #[error("directory API error: {0}")]
    Api(String),

    /// The exchange listed no usable instruments.
    #[error("directory returned no channels")]
    Empty,

    /// Every attempt failed.
    #[error("directory fetch failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// Last error.
        last: Box<DirectoryError>,
    },
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbol>,
}

#[derive(Debug, Deserialize)]
struct BinanceSymbol {
    symbol: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KrakenAssetPairs {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, KrakenPair>,
}

#[derive(Debug, Deserialize)]
struct KrakenPair {
    #[serde(default)]
    wsname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HuobiSymbols {
    status: String,
    #[serde(default, rename = "err-msg")]
    err_msg: Option<String>,
    #[serde(default)]
    data: Vec<HuobiSymbol>,
}

#[derive(Debug, Deserialize)]
struct HuobiSymbol {
    symbol: String,
    #[serde(default)]
    state: Option<String>,
}

fn binance_channels(info: BinanceExchangeInfo) -> Vec<ChannelId> {
    info.symbols
        .into_iter()
        .filter(|s| s.status.as_deref().is_none_or(|status| status == "TRADING"))
        .map(|s| binance::channel_id(&s.symbol))
        .collect()
}

fn kraken_channels(pairs: KrakenAssetPairs) -> Result<Vec<ChannelId>, DirectoryError> {
    if !pairs.error.is_empty() {
        return Err(DirectoryError::Api(pairs.error.join("; ")));
    }
    let mut channels: Vec<ChannelId> = pairs
        .result
        .into_values()
        .filter_map(|p| p.wsname)
        .filter(|name| !name.is_empty())
        .collect();
    channels.sort();
    channels.dedup();
    Ok(channels)
}

fn huobi_channels(symbols: HuobiSymbols) -> Result<Vec<ChannelId>, DirectoryError> {
    if symbols.status != "ok" {
        return Err(DirectoryError::Api(symbols.err_msg.unwrap_or(symbols.status)));
    }
    Ok(symbols
        .data
        .into_iter()
        .filter(|s| s.state.as_deref().is_none_or(|state| state == "online"))
        .map(|s| huobi::channel_id(&s.symbol))
        .collect())
}

/// REST client for exchange instrument directories.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: reqwest::Client,
    binance_api_url: String,
    kraken_api_url: String,
    huobi_api_url: String,
}

impl DirectoryClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &ExchangeSettings) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            binance_api_url: settings.binance_api_url.trim_end_matches('/').to_string(),
            kraken_api_url: settings.kraken_api_url.trim_end_matches('/').to_string(),
            huobi_api_url: settings.huobi_api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch channel identifiers once.
    ///
    /// # Errors
    ///
    /// Returns an error on HTTP failure, an API error, or an empty list.
    pub async fn fetch(&self, exchange: ExchangeId) -> Result<Vec<ChannelId>, DirectoryError> {
        let channels = match exchange {
            ExchangeId::Binance => {
                let url = format!("{}/api/v3/exchangeInfo", self.binance_api_url);
                tracing::info!(%url, "Fetching Binance exchange info");
                let info: BinanceExchangeInfo = self
                    .http
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                binance_channels(info)
            }
            ExchangeId::Kraken => {
                let url = format!("{}/0/public/AssetPairs", self.kraken_api_url);
                tracing::info!(%url, "Fetching Kraken asset pairs");
                let pairs: KrakenAssetPairs = self
                    .http
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                kraken_channels(pairs)?
            }
            ExchangeId::Huobi => {
                let url = format!("{}/v1/common/symbols", self.huobi_api_url);
                tracing::info!(%url, "Fetching Huobi symbols");
                let symbols: HuobiSymbols = self
                    .http
                    .get(&url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                huobi_channels(symbols)?
            }
        };

        if channels.is_empty() {
            return Err(DirectoryError::Empty);
        }
        tracing::info!(%exchange, channels = channels.len(), "Directory loaded");
        Ok(channels)
    }

    /// Fetch with a fixed delay between attempts.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Exhausted`] once every attempt has failed.
    pub async fn fetch_with_retry(
        &self,
        exchange: ExchangeId,
        settings: &DirectorySettings,
    ) -> Result<Vec<ChannelId>, DirectoryError> {
        let attempts = settings.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch(exchange).await {
                Ok(channels) => return Ok(channels),
                Err(error) if attempt >= attempts => {
                    return Err(DirectoryError::Exhausted {
                        attempts,
                        last: Box::new(error),
                    });
                }
                Err(error) => {
                    tracing::warn!(%exchange, attempt, %error, "Directory fetch failed, retrying");
                    tokio::time::sleep(settings.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binance_keeps_trading_symbols() {
        let info: BinanceExchangeInfo = serde_json::from_str(
            r#"{"timezone":"UTC","symbols":[
                {"symbol":"BTCUSDT","status":"TRADING","baseAsset":"BTC"},
                {"symbol":"LUNAUSDT","status":"BREAK"},
                {"symbol":"ETHBTC"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            binance_channels(info),
            vec!["btcusdt@aggTrade".to_string(), "ethbtc@aggTrade".to_string()]
        );
    }

    #[test]
    fn kraken_uses_sorted_wsnames() {
        let pairs: KrakenAssetPairs = serde_json::from_str(
            r#"{"error":[],"result":{
                "XXBTZUSD":{"altname":"XBTUSD","wsname":"XBT/USD"},
                "XETHZEUR":{"altname":"ETHEUR","wsname":"ETH/EUR"},
                "DARKPOOL":{"altname":"XBTUSD.d"}
            }}"#,
        )
        .unwrap();

        assert_eq!(
            kraken_channels(pairs).unwrap(),
            vec!["ETH/EUR".to_string(), "XBT/USD".to_string()]
        );
    }

    #[test]
    fn kraken_api_error_is_reported() {
        let pairs: KrakenAssetPairs =
            serde_json::from_str(r#"{"error":["EGeneral:Temporary lockout"]}"#).unwrap();
        assert!(matches!(kraken_channels(pairs), Err(DirectoryError::Api(_))));
    }

    #[test]
    fn huobi_keeps_online_symbols() {
        let symbols: HuobiSymbols = serde_json::from_str(
            r#"{"status":"ok","data":[
                {"symbol":"btcusdt","state":"online","base-currency":"btc"},
                {"symbol":"lunausdt","state":"offline"},
                {"symbol":"ethbtc"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            huobi_channels(symbols).unwrap(),
            vec![
                "market.btcusdt.trade.detail".to_string(),
                "market.ethbtc.trade.detail".to_string()
            ]
        );
    }

    #[test]
    fn huobi_error_status_is_reported() {
        let symbols: HuobiSymbols = serde_json::from_str(
            r#"{"status":"error","err-code":"invalid-parameter","err-msg":"invalid parameter"}"#,
        )
        .unwrap();
        assert!(matches!(
            huobi_channels(symbols),
            Err(DirectoryError::Api(message)) if message == "invalid parameter"
        ));
    }

    #[tokio::test]
    async fn retries_until_exhausted() {
        let client = DirectoryClient::new(&ExchangeSettings {
            binance_api_url: "http://127.0.0.1:1".to_string(),
            ..ExchangeSettings::default()
        })
        .unwrap();

        let result = client
            .fetch_with_retry(
                ExchangeId::Binance,
                &DirectorySettings {
                    attempts: 2,
                    retry_delay: Duration::from_millis(1),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(DirectoryError::Exhausted { attempts: 2, .. })
        ));
    }
}
