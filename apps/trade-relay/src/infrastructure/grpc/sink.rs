//! `TradeSink` over `sync.SyncService/PushTrade`.

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{Channel, Endpoint};

use super::proto::sync::TradeRequest;
use super::proto::sync::sync_service_client::SyncServiceClient;
use crate::application::ports::{SinkError, TradeSink};
use crate::domain::trade::TradeEvent;

/// Connection settings for the downstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpcSinkConfig {
    /// Service address, e.g. `http://127.0.0.1:50051`.
    pub addr: String,
    /// Timeout for establishing the channel.
    pub connect_timeout: Duration,
}

impl Default for GrpcSinkConfig {
    fn default() -> Self {
        Self {
            addr: "http://127.0.0.1:50051".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl From<TradeEvent> for TradeRequest {
    fn from(trade: TradeEvent) -> Self {
        Self {
            price: trade.price,
            quantity: trade.quantity,
            trade_time: trade.trade_time_seconds,
            symbol: trade.symbol,
            exchange: trade.exchange,
        }
    }
}

/// gRPC-backed trade sink.
#[derive(Debug, Clone)]
pub struct GrpcTradeSink {
    client: SyncServiceClient<Channel>,
}

impl GrpcTradeSink {
    /// Connect eagerly to the downstream service.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ConnectionError`] if the address is invalid or
    /// the channel cannot be established.
    pub async fn connect(config: &GrpcSinkConfig) -> Result<Self, SinkError> {
        let endpoint = Endpoint::from_shared(config.addr.clone())
            .map_err(|e| SinkError::ConnectionError {
                message: format!("invalid address {}: {e}", config.addr),
            })?
            .connect_timeout(config.connect_timeout);

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| SinkError::ConnectionError {
                message: format!("{}: {e}", config.addr),
            })?;

        tracing::info!(addr = %config.addr, "Connected to sync service");
        Ok(Self::from_channel(channel))
    }

    /// Wrap an existing channel.
    #[must_use]
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            client: SyncServiceClient::new(channel),
        }
    }
}

#[async_trait]
impl TradeSink for GrpcTradeSink {
    async fn push(&self, trade: TradeEvent) -> Result<(), SinkError> {
        let mut client = self.client.clone();
        client
            .push_trade(TradeRequest::from(trade))
            .await
            .map(|_| ())
            .map_err(|status| SinkError::Rejected {
                message: format!("{:?}: {}", status.code(), status.message()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trade::ExchangeId;

    #[test]
    fn trade_maps_to_request() {
        let trade = TradeEvent::new(
            ExchangeId::Kraken,
            "XBT/USD",
            "5541.2",
            "0.15",
            1_534_614_057.5,
        );
        let request = TradeRequest::from(trade);

        assert_eq!(request.price, "5541.2");
        assert_eq!(request.quantity, "0.15");
        assert_eq!(request.symbol, "XBT/USD");
        assert_eq!(request.exchange, "kraken");
        assert!((request.trade_time - 1_534_614_057.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn invalid_address_is_rejected() {
        let config = GrpcSinkConfig {
            addr: "not a uri".to_string(),
            ..GrpcSinkConfig::default()
        };
        assert!(matches!(
            GrpcTradeSink::connect(&config).await,
            Err(SinkError::ConnectionError { .. })
        ));
    }
}
