#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Trade Relay - Exchange Trade Stream Relay
//!
//! Ingests public trade streams from an exchange over many rate-limited
//! WebSocket connections, normalizes every venue's wire format into one
//! canonical trade record, and forwards each trade to the downstream sync
//! service over gRPC.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core relay types
//!   - `trade`: Canonical trade record and exchange identifiers
//!   - `chunking`: Channel partitioning into connection groups
//!   - `streaming`: Connection lifecycle states
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Exchange adapters, transports, sinks, metrics
//!   - `services`: Exchange streams, stream pool, ingestion driver
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `exchange`: Binance, Kraken and Huobi normalizers
//!   - `websocket`: tokio-tungstenite transport
//!   - `grpc`: Sync service client
//!   - `directory`: Instrument listing over REST
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! exchange WS (group 0) ──┐
//! exchange WS (group 1) ──┼──► StreamPool ──► IngestionDriver ──► SyncService
//! exchange WS (group N) ──┘      (1 slot)      (bounded pushes)     (gRPC)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay types with no runtime dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::chunking::{ChunkError, ConnectionGroup, chunked, partition};
pub use domain::streaming::StreamState;
pub use domain::trade::{ChannelId, ExchangeId, TradeEvent};

// Ports
pub use application::ports::{
    Decoded, DecodeError, ExchangeAdapter, SinkError, StreamConnection, StreamConnector,
    SubscriptionPlan, TradeSink, TransportError, WireFrame,
};

// Services
pub use application::services::{
    ExchangeStream, IngestionConfig, IngestionDriver, PoolConfig, PoolError, PoolHandle,
    PoolStatus, RelayStats, StreamConfig, StreamContext, StreamPool,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, RelayConfig};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// gRPC sink (for integration tests)
pub use infrastructure::grpc::{GrpcSinkConfig, GrpcTradeSink, proto::sync as proto};

// Metrics
pub use infrastructure::metrics::{PrometheusMetrics, init_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
