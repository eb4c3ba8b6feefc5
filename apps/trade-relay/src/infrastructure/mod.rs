//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Exchange adapters (Binance, Kraken, Huobi).
pub mod exchange;

/// WebSocket transport adapter.
pub mod websocket;

/// gRPC trade sink.
pub mod grpc;

/// Exchange symbol directories over REST.
pub mod directory;

/// Configuration and dependency injection.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;
