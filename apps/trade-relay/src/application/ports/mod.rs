//! Application Ports (Driven)
//!
//! Interfaces the relay core uses to reach the outside world.
//!
//! - `StreamConnector` / `StreamConnection`: message-framed streaming transport
//! - `ExchangeAdapter`: per-exchange subscription plan and trade normalizer
//! - `TradeSink`: outbound push of normalized trades
//! - `MetricsSink`: counters and gauges side channel

mod exchange_port;
mod metrics_port;
mod sink_port;
mod transport_port;

pub use exchange_port::{AdapterError, DecodeError, Decoded, ExchangeAdapter, SubscriptionPlan};
pub use metrics_port::{MetricsSink, NoOpMetrics};
#[cfg(test)]
pub use sink_port::MockTradeSink;
pub use sink_port::{SinkError, TradeSink};
pub use transport_port::{StreamConnection, StreamConnector, TransportError, WireFrame};
