//! Relay Statistics
//!
//! Atomic counters and gauges for the relay. The atomics are the
//! authoritative values; every update is mirrored into the injected
//! [`MetricsSink`] for export.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::application::ports::MetricsSink;

/// Metric names shared by the core and the exporters.
pub mod names {
    /// Trades read from the pool by the ingestion driver.
    pub const TRADES_PROCESSED: &str = "relay_trades_processed_total";
    /// Pushes acknowledged by the sink.
    pub const TRADES_PUSHED_SUCCESS: &str = "relay_trades_pushed_success_total";
    /// Pushes that failed or timed out.
    pub const TRADES_PUSHED_FAILED: &str = "relay_trades_pushed_failed_total";
    /// Pushes currently awaiting the sink.
    pub const TRADES_IN_FLIGHT: &str = "relay_trades_in_flight";
    /// Open exchange connections.
    pub const CONNECTIONS_OPEN: &str = "relay_websocket_connections_open";
    /// Reconnect cycles started.
    pub const RECONNECTS: &str = "relay_websocket_reconnects_total";
    /// Failed handshakes and transport errors.
    pub const CONNECTION_ERRORS: &str = "relay_websocket_connection_errors_total";
    /// Channels assigned to connection groups.
    pub const CHANNELS: &str = "relay_websocket_channels_total";
    /// Trades delivered by exchange streams.
    pub const EVENTS: &str = "relay_websocket_events_total";
    /// Frames or entries dropped by the normalizer.
    pub const DECODE_ERRORS: &str = "relay_websocket_decode_errors_total";
}

/// Point-in-time copy of the relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Trades read by the ingestion driver.
    pub trades_processed: u64,
    /// Successful pushes.
    pub trades_pushed_success: u64,
    /// Failed pushes.
    pub trades_pushed_failed: u64,
    /// Pushes in flight.
    pub trades_in_flight: u64,
    /// Open connections.
    pub connections_open: u64,
    /// Reconnects.
    pub reconnects: u64,
    /// Connection errors.
    pub connection_errors: u64,
    /// Assigned channels.
    pub channels: u64,
    /// Delivered stream events.
    pub events: u64,
    /// Decode errors.
    pub decode_errors: u64,
}

/// Shared relay counters.
pub struct RelayStats {
    metrics: Arc<dyn MetricsSink>,
    trades_processed: AtomicU64,
    trades_pushed_success: AtomicU64,
    trades_pushed_failed: AtomicU64,
    trades_in_flight: AtomicU64,
    connections_open: AtomicU64,
    reconnects: AtomicU64,
    connection_errors: AtomicU64,
    channels: AtomicU64,
    events: AtomicU64,
    decode_errors: AtomicU64,
}

impl std::fmt::Debug for RelayStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStats")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new(Arc::new(crate::application::ports::NoOpMetrics))
    }
}

impl RelayStats {
    /// Create counters that mirror into `metrics`.
    #[must_use]
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            metrics,
            trades_processed: AtomicU64::new(0),
            trades_pushed_success: AtomicU64::new(0),
            trades_pushed_failed: AtomicU64::new(0),
            trades_in_flight: AtomicU64::new(0),
            connections_open: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            channels: AtomicU64::new(0),
            events: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
        }
    }

    fn bump(&self, counter: &AtomicU64, name: &'static str, value: u64) {
        counter.fetch_add(value, Ordering::Relaxed);
        self.metrics.increment_counter(name, value);
    }

    // Exported gauges move by deltas so concurrent updates commute.
    fn gauge_up(&self, gauge: &AtomicU64, name: &'static str) {
        gauge.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment_gauge(name, 1.0);
    }

    fn gauge_down(&self, gauge: &AtomicU64, name: &'static str) {
        if gauge
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .is_ok()
        {
            self.metrics.decrement_gauge(name, 1.0);
        }
    }

    /// A transport handshake succeeded.
    pub fn connection_opened(&self) {
        self.gauge_up(&self.connections_open, names::CONNECTIONS_OPEN);
    }

    /// A live transport was torn down.
    pub fn connection_closed(&self) {
        self.gauge_down(&self.connections_open, names::CONNECTIONS_OPEN);
    }

    /// A stream started a reconnect cycle.
    pub fn reconnect(&self) {
        self.bump(&self.reconnects, names::RECONNECTS, 1);
    }

    /// A handshake or transport operation failed.
    pub fn connection_error(&self) {
        self.bump(&self.connection_errors, names::CONNECTION_ERRORS, 1);
    }

    /// Channels were assigned to a connection group.
    pub fn channels_assigned(&self, count: usize) {
        self.bump(&self.channels, names::CHANNELS, count as u64);
    }

    /// A stream delivered a trade.
    pub fn event_received(&self) {
        self.bump(&self.events, names::EVENTS, 1);
    }

    /// The normalizer dropped a frame or entry.
    pub fn decode_error(&self, count: usize) {
        self.bump(&self.decode_errors, names::DECODE_ERRORS, count as u64);
    }

    /// The ingestion driver read a trade.
    pub fn trade_processed(&self) {
        self.bump(&self.trades_processed, names::TRADES_PROCESSED, 1);
    }

    /// A push was dispatched.
    pub fn push_started(&self) {
        self.gauge_up(&self.trades_in_flight, names::TRADES_IN_FLIGHT);
    }

    /// A push completed, successfully or not.
    pub fn push_finished(&self, ok: bool) {
        if ok {
            self.bump(&self.trades_pushed_success, names::TRADES_PUSHED_SUCCESS, 1);
        } else {
            self.bump(&self.trades_pushed_failed, names::TRADES_PUSHED_FAILED, 1);
        }
        self.gauge_down(&self.trades_in_flight, names::TRADES_IN_FLIGHT);
    }

    /// Copy the current values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            trades_processed: self.trades_processed.load(Ordering::Relaxed),
            trades_pushed_success: self.trades_pushed_success.load(Ordering::Relaxed),
            trades_pushed_failed: self.trades_pushed_failed.load(Ordering::Relaxed),
            trades_in_flight: self.trades_in_flight.load(Ordering::Relaxed),
            connections_open: self.connections_open.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
            channels: self.channels.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}
