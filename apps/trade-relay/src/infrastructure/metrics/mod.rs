//! Prometheus Metrics Module
//!
//! Installs the Prometheus recorder and adapts the `metrics` facade to the
//! [`MetricsSink`] port. Every series carries an `exchange` label.
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::application::ports::MetricsSink;
use crate::application::services::stats::names;
use crate::domain::trade::ExchangeId;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls return the same handle.
///
/// # Errors
///
/// Returns an error if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Prometheus handle, if the recorder is installed.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(names::TRADES_PROCESSED, "Trades read from the stream pool");
    describe_counter!(names::TRADES_PUSHED_SUCCESS, "Trades acknowledged by the sync service");
    describe_counter!(names::TRADES_PUSHED_FAILED, "Trades that failed or timed out on push");
    describe_gauge!(names::TRADES_IN_FLIGHT, "Pushes awaiting the sync service");

    describe_gauge!(names::CONNECTIONS_OPEN, "Open exchange WebSocket connections");
    describe_counter!(names::RECONNECTS, "Exchange WebSocket reconnect cycles");
    describe_counter!(names::CONNECTION_ERRORS, "Exchange WebSocket connect and transport errors");
    describe_counter!(names::CHANNELS, "Channels assigned to connection groups");
    describe_counter!(names::EVENTS, "Trades delivered by exchange streams");
    describe_counter!(names::DECODE_ERRORS, "Frames or entries dropped by the normalizer");
}

/// [`MetricsSink`] backed by the global `metrics` recorder.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusMetrics {
    exchange: &'static str,
}

impl PrometheusMetrics {
    /// Sink labelling every series with `exchange`.
    #[must_use]
    pub const fn new(exchange: ExchangeId) -> Self {
        Self {
            exchange: exchange.as_str(),
        }
    }
}

impl MetricsSink for PrometheusMetrics {
    fn increment_counter(&self, name: &'static str, value: u64) {
        counter!(name, "exchange" => self.exchange).increment(value);
    }

    fn increment_gauge(&self, name: &'static str, value: f64) {
        gauge!(name, "exchange" => self.exchange).increment(value);
    }

    fn decrement_gauge(&self, name: &'static str, value: f64) {
        gauge!(name, "exchange" => self.exchange).decrement(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_are_labelled_by_exchange() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let sink = PrometheusMetrics::new(ExchangeId::Kraken);

        metrics::with_local_recorder(&recorder, || {
            sink.increment_counter(names::EVENTS, 3);
            sink.increment_gauge(names::CONNECTIONS_OPEN, 3.0);
            sink.decrement_gauge(names::CONNECTIONS_OPEN, 1.0);
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"relay_websocket_events_total{exchange="kraken"} 3"#));
        assert!(rendered.contains(r#"relay_websocket_connections_open{exchange="kraken"} 2"#));
    }
}
