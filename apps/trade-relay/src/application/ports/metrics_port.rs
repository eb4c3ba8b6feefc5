//! Metrics Port (Driven Port)
//!
//! Side channel for counters and gauges. Export is the adapter's concern.

/// Receives counter increments and gauge updates.
pub trait MetricsSink: Send + Sync {
    /// Add `value` to a monotonic counter.
    fn increment_counter(&self, name: &'static str, value: u64);

    /// Raise a gauge by `value`.
    fn increment_gauge(&self, name: &'static str, value: f64);

    /// Lower a gauge by `value`.
    fn decrement_gauge(&self, name: &'static str, value: f64);
}

/// Metrics sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsSink for NoOpMetrics {
    fn increment_counter(&self, _name: &'static str, _value: u64) {}

    fn increment_gauge(&self, _name: &'static str, _value: f64) {}

    fn decrement_gauge(&self, _name: &'static str, _value: f64) {}
}
