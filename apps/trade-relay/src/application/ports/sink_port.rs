//! Trade Sink Port (Driven Port)
//!
//! Outbound push of a single normalized trade.

use async_trait::async_trait;

use crate::domain::trade::TradeEvent;

/// Outbound push error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// The sink could not be reached.
    #[error("Sink connection error: {message}")]
    ConnectionError {
        /// Error details.
        message: String,
    },

    /// The sink rejected the trade.
    #[error("Push rejected: {message}")]
    Rejected {
        /// Error details.
        message: String,
    },

    /// The push did not complete in time.
    #[error("Push timed out after {timeout_ms}ms")]
    Timeout {
        /// Applied timeout in milliseconds.
        timeout_ms: u64,
    },
}

/// Outbound trade sink. Failures are never retried by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeSink: Send + Sync {
    /// Push one trade.
    async fn push(&self, trade: TradeEvent) -> Result<(), SinkError>;
}
