//! Exchange Adapter Port (Driven Port)
//!
//! Everything exchange-specific about a stream: where to connect, how to
//! subscribe, and how to turn a wire frame into trades. The reconnect,
//! backoff and close skeleton is shared by every adapter.

use crate::domain::chunking::ConnectionGroup;
use crate::domain::trade::{ExchangeId, TradeEvent};

/// Errors building subscription messages.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterError {
    /// Subscribe message could not be encoded.
    #[error("Failed to encode subscription: {message}")]
    Encode {
        /// Error details.
        message: String,
    },

    /// Adapter configuration is unusable.
    #[error("Invalid adapter configuration: {message}")]
    InvalidConfig {
        /// Error details.
        message: String,
    },
}

/// Per-frame decode errors. Always localized to the frame.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DecodeError {
    /// Frame is not valid JSON.
    #[error("Malformed JSON: {message}")]
    MalformedJson {
        /// Error details.
        message: String,
    },

    /// Frame is JSON but matches no known shape.
    #[error("Unexpected frame shape: {message}")]
    UnexpectedShape {
        /// Error details.
        message: String,
    },

    /// Binary frame could not be turned into text.
    #[error("Undecodable binary frame: {message}")]
    Binary {
        /// Error details.
        message: String,
    },
}

/// How a connection subscribes to its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionPlan {
    /// Channels are fully encoded in the endpoint.
    None,
    /// One message sent right after the handshake.
    AtHandshake(String),
    /// Messages sent back to back right after the handshake.
    Burst(Vec<String>),
    /// Paced batches sent while the connection already streams.
    InBand(Vec<String>),
}

impl SubscriptionPlan {
    /// Messages to send, in order.
    #[must_use]
    pub fn into_messages(self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::AtHandshake(message) => vec![message],
            Self::Burst(messages) | Self::InBand(messages) => messages,
        }
    }

    /// Whether messages after the first are paced.
    #[must_use]
    pub const fn is_paced(&self) -> bool {
        matches!(self, Self::InBand(_))
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Trade-bearing frame. Entries that failed to decode are counted in
    /// `skipped`.
    Trades {
        /// Normalized trades, in frame order.
        trades: Vec<TradeEvent>,
        /// Structurally unexpected entries that were dropped.
        skipped: usize,
    },
    /// Subscription acknowledgement.
    Ack,
    /// Keepalive or status message.
    Heartbeat,
    /// Application-level keepalive that must be answered with this text.
    Reply(String),
    /// The exchange refused a request (e.g. a subscribe batch).
    Rejected(String),
    /// Known protocol message with no relay meaning.
    Other,
}

impl Decoded {
    /// Trade frame without skipped entries.
    #[must_use]
    pub const fn trades(trades: Vec<TradeEvent>) -> Self {
        Self::Trades { trades, skipped: 0 }
    }
}

/// Exchange-specific protocol behavior.
pub trait ExchangeAdapter: Send + Sync {
    /// Exchange served by this adapter.
    fn exchange(&self) -> ExchangeId;

    /// Streaming endpoint for a group.
    fn endpoint(&self, group: &ConnectionGroup) -> String;

    /// Subscription messages for a group.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError`] if a message cannot be encoded.
    fn subscription(&self, group: &ConnectionGroup) -> Result<SubscriptionPlan, AdapterError>;

    /// Decode and normalize one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for frames that are not valid JSON or have no
    /// recognizable shape.
    fn decode(&self, frame: &str) -> Result<Decoded, DecodeError>;

    /// Decode one binary frame. UTF-8 payloads are decoded as text.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Binary`] when the payload is not UTF-8, or
    /// whatever [`ExchangeAdapter::decode`] reports for the text.
    fn decode_binary(&self, frame: &[u8]) -> Result<Decoded, DecodeError> {
        let text = std::str::from_utf8(frame).map_err(|e| DecodeError::Binary {
            message: e.to_string(),
        })?;
        self.decode(text)
    }
}
