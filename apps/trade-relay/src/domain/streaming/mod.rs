//! Connection Lifecycle
//!
//! States of one exchange stream's connection state machine.
//!
//! ```text
//! Connecting ──► Streaming ──► Subscribing ──► Streaming
//!     ▲  │            │              │
//!     └──┘ (backoff)  └──────────────┴──► Connecting (read/subscribe error)
//!
//! any ──► Closing ──► Closed (external close, terminal)
//! ```

use serde::Serialize;

/// Lifecycle state of an exchange stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum StreamState {
    /// Establishing the transport (or waiting out a backoff).
    Connecting = 0,
    /// Sending paced in-band subscription batches while reading.
    Subscribing = 1,
    /// Reading and delivering frames.
    Streaming = 2,
    /// Tearing down after an external close.
    Closing = 3,
    /// Terminal; the stream never reconnects.
    Closed = 4,
}

impl StreamState {
    /// Decode a state previously stored with `as u8`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Subscribing,
            2 => Self::Streaming,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// State name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Whether the stream currently holds a live transport.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Subscribing | Self::Streaming)
    }

    /// Whether the stream has stopped for good.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_round_trip() {
        for state in [
            StreamState::Connecting,
            StreamState::Subscribing,
            StreamState::Streaming,
            StreamState::Closing,
            StreamState::Closed,
        ] {
            assert_eq!(StreamState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn connected_states() {
        assert!(StreamState::Streaming.is_connected());
        assert!(StreamState::Subscribing.is_connected());
        assert!(!StreamState::Connecting.is_connected());
        assert!(StreamState::Closed.is_terminal());
    }
}
