//! Transport Port (Driven Port)
//!
//! A persistent, message-framed streaming connection to an exchange.

use async_trait::async_trait;

/// Transport-level errors. Every variant is connection-fatal for the
/// stream that observed it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The handshake could not be established.
    #[error("Connect failed: {message}")]
    ConnectFailed {
        /// Error details.
        message: String,
    },

    /// Reading the next frame failed.
    #[error("Read failed: {message}")]
    ReadFailed {
        /// Error details.
        message: String,
    },

    /// Writing a frame failed.
    #[error("Send failed: {message}")]
    SendFailed {
        /// Error details.
        message: String,
    },
}

/// One application message received from the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// Text message.
    Text(String),
    /// Binary message, passed to the adapter untouched.
    Binary(Vec<u8>),
}

impl From<String> for WireFrame {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Opens transport connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Perform the handshake against `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError>;
}

/// One open transport connection.
#[async_trait]
pub trait StreamConnection: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next data frame.
    ///
    /// Returns `Ok(None)` when the remote side closed the connection.
    /// Control frames are handled by the transport and never surface here.
    async fn recv(&mut self) -> Result<Option<WireFrame>, TransportError>;

    /// Best-effort graceful close: send a close frame, then drop the socket.
    async fn close(&mut self);
}
