//! WebSocket Transport
//!
//! [`StreamConnector`] backed by `tokio-tungstenite` over rustls. Pings are
//! answered inline; only text and binary data frames reach the caller.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{StreamConnection, StreamConnector, TransportError, WireFrame};

/// Opens WebSocket connections.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl WebSocketConnector {
    /// Create a connector with a handshake timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl StreamConnector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        tracing::debug!(%url, "Connecting WebSocket");

        let (ws, _response) = timeout(self.connect_timeout, tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| TransportError::ConnectFailed {
                message: format!("handshake timed out after {:?}", self.connect_timeout),
            })?
            .map_err(|e| TransportError::ConnectFailed {
                message: e.to_string(),
            })?;

        Ok(Box::new(WebSocketConnection { ws }))
    }
}

/// One open WebSocket.
pub struct WebSocketConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection").finish_non_exhaustive()
    }
}

#[async_trait]
impl StreamConnection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed {
                message: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Result<Option<WireFrame>, TransportError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(WireFrame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(WireFrame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Ping(data))) => {
                    self.ws
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| TransportError::SendFailed {
                            message: e.to_string(),
                        })?;
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server sent close frame");
                    return Ok(None);
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    return Err(TransportError::ReadFailed {
                        message: e.to_string(),
                    });
                }
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            tracing::debug!(error = %e, "WebSocket close frame not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let connector = WebSocketConnector::new(Duration::from_secs(2));
        let result = connector.connect("ws://127.0.0.1:1/stream").await;
        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }

    #[tokio::test]
    async fn invalid_url_fails() {
        let connector = WebSocketConnector::default();
        assert!(connector.connect("not a url").await.is_err());
    }
}
