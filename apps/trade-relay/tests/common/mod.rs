//! Shared test doubles for the stream integration tests.
//!
//! [`FakeConnector`] hands out scripted connections keyed by URL and keeps a
//! log of every handshake and every frame the relay sends, so tests can
//! check pacing, reconnect timing and the one-transport-per-stream rule
//! under a paused clock.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use parking_lot::Mutex;
use tokio::time::Instant;

use trade_relay::application::ports::{
    StreamConnection, StreamConnector, TransportError, WireFrame,
};

pub const WS_URL: &str = "ws://exchange.test";

/// What one connect attempt does.
#[derive(Debug, Clone)]
pub enum Step {
    /// The handshake fails.
    Fail(String),
    /// The handshake succeeds and the connection plays `frames`, then `end`.
    /// Outgoing frames are handled per `writes`.
    Serve {
        frames: Vec<WireFrame>,
        end: End,
        writes: Writes,
    },
}

fn serve(frames: Vec<String>, end: End) -> Step {
    Step::Serve {
        frames: frames.into_iter().map(WireFrame::Text).collect(),
        end,
        writes: Writes::Accept,
    }
}

impl Step {
    pub fn fail() -> Self {
        Self::Fail("connection refused".to_string())
    }

    pub fn hold(frames: Vec<String>) -> Self {
        serve(frames, End::Hold)
    }

    pub fn close_after(frames: Vec<String>) -> Self {
        serve(frames, End::Close)
    }

    pub fn error_after(frames: Vec<String>) -> Self {
        serve(frames, End::Error("connection reset".to_string()))
    }

    /// Stay open after playing raw frames.
    pub fn hold_frames(frames: Vec<WireFrame>) -> Self {
        Self::Serve {
            frames,
            end: End::Hold,
            writes: Writes::Accept,
        }
    }

    /// Replace how this connection treats outgoing frames.
    pub fn with_writes(self, writes: Writes) -> Self {
        match self {
            Self::Serve { frames, end, .. } => Self::Serve { frames, end, writes },
            fail => fail,
        }
    }
}

/// What happens to frames the relay sends.
#[derive(Debug, Clone)]
pub enum Writes {
    /// Logged and acknowledged.
    Accept,
    /// Rejected with a transport error.
    Fail(String),
    /// Never complete.
    Stall,
}

/// How a served connection behaves once its frames run out.
#[derive(Debug, Clone)]
pub enum End {
    /// Stay open and silent.
    Hold,
    /// Remote close.
    Close,
    /// Read error.
    Error(String),
}

/// A frame sent by the relay.
#[derive(Debug, Clone)]
pub struct Sent {
    pub url: String,
    pub text: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Shared {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Mutex<HashMap<String, Step>>,
    connects: Mutex<Vec<(String, Instant)>>,
    open: Mutex<HashMap<String, usize>>,
    sent: Mutex<Vec<Sent>>,
    overlaps: AtomicUsize,
}

/// Scripted [`StreamConnector`].
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    shared: Arc<Shared>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue steps for `url`. Unscripted attempts hold an empty connection.
    pub fn script(&self, url: &str, steps: impl IntoIterator<Item = Step>) {
        self.shared
            .scripts
            .lock()
            .entry(url.to_string())
            .or_default()
            .extend(steps);
    }

    /// Step used for `url` once its script is exhausted.
    pub fn then_always(&self, url: &str, step: Step) {
        self.shared.fallback.lock().insert(url.to_string(), step);
    }

    /// Every handshake attempt in order.
    pub fn connects(&self) -> Vec<(String, Instant)> {
        self.shared.connects.lock().clone()
    }

    /// Handshake attempts against `url`.
    pub fn connects_to(&self, url: &str) -> Vec<Instant> {
        self.shared
            .connects
            .lock()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Frames sent to `url`.
    pub fn sent_to(&self, url: &str) -> Vec<Sent> {
        self.shared
            .sent
            .lock()
            .iter()
            .filter(|s| s.url == url)
            .cloned()
            .collect()
    }

    /// Connections currently open against `url`.
    pub fn open_to(&self, url: &str) -> usize {
        self.shared.open.lock().get(url).copied().unwrap_or(0)
    }

    /// Times a second connection was opened while one was still live.
    pub fn overlaps(&self) -> usize {
        self.shared.overlaps.load(Ordering::SeqCst)
    }

    fn next_step(&self, url: &str) -> Step {
        if let Some(step) = self
            .shared
            .scripts
            .lock()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
        {
            return step;
        }
        self.shared
            .fallback
            .lock()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Step::hold(Vec::new()))
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        self.shared
            .connects
            .lock()
            .push((url.to_string(), Instant::now()));

        match self.next_step(url) {
            Step::Fail(message) => Err(TransportError::ConnectFailed { message }),
            Step::Serve {
                frames,
                end,
                writes,
            } => {
                {
                    let mut open = self.shared.open.lock();
                    let count = open.entry(url.to_string()).or_default();
                    if *count > 0 {
                        self.shared.overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    *count += 1;
                }
                Ok(Box::new(FakeConnection {
                    url: url.to_string(),
                    frames: frames.into(),
                    end,
                    writes,
                    shared: Arc::clone(&self.shared),
                    closed: false,
                }))
            }
        }
    }
}

struct FakeConnection {
    url: String,
    frames: VecDeque<WireFrame>,
    end: End,
    writes: Writes,
    shared: Arc<Shared>,
    closed: bool,
}

impl FakeConnection {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Some(count) = self.shared.open.lock().get_mut(&self.url) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

#[async_trait]
impl StreamConnection for FakeConnection {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        match &self.writes {
            Writes::Accept => {}
            Writes::Fail(message) => {
                return Err(TransportError::SendFailed {
                    message: message.clone(),
                });
            }
            Writes::Stall => std::future::pending().await,
        }
        self.shared.sent.lock().push(Sent {
            url: self.url.clone(),
            text,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<WireFrame>, TransportError> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(Some(frame));
        }
        match &self.end {
            End::Hold => std::future::pending().await,
            End::Close => Ok(None),
            End::Error(message) => Err(TransportError::ReadFailed {
                message: message.clone(),
            }),
        }
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.release();
    }
}

/// `count` Binance aggregate-trade channels.
pub fn binance_channels(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("sym{i}usdt@aggTrade")).collect()
}

/// Endpoint the Binance adapter builds for a group led by `first`.
pub fn binance_url(first: &str) -> String {
    format!("{WS_URL}/stream?streams={first}")
}

/// Combined-stream aggregate trade frame.
pub fn binance_trade(symbol: &str, price: &str) -> String {
    format!(
        r#"{{"stream":"{}@aggTrade","data":{{"e":"aggTrade","s":"{symbol}","p":"{price}","q":"1.0","T":1700000000000}}}}"#,
        symbol.to_lowercase()
    )
}

/// Kraken trade array frame with one entry.
pub fn kraken_trade(pair: &str, price: &str) -> String {
    format!(r#"[0,[["{price}","0.5","1534614057.321597","s","l",""]],"trade","{pair}"]"#)
}

/// Gzip-compressed binary frame as Huobi sends it.
pub fn huobi_frame(json: &str) -> WireFrame {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.as_bytes()).unwrap();
    WireFrame::Binary(encoder.finish().unwrap())
}
