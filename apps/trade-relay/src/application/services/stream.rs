//! Exchange Stream
//!
//! Owns one transport connection for a fixed connection group and runs the
//! connect → subscribe → read → reconnect state machine until closed.
//!
//! # Behavior
//!
//! - Handshake failures are retried forever on the backoff schedule.
//! - Read errors, send errors and remote closes tear the connection down
//!   gracefully and reconnect after the same backoff.
//! - Frames that fail to decode are skipped and counted; they never end
//!   the connection.
//! - Trades are delivered on a single-slot channel, so a slow consumer
//!   stalls the read loop instead of growing memory.
//! - `close()` interrupts a pending handshake, backoff, subscribe write,
//!   read or delivery.
//!
//! The connection is owned by the task's loop, so at most one transport is
//! live per stream at any instant.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::backoff::{Backoff, BackoffConfig};
use super::stats::RelayStats;
use crate::application::ports::{
    Decoded, ExchangeAdapter, StreamConnection, StreamConnector, TransportError, WireFrame,
};
use crate::domain::chunking::ConnectionGroup;
use crate::domain::streaming::StreamState;
use crate::domain::trade::TradeEvent;

/// Capacity of a stream's event channel. One slot keeps delivery in
/// lockstep with the consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 1;

/// Per-stream timing.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Reconnect schedule.
    pub backoff: BackoffConfig,
    /// Delay between in-band subscribe batches.
    pub subscribe_pacing: Duration,
    /// Upper bound for the graceful close handshake.
    pub close_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            subscribe_pacing: Duration::from_secs(2),
            close_timeout: Duration::from_secs(5),
        }
    }
}

/// Collaborators shared by every stream of a pool.
#[derive(Clone)]
pub struct StreamContext {
    /// Exchange protocol.
    pub adapter: Arc<dyn ExchangeAdapter>,
    /// Transport factory.
    pub connector: Arc<dyn StreamConnector>,
    /// Relay counters.
    pub stats: Arc<RelayStats>,
    /// Timing.
    pub config: StreamConfig,
}

impl std::fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContext")
            .field("exchange", &self.adapter.exchange())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Live status of one stream, updated by its task.
#[derive(Debug)]
pub struct StreamStatus {
    group_index: usize,
    channel_count: usize,
    state: AtomicU8,
    reconnects: AtomicU64,
    events: AtomicU64,
    last_error: RwLock<Option<String>>,
}

impl StreamStatus {
    /// Fresh status for a group, in `Connecting`.
    #[must_use]
    pub fn new(group: &ConnectionGroup) -> Self {
        Self {
            group_index: group.index(),
            channel_count: group.len(),
            state: AtomicU8::new(StreamState::Connecting as u8),
            reconnects: AtomicU64::new(0),
            events: AtomicU64::new(0),
            last_error: RwLock::new(None),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Reconnect cycles so far.
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Trades delivered so far.
    #[must_use]
    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Most recent connection error.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    pub(crate) fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn record_error(&self, error: &str) {
        *self.last_error.write() = Some(error.to_string());
    }

    /// Serializable copy.
    #[must_use]
    pub fn snapshot(&self) -> StreamStatusSnapshot {
        StreamStatusSnapshot {
            group: self.group_index,
            channels: self.channel_count,
            state: self.state(),
            reconnects: self.reconnects(),
            events: self.events(),
            last_error: self.last_error(),
        }
    }
}

/// Point-in-time stream status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStatusSnapshot {
    /// Group index within the pool.
    pub group: usize,
    /// Channels carried by the group.
    pub channels: usize,
    /// Lifecycle state.
    pub state: StreamState,
    /// Reconnect cycles.
    pub reconnects: u64,
    /// Delivered trades.
    pub events: u64,
    /// Most recent connection error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Cloneable control handle for a stream.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    cancel: CancellationToken,
    status: Arc<StreamStatus>,
}

impl StreamHandle {
    /// Stop the stream. Idempotent and non-blocking.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether `close()` has been requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Live status.
    #[must_use]
    pub fn status(&self) -> &Arc<StreamStatus> {
        &self.status
    }
}

/// A running exchange stream and its event channel.
#[derive(Debug)]
pub struct ExchangeStream {
    handle: StreamHandle,
    events: mpsc::Receiver<TradeEvent>,
    task: JoinHandle<()>,
}

impl ExchangeStream {
    /// Start the state machine for `group`. Returns immediately.
    #[must_use]
    pub fn open(group: ConnectionGroup, context: StreamContext) -> Self {
        let status = Arc::new(StreamStatus::new(&group));
        Self::open_with(group, context, status, CancellationToken::new())
    }

    /// Start the state machine with caller-provided status and cancellation.
    #[must_use]
    pub fn open_with(
        group: ConnectionGroup,
        context: StreamContext,
        status: Arc<StreamStatus>,
        cancel: CancellationToken,
    ) -> Self {
        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let runner = StreamRunner {
            group,
            context,
            status: Arc::clone(&status),
            cancel: cancel.clone(),
            tx,
        };
        let task = tokio::spawn(runner.run());

        Self {
            handle: StreamHandle { cancel, status },
            events,
            task,
        }
    }

    /// Control handle.
    #[must_use]
    pub const fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    /// Next delivered trade; `None` once the stream has stopped.
    pub async fn recv(&mut self) -> Option<TradeEvent> {
        self.events.recv().await
    }

    /// Stop the stream. Idempotent.
    pub fn close(&self) {
        self.handle.close();
    }

    /// Stop the stream and wait for its transport to be torn down.
    pub async fn shutdown(mut self) {
        self.handle.close();
        self.events.close();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Stream task ended abnormally");
        }
    }
}

impl Drop for ExchangeStream {
    fn drop(&mut self) {
        self.handle.close();
    }
}

/// Why a connected session ended.
enum SessionEnd {
    Cancelled,
    RemoteClosed,
    Failed(String),
}

struct StreamRunner {
    group: ConnectionGroup,
    context: StreamContext,
    status: Arc<StreamStatus>,
    cancel: CancellationToken,
    tx: mpsc::Sender<TradeEvent>,
}

impl StreamRunner {
    async fn run(self) {
        let exchange = self.context.adapter.exchange();
        let group = self.group.index();
        let url = self.context.adapter.endpoint(&self.group);
        let mut backoff = Backoff::new(self.context.config.backoff.clone());

        loop {
            self.status.set_state(StreamState::Connecting);

            let connected = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.context.connector.connect(&url) => result,
            };

            match connected {
                Ok(mut conn) => {
                    self.context.stats.connection_opened();
                    backoff.reset();
                    info!(%exchange, group, channels = self.group.len(), "Stream connected");

                    let end = self.session(conn.as_mut()).await;

                    if matches!(end, SessionEnd::Cancelled) {
                        self.status.set_state(StreamState::Closing);
                    }
                    self.teardown(conn.as_mut()).await;
                    self.context.stats.connection_closed();

                    match end {
                        SessionEnd::Cancelled => break,
                        SessionEnd::RemoteClosed => {
                            warn!(%exchange, group, "Stream closed by remote, reconnecting");
                        }
                        SessionEnd::Failed(error) => {
                            self.context.stats.connection_error();
                            self.status.record_error(&error);
                            warn!(%exchange, group, %error, "Stream failed, reconnecting");
                        }
                    }
                }
                Err(error) => {
                    self.context.stats.connection_error();
                    self.status.record_error(&error.to_string());
                    warn!(%exchange, group, %error, "Stream connect failed");
                }
            }

            let delay = backoff.next_delay();
            debug!(%exchange, group, delay_ms = delay.as_millis(), "Waiting before reconnect");
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = sleep(delay) => {}
            }

            self.status.reconnects.fetch_add(1, Ordering::Relaxed);
            self.context.stats.reconnect();
        }

        self.status.set_state(StreamState::Closed);
        info!(%exchange, group, "Stream closed");
    }

    async fn session(&self, conn: &mut dyn StreamConnection) -> SessionEnd {
        let plan = match self.context.adapter.subscription(&self.group) {
            Ok(plan) => plan,
            Err(e) => return SessionEnd::Failed(e.to_string()),
        };

        let pacing = self.context.config.subscribe_pacing;
        let paced = plan.is_paced();
        let mut pending: VecDeque<String> = plan.into_messages().into();
        let mut next_send = if paced {
            Instant::now() + pacing
        } else {
            Instant::now()
        };

        self.status.set_state(if paced && !pending.is_empty() {
            StreamState::Subscribing
        } else {
            StreamState::Streaming
        });

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                () = sleep_until(next_send), if !pending.is_empty() => {
                    let Some(message) = pending.pop_front() else { continue };
                    let sent = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => return SessionEnd::Cancelled,
                        sent = conn.send_text(message) => sent,
                    };
                    if let Err(e) = sent {
                        return e.into();
                    }
                    next_send = if paced {
                        Instant::now() + pacing
                    } else {
                        Instant::now()
                    };
                    if pending.is_empty() {
                        self.status.set_state(StreamState::Streaming);
                        debug!(group = self.group.index(), "Subscription sent");
                    }
                }
                frame = conn.recv() => match frame {
                    Ok(Some(frame)) => {
                        if let Some(end) = self.handle_frame(conn, frame).await {
                            return end;
                        }
                    }
                    Ok(None) => return SessionEnd::RemoteClosed,
                    Err(e) => return e.into(),
                },
            }
        }
    }

    /// Decode one frame and deliver its trades. Returns how the session
    /// ends, if it must.
    async fn handle_frame(
        &self,
        conn: &mut dyn StreamConnection,
        frame: WireFrame,
    ) -> Option<SessionEnd> {
        let group = self.group.index();
        let decoded = match &frame {
            WireFrame::Text(text) => self.context.adapter.decode(text),
            WireFrame::Binary(data) => self.context.adapter.decode_binary(data),
        };
        match decoded {
            Ok(Decoded::Trades { trades, skipped }) => {
                if skipped > 0 {
                    self.context.stats.decode_error(skipped);
                    debug!(group, skipped, "Skipped malformed trade entries");
                }
                for trade in trades {
                    if !self.deliver(trade).await {
                        return Some(SessionEnd::Cancelled);
                    }
                }
            }
            Ok(Decoded::Reply(reply)) => {
                trace!(group, "Answering keepalive");
                let sent = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return Some(SessionEnd::Cancelled),
                    sent = conn.send_text(reply) => sent,
                };
                if let Err(e) = sent {
                    return Some(e.into());
                }
            }
            Ok(Decoded::Ack) => debug!(group, "Subscription acknowledged"),
            Ok(Decoded::Rejected(reason)) => warn!(group, %reason, "Exchange rejected request"),
            Ok(Decoded::Heartbeat | Decoded::Other) => trace!(group, "Control frame"),
            Err(error) => {
                self.context.stats.decode_error(1);
                warn!(group, %error, "Skipping undecodable frame");
            }
        }
        None
    }

    async fn deliver(&self, trade: TradeEvent) -> bool {
        let sent = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return false,
            sent = self.tx.send(trade) => sent,
        };
        if sent.is_err() {
            // Receiver gone: nobody will ever read again.
            self.cancel.cancel();
            return false;
        }
        self.status.events.fetch_add(1, Ordering::Relaxed);
        self.context.stats.event_received();
        true
    }

    async fn teardown(&self, conn: &mut dyn StreamConnection) {
        if timeout(self.context.config.close_timeout, conn.close())
            .await
            .is_err()
        {
            debug!(group = self.group.index(), "Close handshake timed out");
        }
    }
}

impl From<TransportError> for SessionEnd {
    fn from(error: TransportError) -> Self {
        Self::Failed(error.to_string())
    }
}
