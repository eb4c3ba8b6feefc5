//! Stream Pool
//!
//! Partitions channels into connection groups, opens one
//! [`ExchangeStream`] per group with a stagger between startups, and
//! multiplexes every stream's trades into one output channel.
//!
//! ```text
//! group 0 ── stream ── forwarder ──┐
//! group 1 ── stream ── forwarder ──┼──► output (1 slot) ──► recv()
//! group N ── stream ── forwarder ──┘
//! ```
//!
//! Each forwarder preserves its stream's order; interleaving across groups
//! is arbitrary. A consumer that stops reading stalls every forwarder and,
//! through them, every read loop.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stats::RelayStats;
use super::stream::{
    EVENT_CHANNEL_CAPACITY, ExchangeStream, StreamConfig, StreamContext, StreamStatus,
    StreamStatusSnapshot,
};
use crate::application::ports::{ExchangeAdapter, StreamConnector};
use crate::domain::chunking::{ChunkError, ConnectionGroup, partition};
use crate::domain::streaming::StreamState;
use crate::domain::trade::{ChannelId, ExchangeId, TradeEvent};

/// Pool construction errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    /// Channel partitioning failed.
    #[error("Invalid partitioning: {0}")]
    Chunk(#[from] ChunkError),

    /// No channels were supplied.
    #[error("No channels to stream")]
    NoChannels,
}

/// Pool sizing and pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Maximum channels carried by one connection.
    pub max_per_connection: usize,
    /// Delay between successive stream startups.
    pub startup_stagger: Duration,
    /// Per-stream timing.
    pub stream: StreamConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_per_connection: 50,
            startup_stagger: Duration::from_secs(1),
            stream: StreamConfig::default(),
        }
    }
}

/// Point-in-time pool status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Exchange served by the pool.
    pub exchange: ExchangeId,
    /// Whether the pool has been closed.
    pub closed: bool,
    /// One entry per connection group.
    pub groups: Vec<StreamStatusSnapshot>,
}

impl PoolStatus {
    /// Groups currently holding a live transport.
    #[must_use]
    pub fn connected_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.state.is_connected()).count()
    }

    /// Channels across all groups.
    #[must_use]
    pub fn total_channels(&self) -> usize {
        self.groups.iter().map(|g| g.channels).sum()
    }
}

/// Cloneable view of a pool for observers and shutdown paths.
#[derive(Debug, Clone)]
pub struct PoolHandle {
    exchange: ExchangeId,
    cancel: CancellationToken,
    statuses: Arc<[Arc<StreamStatus>]>,
}

impl PoolHandle {
    /// Signal every stream to close. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether close has been requested.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current status of every group.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            exchange: self.exchange,
            closed: self.is_closed(),
            groups: self.statuses.iter().map(|s| s.snapshot()).collect(),
        }
    }
}

/// A set of exchange streams behind one output channel.
#[derive(Debug)]
pub struct StreamPool {
    handle: PoolHandle,
    events: mpsc::Receiver<TradeEvent>,
    supervisor: Option<JoinHandle<()>>,
}

impl StreamPool {
    /// Partition `channels` and start bringing up one stream per group.
    ///
    /// Returns immediately; streams open in the background, one every
    /// `startup_stagger`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoChannels`] for an empty channel list and
    /// [`PoolError::Chunk`] for a zero group size.
    pub fn create(
        channels: impl IntoIterator<Item = ChannelId>,
        config: PoolConfig,
        adapter: Arc<dyn ExchangeAdapter>,
        connector: Arc<dyn StreamConnector>,
        stats: Arc<RelayStats>,
    ) -> Result<Self, PoolError> {
        let groups = partition(channels, config.max_per_connection)?;
        if groups.is_empty() {
            return Err(PoolError::NoChannels);
        }

        let exchange = adapter.exchange();
        let statuses: Arc<[Arc<StreamStatus>]> = groups
            .iter()
            .map(|group| Arc::new(StreamStatus::new(group)))
            .collect();

        info!(
            %exchange,
            groups = groups.len(),
            channels = groups.iter().map(ConnectionGroup::len).sum::<usize>(),
            max_per_connection = config.max_per_connection,
            "Creating stream pool"
        );

        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let context = StreamContext {
            adapter,
            connector,
            stats,
            config: config.stream,
        };

        let supervisor = tokio::spawn(supervise(
            groups,
            Arc::clone(&statuses),
            context,
            config.startup_stagger,
            cancel.clone(),
            tx,
        ));

        Ok(Self {
            handle: PoolHandle {
                exchange,
                cancel,
                statuses,
            },
            events,
            supervisor: Some(supervisor),
        })
    }

    /// Next trade from any group; `None` once the pool is closed.
    pub async fn recv(&mut self) -> Option<TradeEvent> {
        tokio::select! {
            biased;
            () = self.handle.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    /// Number of connection groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.handle.statuses.len()
    }

    /// Current status of every group.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.handle.status()
    }

    /// Cloneable handle for status and close.
    #[must_use]
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Close every stream and wait until their transports are torn down.
    ///
    /// Safe to call more than once and while streams are mid-reconnect.
    pub async fn close(&mut self) {
        self.handle.close();
        self.events.close();
        if let Some(supervisor) = self.supervisor.take() {
            if let Err(e) = supervisor.await {
                warn!(error = %e, "Pool supervisor ended abnormally");
            }
        }
    }
}

impl Drop for StreamPool {
    fn drop(&mut self) {
        self.handle.close();
    }
}

async fn supervise(
    groups: Vec<ConnectionGroup>,
    statuses: Arc<[Arc<StreamStatus>]>,
    context: StreamContext,
    stagger: Duration,
    cancel: CancellationToken,
    tx: mpsc::Sender<TradeEvent>,
) {
    let mut forwarders = JoinSet::new();

    for (group, status) in groups.into_iter().zip(statuses.iter()) {
        if group.index() > 0 && !stagger.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = sleep(stagger) => {}
            }
        }
        if cancel.is_cancelled() {
            status.set_state(StreamState::Closed);
            continue;
        }

        context.stats.channels_assigned(group.len());
        debug!(group = group.index(), channels = group.len(), "Opening stream");

        let stream = ExchangeStream::open_with(
            group,
            context.clone(),
            Arc::clone(status),
            cancel.child_token(),
        );
        forwarders.spawn(forward(stream, tx.clone(), cancel.clone()));
    }
    drop(tx);

    while let Some(result) = forwarders.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Stream forwarder ended abnormally");
        }
    }
    info!("Stream pool closed");
}

async fn forward(
    mut stream: ExchangeStream,
    tx: mpsc::Sender<TradeEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = stream.recv() => event,
        };
        let Some(event) = event else { break };

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = tx.send(event) => sent,
        };
        if sent.is_err() {
            break;
        }
    }
    stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(group: usize, channels: usize, state: StreamState) -> StreamStatusSnapshot {
        StreamStatusSnapshot {
            group,
            channels,
            state,
            reconnects: 0,
            events: 0,
            last_error: None,
        }
    }

    #[test]
    fn status_counts_connected_groups_and_channels() {
        let status = PoolStatus {
            exchange: ExchangeId::Binance,
            closed: false,
            groups: vec![
                group(0, 50, StreamState::Streaming),
                group(1, 50, StreamState::Subscribing),
                group(2, 20, StreamState::Connecting),
            ],
        };

        assert_eq!(status.connected_groups(), 2);
        assert_eq!(status.total_channels(), 120);
    }

    #[test]
    fn default_config_matches_binance_limits() {
        let config = PoolConfig::default();
        assert_eq!(config.max_per_connection, 50);
        assert_eq!(config.startup_stagger, Duration::from_secs(1));
    }
}
