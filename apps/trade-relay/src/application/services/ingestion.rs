//! Ingestion Driver
//!
//! Reads trades from a [`StreamPool`] and pushes each one to the outbound
//! [`TradeSink`] under a bounded timeout. Pushes run concurrently with the
//! next pool read, up to `max_in_flight` at once; when that limit is hit the
//! driver stops reading, which backs pressure up into the pool.
//!
//! Delivery is at-most-once: failed pushes are counted and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pool::StreamPool;
use super::stats::RelayStats;
use crate::application::ports::{SinkError, TradeSink};
use crate::domain::trade::TradeEvent;

/// Shortest push timeout the driver applies.
pub const MIN_PUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest push timeout the driver applies.
pub const MAX_PUSH_TIMEOUT: Duration = Duration::from_secs(6);

/// Driver tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Per-push timeout, clamped to [`MIN_PUSH_TIMEOUT`]..=[`MAX_PUSH_TIMEOUT`].
    pub push_timeout: Duration,
    /// Maximum concurrent pushes.
    pub max_in_flight: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            push_timeout: MIN_PUSH_TIMEOUT,
            max_in_flight: 64,
        }
    }
}

/// Pool-to-sink pump.
#[derive(Clone)]
pub struct IngestionDriver {
    sink: Arc<dyn TradeSink>,
    stats: Arc<RelayStats>,
    push_timeout: Duration,
    permits: Arc<Semaphore>,
}

impl std::fmt::Debug for IngestionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionDriver")
            .field("push_timeout", &self.push_timeout)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl IngestionDriver {
    /// Create a driver for `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn TradeSink>, stats: Arc<RelayStats>, config: &IngestionConfig) -> Self {
        Self {
            sink,
            stats,
            push_timeout: config.push_timeout.clamp(MIN_PUSH_TIMEOUT, MAX_PUSH_TIMEOUT),
            permits: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        }
    }

    /// Applied push timeout.
    #[must_use]
    pub const fn push_timeout(&self) -> Duration {
        self.push_timeout
    }

    /// Pump trades until the pool ends or `cancel` fires.
    ///
    /// Returns the number of trades read. Pushes already dispatched keep
    /// running after return and finish or time out on their own.
    pub async fn run(&self, pool: &mut StreamPool, cancel: &CancellationToken) -> u64 {
        let mut processed = 0u64;
        info!(push_timeout_ms = self.push_timeout.as_millis(), "Ingestion started");

        loop {
            let trade = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                trade = pool.recv() => trade,
            };
            let Some(trade) = trade else { break };

            processed += 1;
            self.stats.trade_processed();

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => permit,
            };
            let Ok(permit) = permit else { break };

            let driver = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let _ = driver.push(trade).await;
            });
        }

        info!(processed, "Ingestion stopped");
        processed
    }

    /// Push one trade under the timeout, updating the push counters.
    ///
    /// # Errors
    ///
    /// Returns the sink's error, or [`SinkError::Timeout`].
    pub async fn push(&self, trade: TradeEvent) -> Result<(), SinkError> {
        self.stats.push_started();
        let symbol = trade.symbol.clone();

        let result = match timeout(self.push_timeout, self.sink.push(trade)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout {
                timeout_ms: u64::try_from(self.push_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        self.stats.push_finished(result.is_ok());
        match &result {
            Ok(()) => debug!(%symbol, "Trade pushed"),
            Err(error) => warn!(%symbol, %error, "Trade push failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::MockTradeSink;
    use crate::domain::trade::ExchangeId;

    struct StalledSink;

    #[async_trait]
    impl TradeSink for StalledSink {
        async fn push(&self, _trade: TradeEvent) -> Result<(), SinkError> {
            std::future::pending().await
        }
    }

    fn trade() -> TradeEvent {
        TradeEvent::new(ExchangeId::Binance, "BTCUSDT", "42000.10", "0.5", 1_700_000_000.0)
    }

    #[test]
    fn timeout_is_clamped() {
        let stats = Arc::new(RelayStats::default());
        let short = IngestionDriver::new(
            Arc::new(StalledSink),
            Arc::clone(&stats),
            &IngestionConfig {
                push_timeout: Duration::from_millis(10),
                max_in_flight: 1,
            },
        );
        let long = IngestionDriver::new(
            Arc::new(StalledSink),
            stats,
            &IngestionConfig {
                push_timeout: Duration::from_secs(60),
                max_in_flight: 1,
            },
        );
        assert_eq!(short.push_timeout(), MIN_PUSH_TIMEOUT);
        assert_eq!(long.push_timeout(), MAX_PUSH_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_push_counts_failure() {
        let stats = Arc::new(RelayStats::default());
        let driver = IngestionDriver::new(
            Arc::new(StalledSink),
            Arc::clone(&stats),
            &IngestionConfig::default(),
        );

        let result = driver.push(trade()).await;

        assert!(matches!(result, Err(SinkError::Timeout { timeout_ms: 2000 })));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.trades_pushed_failed, 1);
        assert_eq!(snapshot.trades_pushed_success, 0);
        assert_eq!(snapshot.trades_in_flight, 0);
    }

    #[tokio::test]
    async fn successful_push_counts_success() {
        let mut sink = MockTradeSink::new();
        sink.expect_push()
            .withf(|t| t.symbol == "BTCUSDT" && t.exchange == "binance")
            .times(1)
            .returning(|_| Ok(()));

        let stats = Arc::new(RelayStats::default());
        let driver = IngestionDriver::new(
            Arc::new(sink),
            Arc::clone(&stats),
            &IngestionConfig::default(),
        );

        driver.push(trade()).await.unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.trades_pushed_success, 1);
        assert_eq!(snapshot.trades_in_flight, 0);
    }

    #[tokio::test]
    async fn rejected_push_is_not_retried() {
        let mut sink = MockTradeSink::new();
        sink.expect_push().times(1).returning(|_| {
            Err(SinkError::Rejected {
                message: "unavailable".to_string(),
            })
        });

        let stats = Arc::new(RelayStats::default());
        let driver = IngestionDriver::new(
            Arc::new(sink),
            Arc::clone(&stats),
            &IngestionConfig::default(),
        );

        assert!(driver.push(trade()).await.is_err());
        assert_eq!(stats.snapshot().trades_pushed_failed, 1);
    }
}
