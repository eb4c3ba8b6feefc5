//! Application Services
//!
//! - `backoff`: reconnect delay schedule
//! - `stats`: relay counters mirrored into the metrics port
//! - `stream`: per-connection state machine
//! - `pool`: partitioned, staggered set of streams behind one channel
//! - `ingestion`: pool-to-sink pump

pub mod backoff;
pub mod ingestion;
pub mod pool;
pub mod stats;
pub mod stream;

pub use backoff::{Backoff, BackoffConfig};
pub use ingestion::{IngestionConfig, IngestionDriver, MAX_PUSH_TIMEOUT, MIN_PUSH_TIMEOUT};
pub use pool::{PoolConfig, PoolError, PoolHandle, PoolStatus, StreamPool};
pub use stats::{RelayStats, StatsSnapshot};
pub use stream::{
    ExchangeStream, StreamConfig, StreamContext, StreamHandle, StreamStatus,
    StreamStatusSnapshot,
};
