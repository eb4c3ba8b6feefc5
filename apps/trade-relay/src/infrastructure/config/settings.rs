//! Relay Settings
//!
//! Typed configuration read from environment variables. Every section has a
//! `Default` that matches production behavior; unparseable values fall back
//! to it, structurally invalid values are rejected.

use std::time::Duration;

use crate::application::services::{BackoffConfig, IngestionConfig, PoolConfig, StreamConfig};
use crate::domain::trade::{ChannelId, ExchangeId};
use crate::infrastructure::exchange::{binance, huobi, kraken};
use crate::infrastructure::grpc::GrpcSinkConfig;

/// Connection-group sizing and pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Channels per connection.
    pub max_channels_per_connection: usize,
    /// Delay between successive connection startups.
    pub startup_stagger: Duration,
    /// Delay between in-band subscribe batches.
    pub subscribe_pacing: Duration,
}

impl PoolSettings {
    /// Defaults for an exchange.
    #[must_use]
    pub const fn for_exchange(exchange: ExchangeId) -> Self {
        Self {
            max_channels_per_connection: match exchange {
                ExchangeId::Binance => 50,
                ExchangeId::Kraken => 200,
                ExchangeId::Huobi => 100,
            },
            startup_stagger: Duration::from_secs(1),
            subscribe_pacing: Duration::from_secs(2),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::for_exchange(ExchangeId::default())
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectSettings {
    /// Delay before the first retry.
    pub delay: Duration,
    /// Maximum delay.
    pub delay_max: Duration,
    /// Growth factor (1.0 = fixed).
    pub multiplier: f64,
    /// Jitter fraction.
    pub jitter: f64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
            delay_max: Duration::from_secs(5),
            multiplier: 1.0,
            jitter: 0.0,
        }
    }
}

/// Exchange endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSettings {
    /// Binance REST base URL.
    pub binance_api_url: String,
    /// Binance WebSocket base URL.
    pub binance_ws_url: String,
    /// Kraken REST base URL.
    pub kraken_api_url: String,
    /// Kraken WebSocket URL.
    pub kraken_ws_url: String,
    /// Huobi REST base URL.
    pub huobi_api_url: String,
    /// Huobi WebSocket URL.
    pub huobi_ws_url: String,
    /// Channels per Binance `SUBSCRIBE` message.
    pub subscribe_batch_size: usize,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            binance_api_url: "https://api.binance.com".to_string(),
            binance_ws_url: binance::DEFAULT_WS_URL.to_string(),
            kraken_api_url: "https://api.kraken.com".to_string(),
            kraken_ws_url: kraken::DEFAULT_WS_URL.to_string(),
            huobi_api_url: "https://api.huobi.pro".to_string(),
            huobi_ws_url: huobi::DEFAULT_WS_URL.to_string(),
            subscribe_batch_size: 25,
        }
    }
}

/// Downstream sink settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSettings {
    /// gRPC address of the sync service.
    pub grpc_addr: String,
    /// Per-push timeout.
    pub push_timeout: Duration,
    /// Maximum concurrent pushes.
    pub max_in_flight: usize,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            grpc_addr: "http://127.0.0.1:50051".to_string(),
            push_timeout: Duration::from_secs(2),
            max_in_flight: 64,
        }
    }
}

/// Symbol directory fetch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySettings {
    /// Fetch attempts before giving up.
    pub attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Health and metrics port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 2112 }
    }
}

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Exchange to relay.
    pub exchange: ExchangeId,
    /// Explicit channel list; skips the directory fetch when set.
    pub channels: Option<Vec<ChannelId>>,
    /// Pool sizing and pacing.
    pub pool: PoolSettings,
    /// Reconnect backoff.
    pub reconnect: ReconnectSettings,
    /// Exchange endpoints.
    pub exchanges: ExchangeSettings,
    /// Downstream sink.
    pub sink: SinkSettings,
    /// Symbol directory.
    pub directory: DirectorySettings,
    /// HTTP server.
    pub server: ServerSettings,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeId::default(),
            channels: None,
            pool: PoolSettings::default(),
            reconnect: ReconnectSettings::default(),
            exchanges: ExchangeSettings::default(),
            sink: SinkSettings::default(),
            directory: DirectorySettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl RelayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown exchange or a structurally invalid
    /// value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown exchange or a structurally invalid
    /// value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let exchange = match env.get("RELAY_EXCHANGE") {
            Some(name) => ExchangeId::from_str_case_insensitive(&name)
                .ok_or(ConfigError::UnknownExchange(name))?,
            None => ExchangeId::default(),
        };

        let channels = env.get("RELAY_CHANNELS").map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        });
        if channels.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::EmptyValue("RELAY_CHANNELS".to_string()));
        }

        let pool_defaults = PoolSettings::for_exchange(exchange);
        let pool = PoolSettings {
            max_channels_per_connection: env.positive_usize(
                "RELAY_MAX_CHANNELS_PER_CONNECTION",
                pool_defaults.max_channels_per_connection,
            )?,
            startup_stagger: env.millis("RELAY_STARTUP_STAGGER_MS", pool_defaults.startup_stagger),
            subscribe_pacing: env.millis(
                "RELAY_SUBSCRIBE_PACING_MS",
                pool_defaults.subscribe_pacing,
            ),
        };

        let reconnect_defaults = ReconnectSettings::default();
        let delay = env.millis("RELAY_RECONNECT_DELAY_MS", reconnect_defaults.delay);
        let reconnect = ReconnectSettings {
            delay,
            delay_max: env
                .millis("RELAY_RECONNECT_DELAY_MAX_MS", reconnect_defaults.delay_max)
                .max(delay),
            multiplier: env
                .f64("RELAY_RECONNECT_MULTIPLIER", reconnect_defaults.multiplier)
                .max(1.0),
            jitter: env.f64("RELAY_RECONNECT_JITTER", reconnect_defaults.jitter).clamp(0.0, 1.0),
        };

        let exchange_defaults = ExchangeSettings::default();
        let exchanges = ExchangeSettings {
            binance_api_url: env.string("BINANCE_API_URL", exchange_defaults.binance_api_url),
            binance_ws_url: env.string("BINANCE_WS_URL", exchange_defaults.binance_ws_url),
            kraken_api_url: env.string("KRAKEN_API_URL", exchange_defaults.kraken_api_url),
            kraken_ws_url: env.string("KRAKEN_WS_URL", exchange_defaults.kraken_ws_url),
            huobi_api_url: env.string("HUOBI_API_URL", exchange_defaults.huobi_api_url),
            huobi_ws_url: env.string("HUOBI_WS_URL", exchange_defaults.huobi_ws_url),
            subscribe_batch_size: env.positive_usize(
                "RELAY_SUBSCRIBE_BATCH_SIZE",
                exchange_defaults.subscribe_batch_size,
            )?,
        };

        let sink_defaults = SinkSettings::default();
        let sink = SinkSettings {
            grpc_addr: env.string("RELAY_GRPC_ADDR", sink_defaults.grpc_addr),
            push_timeout: env.millis("RELAY_PUSH_TIMEOUT_MS", sink_defaults.push_timeout),
            max_in_flight: env.positive_usize("RELAY_MAX_IN_FLIGHT", sink_defaults.max_in_flight)?,
        };

        let directory_defaults = DirectorySettings::default();
        let directory = DirectorySettings {
            attempts: env.parsed("RELAY_DIRECTORY_ATTEMPTS", directory_defaults.attempts).max(1),
            retry_delay: env.millis("RELAY_DIRECTORY_RETRY_MS", directory_defaults.retry_delay),
        };

        let server = ServerSettings {
            health_port: env.parsed("RELAY_HEALTH_PORT", ServerSettings::default().health_port),
        };

        Ok(Self {
            exchange,
            channels,
            pool,
            reconnect,
            exchanges,
            sink,
            directory,
            server,
        })
    }

    /// Stream pool configuration.
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_per_connection: self.pool.max_channels_per_connection,
            startup_stagger: self.pool.startup_stagger,
            stream: StreamConfig {
                backoff: BackoffConfig {
                    initial_delay: self.reconnect.delay,
                    max_delay: self.reconnect.delay_max,
                    multiplier: self.reconnect.multiplier,
                    jitter_factor: self.reconnect.jitter,
                },
                subscribe_pacing: self.pool.subscribe_pacing,
                ..StreamConfig::default()
            },
        }
    }

    /// Ingestion driver configuration.
    #[must_use]
    pub const fn ingestion_config(&self) -> IngestionConfig {
        IngestionConfig {
            push_timeout: self.sink.push_timeout,
            max_in_flight: self.sink.max_in_flight,
        }
    }

    /// gRPC sink configuration.
    #[must_use]
    pub fn grpc_sink_config(&self) -> GrpcSinkConfig {
        GrpcSinkConfig {
            addr: self.sink.grpc_addr.clone(),
            ..GrpcSinkConfig::default()
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Exchange name is not supported.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),
    /// Value is structurally invalid.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Environment variable name.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.get(key).unwrap_or(default)
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn f64(&self, key: &str, default: f64) -> f64 {
        let value = self.parsed(key, default);
        if value.is_finite() { value } else { default }
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }

    fn positive_usize(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        match self.parsed(key, default) {
            0 => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be greater than zero".to_string(),
            }),
            value => Ok(value),
        }
    }
}
