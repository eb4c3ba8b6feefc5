//! Configuration Module
//!
//! Environment-driven configuration for the relay.

mod settings;

pub use settings::{
    ConfigError, DirectorySettings, ExchangeSettings, PoolSettings, ReconnectSettings,
    RelayConfig, ServerSettings, SinkSettings,
};
