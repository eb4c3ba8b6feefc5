//! Trade Relay Binary
//!
//! Starts the exchange trade stream relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trade-relay
//! ```
//!
//! # Environment Variables
//!
//! - `RELAY_EXCHANGE`: binance | kraken | huobi (default: binance)
//! - `RELAY_CHANNELS`: Comma-separated channels; skips the directory fetch
//! - `RELAY_MAX_CHANNELS_PER_CONNECTION`: Channels per WebSocket (default: 50 / 200 / 100)
//! - `RELAY_STARTUP_STAGGER_MS`: Delay between connection startups (default: 1000)
//! - `RELAY_GRPC_ADDR`: Sync service address (default: <http://127.0.0.1:50051>)
//! - `RELAY_PUSH_TIMEOUT_MS`: Per-trade push timeout, 2000-6000 (default: 2000)
//! - `RELAY_HEALTH_PORT`: Health check and metrics HTTP port (default: 2112)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use trade_relay::application::ports::TradeSink;
use trade_relay::infrastructure::directory::DirectoryClient;
use trade_relay::infrastructure::exchange::adapter_for;
use trade_relay::infrastructure::health::{HealthServer, HealthServerState};
use trade_relay::infrastructure::telemetry;
use trade_relay::infrastructure::websocket::WebSocketConnector;
use trade_relay::{
    ChannelId, GrpcTradeSink, IngestionDriver, PrometheusMetrics, RelayConfig, RelayStats,
    StreamPool, init_metrics,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "failed to install rustls crypto provider")?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Trade Relay");

    let _metrics_handle = init_metrics()?;

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let channels = tokio::select! {
        channels = load_channels(&config) => channels?,
        () = shutdown_token.cancelled() => {
            tracing::info!("Shutdown before channels were loaded");
            return Ok(());
        }
    };

    let sink: Arc<dyn TradeSink> =
        Arc::new(GrpcTradeSink::connect(&config.grpc_sink_config()).await?);

    let stats = Arc::new(RelayStats::new(Arc::new(PrometheusMetrics::new(config.exchange))));

    let mut pool = StreamPool::create(
        channels,
        config.pool_config(),
        adapter_for(config.exchange, &config.exchanges),
        Arc::new(WebSocketConnector::default()),
        Arc::clone(&stats),
    )?;

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        pool.handle(),
        Arc::clone(&stats),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tracing::info!(groups = pool.group_count(), "Trade relay ready");

    let driver = IngestionDriver::new(sink, Arc::clone(&stats), &config.ingestion_config());
    let processed = driver.run(&mut pool, &shutdown_token).await;

    shutdown_token.cancel();
    pool.close().await;

    tracing::info!(processed, "Trade relay stopped");
    Ok(())
}

/// Explicit channels from the config, or the exchange directory.
async fn load_channels(config: &RelayConfig) -> Result<Vec<ChannelId>, Box<dyn std::error::Error>> {
    if let Some(channels) = &config.channels {
        tracing::info!(channels = channels.len(), "Using configured channels");
        return Ok(channels.clone());
    }

    let directory = DirectoryClient::new(&config.exchanges)?;
    Ok(directory
        .fetch_with_retry(config.exchange, &config.directory)
        .await?)
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        exchange = %config.exchange,
        max_channels_per_connection = config.pool.max_channels_per_connection,
        startup_stagger_ms = config.pool.startup_stagger.as_millis(),
        grpc_addr = %config.sink.grpc_addr,
        push_timeout_ms = config.sink.push_timeout.as_millis(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        binance_ws_url = %config.exchanges.binance_ws_url,
        kraken_ws_url = %config.exchanges.kraken_ws_url,
        huobi_ws_url = %config.exchanges.huobi_ws_url,
        reconnect_delay_ms = config.reconnect.delay.as_millis(),
        "Exchange endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Cancel `shutdown_token` on SIGTERM or SIGINT.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => return,
    }

    shutdown_token.cancel();
}
