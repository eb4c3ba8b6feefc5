//! gRPC Sink Integration Tests
//!
//! Runs an in-process `SyncService` and pushes trades through
//! [`GrpcTradeSink`], alone and behind the ingestion driver.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use common::{FakeConnector, Step, WS_URL, binance_trade, binance_url};
use trade_relay::infrastructure::exchange::{BinanceAdapter, BinanceConfig};
use trade_relay::proto::sync_service_server::{SyncService, SyncServiceServer};
use trade_relay::proto::{Empty, TradeRequest};
use trade_relay::{
    ExchangeId, GrpcSinkConfig, GrpcTradeSink, IngestionConfig, IngestionDriver, PoolConfig,
    RelayStats, SinkError, StreamPool, TradeEvent, TradeSink,
};

#[derive(Clone, Copy)]
enum Behavior {
    Accept,
    Reject,
    Stall,
}

struct TestSyncService {
    behavior: Behavior,
    received: Arc<Mutex<Vec<TradeRequest>>>,
    notify: mpsc::UnboundedSender<()>,
}

#[tonic::async_trait]
impl SyncService for TestSyncService {
    async fn push_trade(&self, request: Request<TradeRequest>) -> Result<Response<Empty>, Status> {
        match self.behavior {
            Behavior::Accept => {
                self.received.lock().push(request.into_inner());
                let _ = self.notify.send(());
                Ok(Response::new(Empty {}))
            }
            Behavior::Reject => Err(Status::unavailable("aggregator offline")),
            Behavior::Stall => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Response::new(Empty {}))
            }
        }
    }
}

struct TestServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<TradeRequest>>>,
    notifications: mpsc::UnboundedReceiver<()>,
    handle: tokio::task::JoinHandle<()>,
}

async fn start_server(behavior: Behavior) -> TestServer {
    let received = Arc::new(Mutex::new(Vec::new()));
    let (notify, notifications) = mpsc::unbounded_channel();
    let service = TestSyncService {
        behavior,
        received: Arc::clone(&received),
        notify,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(SyncServiceServer::new(service))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    TestServer {
        addr,
        received,
        notifications,
        handle,
    }
}

async fn connect(server: &TestServer) -> GrpcTradeSink {
    GrpcTradeSink::connect(&GrpcSinkConfig {
        addr: format!("http://{}", server.addr),
        connect_timeout: Duration::from_secs(5),
    })
    .await
    .unwrap()
}

fn trade() -> TradeEvent {
    TradeEvent::new(ExchangeId::Binance, "BTCUSDT", "42000.10", "0.5", 1_700_000_000.123)
}

#[tokio::test]
async fn push_delivers_the_trade() {
    let server = start_server(Behavior::Accept).await;
    let sink = connect(&server).await;

    sink.push(trade()).await.unwrap();

    let received = server.received.lock().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].symbol, "BTCUSDT");
    assert_eq!(received[0].price, "42000.10");
    assert_eq!(received[0].quantity, "0.5");
    assert_eq!(received[0].exchange, "binance");
    assert!((received[0].trade_time - 1_700_000_000.123).abs() < 1e-6);

    server.handle.abort();
}

#[tokio::test]
async fn server_error_is_a_rejection() {
    let server = start_server(Behavior::Reject).await;
    let sink = connect(&server).await;

    let result = sink.push(trade()).await;
    assert!(matches!(result, Err(SinkError::Rejected { .. })));

    server.handle.abort();
}

#[tokio::test]
async fn stalled_service_times_out_and_is_counted() {
    let server = start_server(Behavior::Stall).await;
    let sink = connect(&server).await;
    let stats = Arc::new(RelayStats::default());
    let driver = IngestionDriver::new(
        Arc::new(sink),
        Arc::clone(&stats),
        &IngestionConfig::default(),
    );

    let result = driver.push(trade()).await;

    assert!(matches!(result, Err(SinkError::Timeout { timeout_ms: 2000 })));
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.trades_pushed_failed, 1);
    assert_eq!(snapshot.trades_in_flight, 0);

    server.handle.abort();
}

#[tokio::test]
async fn unreachable_service_fails_at_startup() {
    let result = GrpcTradeSink::connect(&GrpcSinkConfig {
        addr: "http://127.0.0.1:1".to_string(),
        connect_timeout: Duration::from_millis(500),
    })
    .await;
    assert!(matches!(result, Err(SinkError::ConnectionError { .. })));
}

#[tokio::test]
async fn pool_trades_reach_the_service() {
    let mut server = start_server(Behavior::Accept).await;
    let sink = connect(&server).await;

    let connector = FakeConnector::new();
    let channel = "btcusdt@aggTrade".to_string();
    connector.script(
        &binance_url(&channel),
        [Step::hold(vec![
            binance_trade("BTCUSDT", "1.0"),
            binance_trade("BTCUSDT", "2.0"),
            binance_trade("BTCUSDT", "3.0"),
        ])],
    );

    let stats = Arc::new(RelayStats::default());
    let mut pool = StreamPool::create(
        vec![channel],
        PoolConfig::default(),
        Arc::new(BinanceAdapter::new(BinanceConfig {
            ws_url: WS_URL.to_string(),
            ..BinanceConfig::default()
        })),
        Arc::new(connector),
        Arc::clone(&stats),
    )
    .unwrap();

    let driver = IngestionDriver::new(
        Arc::new(sink),
        Arc::clone(&stats),
        &IngestionConfig::default(),
    );
    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let processed = driver.run(&mut pool, &cancel).await;
            pool.close().await;
            processed
        })
    };

    for _ in 0..3 {
        timeout(Duration::from_secs(5), server.notifications.recv())
            .await
            .unwrap()
            .unwrap();
    }

    cancel.cancel();
    assert_eq!(run.await.unwrap(), 3);

    let mut prices: Vec<String> = server.received.lock().iter().map(|t| t.price.clone()).collect();
    prices.sort();
    assert_eq!(prices, vec!["1.0", "2.0", "3.0"]);

    timeout(Duration::from_secs(5), async {
        while stats.snapshot().trades_pushed_success < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(stats.snapshot().trades_processed, 3);

    server.handle.abort();
}
