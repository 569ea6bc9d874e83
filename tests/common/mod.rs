//! Shared utilities for engine integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_engine::config::{Config, EngineKind};
use http_engine::engine::{Engine, EngineError, Handler};
use http_engine::lifecycle::DRAIN_TIMEOUT;
use http_engine::net::listener::Listener;
use http_engine::{BufferedEngine, Logger, StandardEngine};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Plaintext config with short timeouts. The address is unused: tests bind their own listener.
pub fn test_config() -> Config {
    Config {
        address: "127.0.0.1:0".into(),
        read_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

/// An engine serving on an ephemeral port.
pub struct RunningEngine {
    pub addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), EngineError>>,
}

impl RunningEngine {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger graceful shutdown and wait for `serve` to return.
    pub async fn shutdown(self) -> Result<(), EngineError> {
        let _ = self.stop.send(());
        self.task.await.expect("engine task panicked")
    }
}

pub async fn ephemeral_listener() -> Listener {
    let tcp = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    Listener::from_tokio(tcp).expect("wrap listener")
}

/// Start `kind` with `handler` and the current logger.
pub async fn spawn_engine<H>(kind: EngineKind, config: Config, handler: H) -> RunningEngine
where
    H: Handler + 'static,
{
    spawn_engine_with_logger(kind, config, handler, Logger::current()).await
}

/// Start `kind` with `handler` logging through `logger`.
pub async fn spawn_engine_with_logger<H>(
    kind: EngineKind,
    config: Config,
    handler: H,
    logger: Logger,
) -> RunningEngine
where
    H: Handler + 'static,
{
    spawn_engine_draining(kind, config, handler, logger, DRAIN_TIMEOUT).await
}

/// Start `kind` with `handler`, waiting at most `drain` for open connections on shutdown.
pub async fn spawn_engine_draining<H>(
    kind: EngineKind,
    config: Config,
    handler: H,
    logger: Logger,
    drain: Duration,
) -> RunningEngine
where
    H: Handler + 'static,
{
    let listener = ephemeral_listener().await;
    let addr = listener.local_addr();
    let (stop, stopped) = oneshot::channel::<()>();
    let shutdown = async move {
        let _ = stopped.await;
    };
    let handler: Arc<dyn Handler> = Arc::new(handler);

    let task = match kind {
        EngineKind::Standard => {
            let mut engine = StandardEngine::new(config).with_drain_timeout(drain);
            engine.set_handler(handler);
            engine.set_logger(logger);
            tokio::spawn(async move { engine.serve(listener, shutdown).await })
        }
        EngineKind::Buffered => {
            let mut engine = BufferedEngine::new(config).with_drain_timeout(drain);
            engine.set_handler(handler);
            engine.set_logger(logger);
            tokio::spawn(async move { engine.serve(listener, shutdown).await })
        }
    };

    RunningEngine { addr, stop, task }
}

/// Client without connection pooling, so shutdown is not held up by idle connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .expect("build client")
}

/// Write `request` as-is, then read until `needle` appears, the peer closes, or 5 s pass.
///
/// The socket stays open while reading, so a request whose body is shorter
/// than its `Content-Length` stalls on the server side.
pub async fn raw_exchange(addr: SocketAddr, request: &[u8], needle: Option<&str>) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request).await.expect("write request");

    let mut received = Vec::new();
    let read = async {
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
            }
            if let Some(needle) = needle {
                if String::from_utf8_lossy(&received).contains(needle) {
                    break;
                }
            }
        }
    };
    let _ = tokio::time::timeout(Duration::from_secs(5), read).await;
    String::from_utf8_lossy(&received).into_owned()
}
