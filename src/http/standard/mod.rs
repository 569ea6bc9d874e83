//! Streaming engine on hyper's HTTP/1.1 connection driver.
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → [TLS handshake]
//!     → http1 connection (header read timeout)
//!     → per request:
//!         body pump task  ──mpsc──▶ StreamingBody (handler thread)
//!         handler thread  ──oneshot──▶ response head
//!         handler thread  ──mpsc──▶ ChannelBody → client
//! ```
//!
//! # Design Decisions
//! - Handlers run on the blocking pool; bodies are never buffered whole
//! - A handler that does not commit within the write timeout gets a 503
//! - A handler that panics before committing gets a 500; after committing
//!   the connection is aborted so the client sees a truncated body
//! - HTTP/1.1 only; TLS offers `http/1.1` via ALPN

pub mod request;
pub mod response;
pub mod url;

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_rustls::TlsAcceptor;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

pub use request::StandardRequest;
pub use response::StandardResponse;
pub use self::url::UriUrl;

use self::response::ChannelBody;
use super::request::{pump_body, StreamingBody, BODY_CHANNEL_CAPACITY};
use super::{deadline, log_outcome, plain_status};
use crate::config::Config;
use crate::engine::{Engine, EngineError, Handler};
use crate::lifecycle::{signals, startup, Shutdown, DRAIN_TIMEOUT};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::Listener;
use crate::net::tls::load_tls_config;
use crate::observability::Logger;

const ENGINE_NAME: &str = "standard";

/// Pause after a failed accept so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

type ResponseBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// Streaming HTTP/1.1 engine.
pub struct StandardEngine {
    config: Config,
    handler: Option<Arc<dyn Handler>>,
    logger: Logger,
    drain_timeout: Duration,
}

struct Inner {
    handler: Arc<dyn Handler>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    drain_timeout: Duration,
}

impl StandardEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            handler: None,
            logger: Logger::current(),
            drain_timeout: DRAIN_TIMEOUT,
        }
    }

    /// Bound the wait for open connections after shutdown. Defaults to [`DRAIN_TIMEOUT`].
    pub fn with_drain_timeout(mut self, limit: Duration) -> Self {
        self.drain_timeout = limit;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serve on `listener` until `shutdown` resolves, then drain.
    pub async fn serve<S>(&self, listener: Listener, shutdown: S) -> Result<(), EngineError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let handler = startup::preflight(&self.config, self.handler.as_ref())?;
        let tls = if self.config.tls_enabled() {
            let tls = load_tls_config(&self.config).await?;
            let mut server_config = (*tls.get_inner()).clone();
            server_config.alpn_protocols = vec![b"http/1.1".to_vec()];
            Some(TlsAcceptor::from(Arc::new(server_config)))
        } else {
            None
        };

        let inner = Arc::new(Inner {
            handler,
            read_timeout: deadline(self.config.read_timeout),
            write_timeout: deadline(self.config.write_timeout),
            drain_timeout: self.drain_timeout,
        });

        accept_loop(listener, inner, tls, shutdown)
            .with_subscriber(self.logger.dispatch().clone())
            .await
    }
}

impl Engine for StandardEngine {
    fn set_handler(&mut self, handler: Arc<dyn Handler>) {
        self.handler = Some(handler);
    }

    fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    fn start(&mut self) -> Result<(), EngineError> {
        startup::preflight(&self.config, self.handler.as_ref())?;
        let logger = self.logger.clone();
        let engine = &*self;
        startup::block_on(&logger, async move {
            let listener = Listener::bind(&engine.config).await?;
            engine.serve(listener, signals::shutdown_signal()).await
        })
    }
}

async fn accept_loop<S>(
    listener: Listener,
    inner: Arc<Inner>,
    tls: Option<TlsAcceptor>,
    shutdown: S,
) -> Result<(), EngineError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let coordinator = Shutdown::new();
    let tracker = ConnectionTracker::new();
    tracing::info!(
        address = %listener.local_addr(),
        engine = ENGINE_NAME,
        tls = tls.is_some(),
        "Engine started"
    );

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let guard = tracker.track();
                    let inner = Arc::clone(&inner);
                    let tls = tls.clone();
                    let stop = coordinator.subscribe();
                    tokio::spawn(
                        async move {
                            let id = guard.id();
                            tracing::trace!(connection_id = %id, remote_addr = %remote, "Connection accepted");
                            let handshake_limit = inner.read_timeout;
                            let result = match tls {
                                Some(acceptor) => {
                                    let handshake = acceptor.accept(stream);
                                    let accepted = match handshake_limit {
                                        Some(limit) => tokio::time::timeout(limit, handshake)
                                            .await
                                            .unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into())),
                                        None => handshake.await,
                                    };
                                    match accepted {
                                        Ok(stream) => serve_connection(inner, stream, remote, true, stop).await,
                                        Err(e) => {
                                            tracing::debug!(connection_id = %id, error = %e, "TLS handshake failed");
                                            Ok(())
                                        }
                                    }
                                }
                                None => serve_connection(inner, stream, remote, false, stop).await,
                            };
                            if let Err(e) = result {
                                tracing::debug!(connection_id = %id, error = %e, "Connection error");
                            }
                            drop(guard);
                        }
                        .with_current_subscriber(),
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            _ = &mut shutdown => {
                tracing::info!(engine = ENGINE_NAME, "Stopping engine");
                break;
            }
        }
    }

    drop(listener);
    coordinator.trigger();
    tracker.drain(inner.drain_timeout).await;
    tracing::info!(engine = ENGINE_NAME, "Engine stopped");
    Ok(())
}

async fn serve_connection<I>(
    inner: Arc<Inner>,
    io: I,
    remote: SocketAddr,
    tls: bool,
    mut stop: broadcast::Receiver<()>,
) -> Result<(), hyper::Error>
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut builder = http1::Builder::new();
    builder.timer(TokioTimer::new());
    if let Some(limit) = inner.read_timeout {
        builder.header_read_timeout(limit);
    }

    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let inner = Arc::clone(&inner);
        async move { Ok::<_, Infallible>(inner.serve_request(req, remote, tls).await) }
    });

    let conn = builder.serve_connection(TokioIo::new(io), service);
    tokio::pin!(conn);
    tokio::select! {
        result = conn.as_mut() => result,
        _ = stop.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    }
}

impl Inner {
    async fn serve_request(
        self: Arc<Self>,
        req: hyper::Request<Incoming>,
        remote: SocketAddr,
        tls: bool,
    ) -> hyper::Response<ResponseBody> {
        let start = Instant::now();
        let (parts, incoming) = req.into_parts();
        let method = parts.method.clone();
        let path = parts.uri.path().to_owned();

        let (chunk_tx, chunk_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        tokio::spawn(pump_body(incoming, chunk_tx, self.read_timeout).with_current_subscriber());
        let request = StandardRequest::new(parts, StreamingBody::new(chunk_rx), remote, tls);

        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_CHANNEL_CAPACITY);
        let response = StandardResponse::new(head_tx, body_tx);

        let handler = Arc::clone(&self.handler);
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        let task = tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, move || {
                let mut request = request;
                let mut response = response;
                handler.serve_http(&mut request, &mut response);
                drop(request);
                response.finish()
            })
        });

        tokio::spawn(
            completion(task, method, path.clone(), remote, start).with_current_subscriber(),
        );

        let head = match self.write_timeout {
            Some(limit) => tokio::time::timeout(limit, head_rx).await.ok(),
            None => Some(head_rx.await),
        };
        match head {
            Some(Ok(head)) => head.map(|()| ChannelBody::new(body_rx).boxed_unsync()),
            Some(Err(_)) => error_response(StatusCode::INTERNAL_SERVER_ERROR),
            None => {
                tracing::warn!(
                    path = %path,
                    timeout = ?self.write_timeout,
                    "Handler did not commit before write timeout"
                );
                error_response(StatusCode::SERVICE_UNAVAILABLE)
            }
        }
    }
}

/// Wait for the handler thread, then log and record the request.
async fn completion(
    task: tokio::task::JoinHandle<(u16, u64)>,
    method: Method,
    path: String,
    remote: SocketAddr,
    start: Instant,
) {
    let outcome = task.await;
    log_outcome(
        ENGINE_NAME,
        &method,
        &path,
        remote,
        start,
        outcome.as_ref().map(|&result| result),
    );
}

fn error_response(status: StatusCode) -> hyper::Response<ResponseBody> {
    plain_status(status).map(|body| {
        Full::new(body)
            .map_err(|never| match never {})
            .boxed_unsync()
    })
}
