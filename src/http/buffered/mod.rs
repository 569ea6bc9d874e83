//! Buffered engine on axum.
//!
//! # Data Flow
//! ```text
//! axum::serve / axum_server (TLS)
//!     → TraceLayer → [TimeoutLayer]
//!     → dispatch: read whole body (read timeout, size cap)
//!     → BufferedRequest + BufferedResponse
//!     → Handler::serve_http on the blocking pool
//!     → http::Response<Bytes> with exact Content-Length
//! ```
//!
//! # Design Decisions
//! - Bodies larger than `MAX_BODY_BYTES` are refused with 413
//! - A body that does not arrive within the read timeout gets 408
//! - The write timeout bounds the whole handler call (tower-http timeout)
//! - TLS negotiates HTTP/2 or HTTP/1.1 through axum-server
//! - Open connections are drained for at most the drain timeout

pub mod request;
pub mod response;
pub mod url;

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::Router;
use bytes::Bytes;
use http::StatusCode;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

pub use request::BufferedRequest;
pub use response::BufferedResponse;
pub use self::url::ParsedUrl;

use super::{deadline, log_outcome, plain_status};
use crate::config::Config;
use crate::engine::{Engine, EngineError, Handler};
use crate::lifecycle::{signals, startup, Shutdown, DRAIN_TIMEOUT};
use crate::net::listener::Listener;
use crate::net::tls::load_tls_config;
use crate::observability::Logger;

const ENGINE_NAME: &str = "buffered";

/// Largest request body the buffered engine accepts.
pub const MAX_BODY_BYTES: usize = 4 << 20;

/// Whole-message HTTP engine.
pub struct BufferedEngine {
    config: Config,
    handler: Option<Arc<dyn Handler>>,
    logger: Logger,
    drain_timeout: Duration,
}

/// Application state injected into the dispatch handler.
struct AppState {
    handler: Arc<dyn Handler>,
    dispatch: Dispatch,
    tls: bool,
    read_timeout: Option<Duration>,
}

impl BufferedEngine {
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
        let dispatch = self.logger.dispatch().clone();
        let state = Arc::new(AppState {
            handler,
            dispatch: dispatch.clone(),
            tls: self.config.tls_enabled(),
            read_timeout: deadline(self.config.read_timeout),
        });
        let app = build_router(&self.config, state)
            .into_make_service_with_connect_info::<SocketAddr>();
        let address = listener.local_addr();

        async move {
            tracing::info!(
                address = %address,
                engine = ENGINE_NAME,
                tls = self.config.tls_enabled(),
                "Engine started"
            );

            let drain_timeout = self.drain_timeout;
            if self.config.tls_enabled() {
                let tls = load_tls_config(&self.config).await?;
                let handle = axum_server::Handle::new();
                let watcher = handle.clone();
                tokio::spawn(
                    async move {
                        shutdown.await;
                        tracing::info!(engine = ENGINE_NAME, "Stopping engine");
                        watcher.graceful_shutdown(Some(drain_timeout));
                    }
                    .with_current_subscriber(),
                );
                let std_listener = listener.into_inner().into_std().map_err(EngineError::Serve)?;
                axum_server::from_tcp_rustls(std_listener, tls)
                    .handle(handle)
                    .serve(app)
                    .await
                    .map_err(EngineError::Serve)?;
            } else {
                let coordinator = Shutdown::new();
                let mut stopping = coordinator.subscribe();
                let stop = async move {
                    shutdown.await;
                    tracing::info!(engine = ENGINE_NAME, "Stopping engine");
                    coordinator.trigger();
                };
                let server = axum::serve(listener.into_inner(), app)
                    .with_graceful_shutdown(stop)
                    .into_future();
                let drain_expired = async move {
                    let _ = stopping.recv().await;
                    tokio::time::sleep(drain_timeout).await;
                };
                tokio::select! {
                    result = server => result.map_err(EngineError::Serve)?,
                    _ = drain_expired => {
                        tracing::warn!(
                            engine = ENGINE_NAME,
                            timeout = ?drain_timeout,
                            "Drain timeout reached, connections still active"
                        );
                    }
                }
            }

            tracing::info!(engine = ENGINE_NAME, "Engine stopped");
            Ok::<_, EngineError>(())
        }
        .with_subscriber(dispatch)
        .await
    }
}

impl Engine for BufferedEngine {
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

/// Build the Axum router: one fallback route, tracing and the optional timeout.
#[allow(deprecated)]
fn build_router(config: &Config, state: Arc<AppState>) -> Router {
    let router = Router::new().fallback(dispatch).with_state(state);
    let router = match deadline(config.write_timeout) {
        Some(limit) => router.layer(TimeoutLayer::new(limit)),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

async fn dispatch(
    State(state): State<Arc<AppState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: axum::extract::Request,
) -> axum::response::Response {
    let logger = state.dispatch.clone();
    serve_buffered(state, remote, request)
        .with_subscriber(logger)
        .await
        .map(axum::body::Body::from)
}

async fn serve_buffered(
    state: Arc<AppState>,
    remote: SocketAddr,
    request: axum::extract::Request,
) -> http::Response<Bytes> {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_owned();

    if declared_length(&parts.headers).is_some_and(|len| len > MAX_BODY_BYTES as u64) {
        tracing::warn!(path = %path, limit = MAX_BODY_BYTES, "Request body too large");
        return plain_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let body = match read_body(body, state.read_timeout).await {
        Ok(body) => body,
        Err(status) => return plain_status(status),
    };

    let request = match BufferedRequest::new(parts, body, remote, state.tls) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Unusable request target");
            return plain_status(StatusCode::BAD_REQUEST);
        }
    };

    let handler = Arc::clone(&state.handler);
    let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
    let outcome = tokio::task::spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, move || {
            let mut request = request;
            let mut response = BufferedResponse::new();
            handler.serve_http(&mut request, &mut response);
            response.into_http()
        })
    })
    .await;

    log_outcome(
        ENGINE_NAME,
        &method,
        &path,
        remote,
        start,
        outcome
            .as_ref()
            .map(|(response, size)| (response.status().as_u16(), *size)),
    );

    match outcome {
        Ok((response, _)) => response,
        Err(_) => plain_status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

fn declared_length(headers: &http::HeaderMap) -> Option<u64> {
    headers
        .get(http::header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

async fn read_body(body: axum::body::Body, limit: Option<Duration>) -> Result<Bytes, StatusCode> {
    let collect = axum::body::to_bytes(body, MAX_BODY_BYTES);
    let result = match limit {
        Some(limit) => tokio::time::timeout(limit, collect).await.map_err(|_| {
            tracing::warn!(timeout = ?limit, "Request body read timed out");
            StatusCode::REQUEST_TIMEOUT
        })?,
        None => collect.await,
    };
    result.map_err(|e| {
        if is_length_limit(&e) {
            tracing::warn!(limit = MAX_BODY_BYTES, "Request body too large");
            StatusCode::PAYLOAD_TOO_LARGE
        } else {
            tracing::warn!(error = %e, "Failed to read request body");
            StatusCode::BAD_REQUEST
        }
    })
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_length_parses_header() {
        let mut headers = http::HeaderMap::new();
        assert_eq!(declared_length(&headers), None);
        headers.insert(http::header::CONTENT_LENGTH, "42".parse().unwrap());
        assert_eq!(declared_length(&headers), Some(42));
        headers.insert(http::header::CONTENT_LENGTH, "x".parse().unwrap());
        assert_eq!(declared_length(&headers), None);
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let body = axum::body::Body::from(vec![0u8; MAX_BODY_BYTES + 1]);
        assert_eq!(read_body(body, None).await, Err(StatusCode::PAYLOAD_TOO_LARGE));
    }

    #[tokio::test]
    async fn body_within_limit_is_returned() {
        let body = axum::body::Body::from("hello");
        assert_eq!(read_body(body, Some(Duration::from_secs(1))).await, Ok(Bytes::from("hello")));
    }
}
