//! Concrete engines.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → standard/ (hyper http1, streamed bodies)  ─┐
//!     → buffered/ (axum, whole bodies in memory)  ─┤
//!                                                  ▼
//!         request adapter (&mut dyn Request) + response adapter (&mut dyn Response)
//!                                                  ▼
//!                          Handler::serve_http on the blocking pool
//!                                                  ▼
//!                   log_outcome → metrics::record_request
//! ```
//!
//! # Design Decisions
//! - Both engines share the commit/write bookkeeping in `response.rs`
//! - Both engines share body and form handling in `request.rs`
//! - Handler panics are contained per request and answered with 500

pub mod buffered;
pub mod request;
pub mod response;
pub mod standard;

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Method, StatusCode};
use tokio::task::JoinError;

pub use buffered::{BufferedEngine, BufferedRequest, BufferedResponse};
pub use request::{BufferedBody, StreamingBody, MAX_FORM_BYTES};
pub use standard::{StandardEngine, StandardRequest, StandardResponse};

use crate::config::{Config, EngineKind};
use crate::engine::Engine;
use crate::observability::metrics;

/// Construct the engine selected by `kind`.
pub fn new_engine(kind: EngineKind, config: Config) -> Box<dyn Engine> {
    match kind {
        EngineKind::Standard => Box::new(StandardEngine::new(config)),
        EngineKind::Buffered => Box::new(BufferedEngine::new(config)),
    }
}

/// Zero means no limit.
pub(crate) fn deadline(limit: Duration) -> Option<Duration> {
    (!limit.is_zero()).then_some(limit)
}

/// Bare status response with the reason phrase as body.
pub(crate) fn plain_status(status: StatusCode) -> http::Response<Bytes> {
    let reason = status.canonical_reason().unwrap_or("Error");
    let mut res = http::Response::new(Bytes::from(reason));
    *res.status_mut() = status;
    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    res
}

/// Log and record a finished request.
pub(crate) fn log_outcome(
    engine: &'static str,
    method: &Method,
    path: &str,
    remote: SocketAddr,
    start: Instant,
    outcome: Result<(u16, u64), &JoinError>,
) {
    match outcome {
        Ok((status, bytes)) => {
            tracing::debug!(
                engine,
                remote_addr = %remote,
                method = %method,
                path = %path,
                status,
                bytes,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Request served"
            );
            metrics::record_request(engine, method.as_str(), status, bytes, start);
        }
        Err(e) if e.is_panic() => {
            tracing::error!(
                engine,
                remote_addr = %remote,
                method = %method,
                path = %path,
                "Handler panicked"
            );
            metrics::record_request(engine, method.as_str(), 500, 0, start);
        }
        Err(e) => {
            tracing::error!(engine, path = %path, error = %e, "Handler task failed");
        }
    }
}
