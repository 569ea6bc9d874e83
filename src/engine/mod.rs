//! Engine contract.
//!
//! # Data Flow
//! ```text
//! Config ──▶ concrete Engine (StandardEngine | BufferedEngine)
//!                 │ set_handler(Arc<dyn Handler>)
//!                 │ set_logger(Logger)
//!                 ▼
//!              start()
//!                 │ accept loop (engine-owned)
//!                 ▼
//!     per request: (&mut dyn Request, &mut dyn Response)
//!                 ▼
//!          Handler::serve_http
//! ```
//!
//! # Design Decisions
//! - Roles are object-safe traits; engines hand out `&mut dyn` views
//! - Absence (missing header, query or form value) is an empty string
//! - `Response::write` is the only per-request error channel
//! - `object()` returns `&dyn Any` for engine-specific interop

pub mod error;
pub mod handler;
pub mod header;
pub mod request;
pub mod response;
pub mod url;

use std::sync::Arc;

use crate::observability::logging::Logger;

pub use error::EngineError;
pub use handler::{handler_fn, Handler, HandlerFunc};
pub use header::{Header, HeaderError, ResponseHeaders};
pub use request::{Body, Request};
pub use response::{BoxWriter, Response, ResponseError};
pub use self::url::{Url, UrlError};

/// Server lifecycle controller.
///
/// Concrete engines own the accept loop and connection handling. Callers
/// compose routers and middleware behind the single root handler.
pub trait Engine: Send {
    /// Install the root handler invoked for every request.
    fn set_handler(&mut self, handler: Arc<dyn Handler>);

    /// Install the logger used for the engine's operational logging.
    fn set_logger(&mut self, logger: Logger);

    /// Bind the configured address and serve until the process is asked to stop.
    ///
    /// Blocks the calling thread. Returns [`EngineError::NestedRuntime`] when
    /// called from inside a Tokio runtime.
    fn start(&mut self) -> Result<(), EngineError>;
}
