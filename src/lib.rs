//! Pluggable HTTP engine layer.
//!
//! Application code depends only on the role traits in [`engine`]:
//! [`Request`], [`Response`], [`Header`], [`Url`] and [`Handler`]. The
//! concrete engines in [`http`] adapt two server stacks to those roles:
//!
//! - [`StandardEngine`]: hyper HTTP/1.1, bodies streamed in both directions
//! - [`BufferedEngine`]: axum, bodies held in memory, HTTP/2 over TLS
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use http_engine::{handler_fn, Config, Engine, StandardEngine};
//!
//! let mut engine = StandardEngine::new(Config { address: ":8080".into(), ..Config::default() });
//! engine.set_handler(Arc::new(handler_fn(|_req, res| {
//!     let _ = res.write(b"hello");
//! })));
//! engine.start()?;
//! ```

// Contract
pub mod engine;

// Implementations
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

// Test support
pub mod testing;

pub use config::{Config, EngineKind, ServerConfig};
pub use engine::{
    handler_fn, Body, Engine, EngineError, Handler, HandlerFunc, Header, Request, Response, Url,
};
pub use crate::http::{new_engine, BufferedEngine, StandardEngine};
pub use lifecycle::Shutdown;
pub use observability::Logger;
