//! Engine startup and serving errors.

use std::path::PathBuf;

use crate::config::validation::ValidationError;
use crate::net::listener::ListenerError;

/// Error type for [`Engine::start`](super::Engine::start) and the engines' `serve`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `start` was called before `set_handler`.
    #[error("no handler installed")]
    MissingHandler,

    /// The engine configuration failed validation.
    #[error("invalid engine config: {}", join(.0))]
    InvalidConfig(Vec<ValidationError>),

    /// The listener could not be bound.
    #[error(transparent)]
    Listener(#[from] ListenerError),

    /// Certificate or key could not be loaded.
    #[error("failed to load TLS material from {path:?}: {source}")]
    Tls {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// `start` was called from inside a Tokio runtime; use `serve` there.
    #[error("start called from inside a Tokio runtime")]
    NestedRuntime,

    /// The Tokio runtime could not be built.
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The server loop stopped on an I/O error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
