//! Startup orchestration.
//!
//! # Responsibilities
//! - Check the handler and configuration before anything is bound
//! - Build the runtime that backs a blocking `Engine::start`
//! - Run the serve future under the engine's logger
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned, never retried
//! - Handlers still running once serving ends are abandoned after
//!   `HANDLER_GRACE`; their threads are not joined

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument::WithSubscriber;

use crate::config::validation::validate_engine_config;
use crate::config::Config;
use crate::engine::{EngineError, Handler};
use crate::observability::Logger;

/// Checks shared by every engine before it binds.
pub fn preflight(
    config: &Config,
    handler: Option<&Arc<dyn Handler>>,
) -> Result<Arc<dyn Handler>, EngineError> {
    let handler = handler.cloned().ok_or(EngineError::MissingHandler)?;
    validate_engine_config(config).map_err(EngineError::InvalidConfig)?;
    Ok(handler)
}

/// How long a finished serve future waits for blocking handler threads.
pub const HANDLER_GRACE: Duration = Duration::from_secs(2);

/// Run `serve` to completion on a fresh multi-thread runtime.
///
/// Fails with [`EngineError::NestedRuntime`] when called from inside a
/// Tokio runtime.
pub fn block_on<F>(logger: &Logger, serve: F) -> Result<(), EngineError>
where
    F: Future<Output = Result<(), EngineError>>,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(EngineError::NestedRuntime);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(EngineError::Runtime)?;

    let result = runtime.block_on(serve.with_subscriber(logger.dispatch().clone()));
    runtime.shutdown_timeout(HANDLER_GRACE);
    result
}
