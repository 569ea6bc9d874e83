//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig { engine, server: Config, observability }
//!     → Config moved into the chosen engine
//! ```
//!
//! # Design Decisions
//! - Config is immutable once handed to an engine
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{Config, EngineKind, ObservabilityConfig, ServerConfig};
