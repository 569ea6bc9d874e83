//! Configuration schema definitions.
//!
//! This module defines the engine configuration and the file-level root
//! that wraps it. All types derive Serde traits for deserialization from
//! TOML files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration loaded from disk.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Which concrete engine to construct.
    pub engine: EngineKind,

    /// Settings handed to the engine.
    pub server: Config,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Engine configuration.
///
/// Read once when the engine starts. Empty TLS paths mean plaintext; a
/// zero timeout means no timeout.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Listen address: `host:port`, `ip:port` or `:port`.
    pub address: String,

    /// Path to the PEM certificate chain.
    pub tls_certfile: String,

    /// Path to the PEM private key.
    pub tls_keyfile: String,

    /// Limit for reading request headers and each body chunk.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,

    /// Limit for the handler to commit a response.
    #[serde(rename = "write_timeout_ms", with = "millis")]
    pub write_timeout: Duration,
}

impl Config {
    /// Whether both TLS files are configured.
    pub fn tls_enabled(&self) -> bool {
        !self.tls_certfile.is_empty() && !self.tls_keyfile.is_empty()
    }

    /// Address in a form `TcpListener::bind` accepts (`:8080` → `0.0.0.0:8080`).
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            tls_certfile: String::new(),
            tls_keyfile: String::new(),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
        }
    }
}

/// Concrete engine selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// hyper connection loop with streamed bodies.
    #[default]
    Standard,
    /// axum stack with buffered bodies.
    Buffered,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Standard => write!(f, "standard"),
            EngineKind::Buffered => write!(f, "buffered"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or an `EnvFilter` directive.
    pub log_level: String,

    /// Log line format: `pretty` or `json`.
    pub log_format: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// `Duration` as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
