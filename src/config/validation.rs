//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the listen address has a usable port
//! - Check TLS certificate and key are configured together
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: files are only opened when the engine starts

use std::net::SocketAddr;

use crate::config::schema::{Config, ServerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// `address` is empty.
    #[error("address must not be empty")]
    EmptyAddress,
    /// `address` has no numeric port.
    #[error("address {0:?} must end in :<port>")]
    InvalidAddress(String),
    /// Only one of the two TLS paths is set.
    #[error("tls_certfile and tls_keyfile must be set together")]
    IncompleteTls,
    /// Unknown log format.
    #[error("log_format {0:?} must be \"pretty\" or \"json\"")]
    InvalidLogFormat(String),
    /// Metrics endpoint address does not parse.
    #[error("metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate the settings an engine consumes.
pub fn validate_engine_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.address.is_empty() {
        errors.push(ValidationError::EmptyAddress);
    } else {
        let port = config.address.rsplit_once(':').map(|(_, port)| port);
        if !matches!(port, Some(p) if p.parse::<u16>().is_ok()) {
            errors.push(ValidationError::InvalidAddress(config.address.clone()));
        }
    }

    if config.tls_certfile.is_empty() != config.tls_keyfile.is_empty() {
        errors.push(ValidationError::IncompleteTls);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a whole configuration file.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = validate_engine_config(&config.server).err().unwrap_or_default();

    let obs = &config.observability;
    if !matches!(obs.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::InvalidLogFormat(obs.log_format.clone()));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            obs.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
