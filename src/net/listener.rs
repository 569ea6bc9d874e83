//! TCP listener implementation.
//!
//! # Responsibilities
//! - Bind to the configured address (including the `:port` form)
//! - Accept incoming TCP connections
//! - Graceful handling of accept errors

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// A bound TCP listener for an engine.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the configured address.
    pub async fn bind(config: &Config) -> Result<Self, ListenerError> {
        let address = config.bind_address();
        let bind_err = |source| ListenerError::Bind {
            address: address.clone(),
            source,
        };

        let inner = TcpListener::bind(address.as_str()).await.map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::info!(address = %local_addr, tls = config.tls_enabled(), "Listener bound");

        Ok(Self { inner, local_addr })
    }

    /// Wrap an already bound Tokio listener.
    pub fn from_tokio(inner: TcpListener) -> Result<Self, ListenerError> {
        let local_addr = inner.local_addr().map_err(|source| ListenerError::Bind {
            address: "<pre-bound>".to_string(),
            source,
        })?;
        Ok(Self { inner, local_addr })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer_addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }
        tracing::trace!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Give up the wrapper for APIs that take a Tokio listener.
    pub fn into_inner(self) -> TcpListener {
        self.inner
    }
}
