//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept)
//!     → tls.rs (optional TLS material, loaded once at startup)
//!     → connection.rs (lifecycle tracking for drain)
//!     → Hand off to an engine in crate::http
//! ```
//!
//! # Design Decisions
//! - Each connection tracked for graceful shutdown
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;
