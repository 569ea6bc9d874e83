//! Request role.
//!
//! # Responsibilities
//! - Describe the inbound request (transport, target, headers, method)
//! - Hand out the body as a closable byte stream
//! - Decode form values from the body or the query string
//!
//! # Design Decisions
//! - Reading a body after exhaustion or `close()` yields `Ok(0)`
//! - Dropping the request releases the body, so early returns never leak it

use std::any::Any;
use std::io::Read;

use super::header::Header;
use super::url::Url;

/// Request body stream.
pub trait Body: Read + Send {
    /// Release the stream. Later reads return `Ok(0)`. Idempotent.
    fn close(&mut self) -> std::io::Result<()>;
}

/// Read-mostly view over one inbound request.
pub trait Request: Send {
    /// Whether the connection is encrypted.
    fn tls(&self) -> bool;

    /// `"https"` when [`Request::tls`] is true, `"http"` otherwise.
    fn scheme(&self) -> &str {
        if self.tls() {
            "https"
        } else {
            "http"
        }
    }

    /// Target host, from the `Host` header or the URI authority.
    fn host(&self) -> &str;

    /// Raw request-target as received.
    fn uri(&self) -> &str;

    /// Parsed target URL.
    fn url(&self) -> &dyn Url;

    /// Parsed target URL, for routers that rewrite the path.
    fn url_mut(&mut self) -> &mut dyn Url;

    /// Request headers.
    fn header(&self) -> &dyn Header;

    /// Request headers, for middleware that rewrites them.
    fn header_mut(&mut self) -> &mut dyn Header;

    /// Peer address as `ip:port`.
    fn remote_address(&self) -> String;

    /// HTTP method token.
    fn method(&self) -> &str;

    /// Body stream, positioned wherever earlier reads left it.
    fn body(&mut self) -> &mut dyn Body;

    /// Decoded form field from the body or the query, or `""` when absent.
    fn form_value(&mut self, name: &str) -> String;

    /// The native request value.
    fn object(&self) -> &dyn Any;
}
