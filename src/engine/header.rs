//! Header role.
//!
//! `http::HeaderMap` is the native header type of both engines, so it
//! implements [`Header`] directly. Outgoing headers go through
//! [`ResponseHeaders`], which refuses mutation once the response is
//! committed.

use std::any::Any;

use http::header::{HeaderMap, HeaderName, HeaderValue};

/// Error type for header mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The key is not a valid HTTP field name.
    #[error("invalid header name: {0:?}")]
    InvalidName(String),
    /// The value contains bytes not allowed in a field value.
    #[error("invalid value for header {0:?}")]
    InvalidValue(String),
    /// Status line and headers were already sent.
    #[error("response already committed, header change dropped")]
    Committed,
}

/// Capability surface over one message's header fields.
///
/// Keys are matched case-insensitively.
pub trait Header: Send {
    /// Append a value, keeping existing values for `key`.
    fn add(&mut self, key: &str, value: &str) -> Result<(), HeaderError>;

    /// Replace every value for `key` with `value`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), HeaderError>;

    /// Remove every value for `key`. A no-op when absent.
    fn del(&mut self, key: &str);

    /// First value for `key`, or `""` when absent or not valid UTF-8.
    fn get(&self, key: &str) -> &str;

    /// Every value for `key` in insertion order.
    fn get_all(&self, key: &str) -> Vec<&str>;

    /// The native header value.
    fn object(&self) -> &dyn Any;
}

fn parse_pair(key: &str, value: &str) -> Result<(HeaderName, HeaderValue), HeaderError> {
    let name = HeaderName::from_bytes(key.as_bytes())
        .map_err(|_| HeaderError::InvalidName(key.to_string()))?;
    let value =
        HeaderValue::from_str(value).map_err(|_| HeaderError::InvalidValue(key.to_string()))?;
    Ok((name, value))
}

impl Header for HeaderMap {
    fn add(&mut self, key: &str, value: &str) -> Result<(), HeaderError> {
        let (name, value) = parse_pair(key, value)?;
        self.append(name, value);
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HeaderError> {
        let (name, value) = parse_pair(key, value)?;
        self.insert(name, value);
        Ok(())
    }

    fn del(&mut self, key: &str) {
        // Invalid names cannot be present, remove() just returns None.
        self.remove(key);
    }

    fn get(&self, key: &str) -> &str {
        HeaderMap::get(self, key)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    fn get_all(&self, key: &str) -> Vec<&str> {
        HeaderMap::get_all(self, key)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    fn object(&self) -> &dyn Any {
        self
    }
}

/// Outgoing headers of a response.
///
/// Mutable until [`ResponseHeaders::commit`] is called by the owning
/// response; afterwards `add`, `set` and `del` leave the map untouched.
#[derive(Debug, Default)]
pub struct ResponseHeaders {
    map: HeaderMap,
    committed: bool,
}

impl ResponseHeaders {
    /// Create an empty, uncommitted header set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze the headers.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    /// Whether the headers are frozen.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Borrow the underlying map.
    pub fn map(&self) -> &HeaderMap {
        &self.map
    }

    fn guard(&self) -> Result<(), HeaderError> {
        if self.committed {
            tracing::warn!("Header mutation after response commit ignored");
            return Err(HeaderError::Committed);
        }
        Ok(())
    }
}

impl Header for ResponseHeaders {
    fn add(&mut self, key: &str, value: &str) -> Result<(), HeaderError> {
        self.guard()?;
        self.map.add(key, value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HeaderError> {
        self.guard()?;
        Header::set(&mut self.map, key, value)
    }

    fn del(&mut self, key: &str) {
        if self.guard().is_ok() {
            self.map.del(key);
        }
    }

    fn get(&self, key: &str) -> &str {
        Header::get(&self.map, key)
    }

    fn get_all(&self, key: &str) -> Vec<&str> {
        Header::get_all(&self.map, key)
    }

    fn object(&self) -> &dyn Any {
        &self.map
    }
}
