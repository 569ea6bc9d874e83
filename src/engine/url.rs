//! URL role.

use std::any::Any;

/// Error type for URL mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UrlError {
    /// The path cannot be represented in the native URL type.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
}

/// Capability surface over the request target.
pub trait Url: Send {
    /// Current path component.
    fn path(&self) -> &str;

    /// Rewrite the path, keeping the query string.
    fn set_path(&mut self, path: &str) -> Result<(), UrlError>;

    /// First decoded value of query parameter `key`, or `""` when absent.
    fn query_value(&self, key: &str) -> String;

    /// The native URL value.
    fn object(&self) -> &dyn Any;
}

/// First value for `key` in an `application/x-www-form-urlencoded` string.
pub(crate) fn first_query_value(query: Option<&str>, key: &str) -> String {
    query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_default()
}

/// Make sure a path is rooted.
pub(crate) fn rooted(path: &str) -> std::borrow::Cow<'_, str> {
    if path.starts_with('/') || path == "*" {
        path.into()
    } else {
        format!("/{path}").into()
    }
}
