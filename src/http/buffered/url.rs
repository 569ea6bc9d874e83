//! URL view over `url::Url`.

use std::any::Any;

use http::uri::PathAndQuery;

use crate::engine::url::{first_query_value, rooted};
use crate::engine::{Url, UrlError};

const FALLBACK_BASE: &str = "http://localhost/";

/// Request URL of the buffered engine.
///
/// `path()` and `query_value()` read the target exactly as received.
/// `object()` yields the absolute `url::Url`, whose path is normalized.
#[derive(Debug, Clone)]
pub struct ParsedUrl {
    url: url::Url,
    path: String,
    query: Option<String>,
}

impl ParsedUrl {
    /// Build an absolute URL from the transport scheme, the host and the target.
    ///
    /// A host that does not parse falls back to `localhost`.
    pub fn from_target(
        scheme: &str,
        host: &str,
        path: &str,
        query: Option<&str>,
    ) -> Result<Self, url::ParseError> {
        let mut url = url::Url::parse(&format!("{scheme}://{host}/"))
            .or_else(|_| url::Url::parse(FALLBACK_BASE))?;
        url.set_path(path);
        url.set_query(query);
        Ok(Self {
            url,
            path: path.to_string(),
            query: query.map(str::to_string),
        })
    }

    pub fn as_url(&self) -> &url::Url {
        &self.url
    }

    /// Raw query string as received.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }
}

impl Url for ParsedUrl {
    fn path(&self) -> &str {
        &self.path
    }

    fn set_path(&mut self, path: &str) -> Result<(), UrlError> {
        let path = rooted(path);
        if self.url.cannot_be_a_base() || PathAndQuery::try_from(path.as_ref()).is_err() {
            return Err(UrlError::InvalidPath(path.to_string()));
        }
        self.url.set_path(&path);
        self.path = path.into_owned();
        Ok(())
    }

    fn query_value(&self, key: &str) -> String {
        first_query_value(self.query(), key)
    }

    fn object(&self) -> &dyn Any {
        &self.url
    }
}
