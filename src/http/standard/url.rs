//! URL view over `http::Uri`.

use std::any::Any;

use http::uri::{PathAndQuery, Uri};

use crate::engine::url::{first_query_value, rooted};
use crate::engine::{Url, UrlError};

/// Request URL of the streaming engine.
#[derive(Debug, Clone)]
pub struct UriUrl {
    uri: Uri,
}

impl UriUrl {
    pub fn new(uri: Uri) -> Self {
        Self { uri }
    }

    /// The URI including any path rewrite.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

impl Url for UriUrl {
    fn path(&self) -> &str {
        self.uri.path()
    }

    fn set_path(&mut self, path: &str) -> Result<(), UrlError> {
        let path = rooted(path);
        let invalid = || UrlError::InvalidPath(path.to_string());

        let target = match self.uri.query() {
            Some(query) => format!("{path}?{query}"),
            None => path.to_string(),
        };
        let path_and_query = PathAndQuery::try_from(target).map_err(|_| invalid())?;

        let mut parts = self.uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query);
        self.uri = Uri::from_parts(parts).map_err(|_| invalid())?;
        Ok(())
    }

    fn query_value(&self, key: &str) -> String {
        first_query_value(self.uri.query(), key)
    }

    fn object(&self) -> &dyn Any {
        &self.uri
    }
}
