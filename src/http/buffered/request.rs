//! Request adapter for the buffered engine.

use std::any::Any;
use std::net::SocketAddr;

use bytes::Bytes;
use http::request::Parts;

use super::url::ParsedUrl;
use crate::engine::{Body, Header, Request, Url};
use crate::http::request::{host_of, BufferedBody, FormValues};

/// One inbound request on the buffered engine, body already in memory.
///
/// `object()` yields the request head (`http::request::Parts`).
#[derive(Debug)]
pub struct BufferedRequest {
    parts: Parts,
    url: ParsedUrl,
    uri: String,
    host: String,
    remote_addr: SocketAddr,
    tls: bool,
    body: BufferedBody,
    form: Option<FormValues>,
}

impl BufferedRequest {
    pub fn new(
        parts: Parts,
        body: Bytes,
        remote_addr: SocketAddr,
        tls: bool,
    ) -> Result<Self, url::ParseError> {
        let host = host_of(&parts);
        let scheme = if tls { "https" } else { "http" };
        let url = ParsedUrl::from_target(scheme, &host, parts.uri.path(), parts.uri.query())?;
        Ok(Self {
            uri: parts.uri.to_string(),
            url,
            host,
            parts,
            remote_addr,
            tls,
            body: BufferedBody::new(body),
            form: None,
        })
    }
}

impl Request for BufferedRequest {
    fn tls(&self) -> bool {
        self.tls
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn url(&self) -> &dyn Url {
        &self.url
    }

    fn url_mut(&mut self) -> &mut dyn Url {
        &mut self.url
    }

    fn header(&self) -> &dyn Header {
        &self.parts.headers
    }

    fn header_mut(&mut self) -> &mut dyn Header {
        &mut self.parts.headers
    }

    fn remote_address(&self) -> String {
        self.remote_addr.to_string()
    }

    fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    fn body(&mut self) -> &mut dyn Body {
        &mut self.body
    }

    fn form_value(&mut self, name: &str) -> String {
        let form = self.form.get_or_insert_with(|| {
            let content_type = Header::get(&self.parts.headers, "content-type");
            FormValues::load(
                self.parts.method.as_str(),
                content_type,
                &mut self.body,
                self.url.query(),
            )
        });
        form.get(name)
    }

    fn object(&self) -> &dyn Any {
        &self.parts
    }
}
