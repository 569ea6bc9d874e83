//! Request adapter for the streaming engine.

use std::any::Any;
use std::net::SocketAddr;

use http::request::Parts;

use super::url::UriUrl;
use crate::engine::{Body, Header, Request, Url};
use crate::http::request::{host_of, FormValues, StreamingBody};

/// One inbound request on the streaming engine.
///
/// `object()` yields the request head (`http::request::Parts`) as
/// received; path rewrites through `url_mut()` do not touch it.
#[derive(Debug)]
pub struct StandardRequest {
    parts: Parts,
    url: UriUrl,
    uri: String,
    host: String,
    remote_addr: SocketAddr,
    tls: bool,
    body: StreamingBody,
    form: Option<FormValues>,
}

impl StandardRequest {
    pub(crate) fn new(parts: Parts, body: StreamingBody, remote_addr: SocketAddr, tls: bool) -> Self {
        Self {
            url: UriUrl::new(parts.uri.clone()),
            uri: parts.uri.to_string(),
            host: host_of(&parts),
            parts,
            remote_addr,
            tls,
            body,
            form: None,
        }
    }
}

impl Request for StandardRequest {
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
                self.url.uri().query(),
            )
        });
        form.get(name)
    }

    fn object(&self) -> &dyn Any {
        &self.parts
    }
}
