//! In-process testing utilities for handlers.
//!
//! Runs a handler against an in-memory request and records what it wrote,
//! without binding a socket.
//!
//! ```rust,ignore
//! use http_engine::engine::handler_fn;
//! use http_engine::testing::{record, TestRequest};
//!
//! let hello = handler_fn(|_req, res| {
//!     res.write_header(201);
//!     let _ = res.write(b"ok");
//! });
//! let out = record(&hello, TestRequest::get("/"));
//! assert_eq!(out.status, 201);
//! assert_eq!(out.body, b"ok");
//! ```

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::engine::{Handler, Request, Response};
use crate::http::{BufferedRequest, BufferedResponse};
use crate::observability::Logger;

/// Request fed to a handler under test.
#[must_use]
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
    remote: SocketAddr,
    tls: bool,
}

impl TestRequest {
    /// Creates a request with `method` and `uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            method,
            uri: uri.as_ref().to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote: SocketAddr::from(([127, 0, 0, 1], 40000)),
            tls: false,
        }
    }

    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Appends a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = HeaderName::try_from(name.as_ref()).expect("valid header name");
        let value = HeaderValue::try_from(value.as_ref()).expect("valid header value");
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a urlencoded form body and its Content-Type.
    pub fn form(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        self.header("content-type", "application/x-www-form-urlencoded")
            .body(encoded)
    }

    /// Sets the peer address.
    pub fn remote(mut self, addr: SocketAddr) -> Self {
        self.remote = addr;
        self
    }

    /// Marks the request as received over TLS.
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Builds the engine request.
    pub fn build(self) -> BufferedRequest {
        let mut builder = http::Request::builder().method(self.method).uri(self.uri.as_str());
        if let Some(headers) = builder.headers_mut() {
            *headers = self.headers;
        }
        let (parts, ()) = builder.body(()).expect("valid request").into_parts();
        BufferedRequest::new(parts, self.body, self.remote, self.tls).expect("valid request target")
    }
}

/// What a handler left behind.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    /// Final status (200 when the handler never committed).
    pub status: u16,
    /// Headers as committed.
    pub headers: HeaderMap,
    /// Bytes that reached the output stream.
    pub body: Vec<u8>,
    /// Bytes counted by `Response::size`.
    pub size: u64,
    /// Whether the handler itself committed the response.
    pub committed: bool,
}

impl RecordedResponse {
    /// Body as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First value of header `name`, or `""`.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// Run `handler` on `request` and record the outcome.
pub fn record<H: Handler + ?Sized>(handler: &H, request: TestRequest) -> RecordedResponse {
    record_fn(|req, res| handler.serve_http(req, res), request)
}

/// Run a closure as a handler and record the outcome.
pub fn record_fn<F>(f: F, request: TestRequest) -> RecordedResponse
where
    F: FnOnce(&mut dyn Request, &mut dyn Response),
{
    let mut req = request.build();
    let mut res = BufferedResponse::new();
    f(&mut req, &mut res);
    let committed = res.committed();
    let (response, size) = res.into_http();
    let (parts, body) = response.into_parts();
    RecordedResponse {
        status: parts.status.as_u16(),
        headers: parts.headers,
        body: body.to_vec(),
        size,
        committed,
    }
}

/// Log sink for asserting on engine and handler events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .expect("log buffer lock")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger writing plain-text events at TRACE and above into this sink.
    pub fn logger(&self) -> Logger {
        let buf = Arc::clone(&self.buf);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || CaptureWriter(Arc::clone(&buf)))
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .finish();
        Logger::new(subscriber)
    }

    /// Everything logged so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().expect("log buffer lock")).into_owned()
    }
}
