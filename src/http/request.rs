//! Request pieces shared by the engines.
//!
//! # Responsibilities
//! - Body streams: channel-fed for streaming, in-memory for buffering
//! - Pump a hyper body into the channel under the read timeout
//! - Decode `application/x-www-form-urlencoded` forms
//!
//! # Design Decisions
//! - Reads after exhaustion or `close()` return `Ok(0)`
//! - A read timeout surfaces as `io::ErrorKind::TimedOut` on the handler side
//! - Form bodies are capped at `MAX_FORM_BYTES`; the rest is left unread

use std::io::{self, Read};
use std::time::Duration;

use bytes::{Buf, Bytes};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tokio::sync::mpsc;

use crate::engine::Body;

/// Largest form body decoded by `form_value`.
pub const MAX_FORM_BYTES: u64 = 10 << 20;

/// Chunks buffered between the connection task and the handler thread.
pub(crate) const BODY_CHANNEL_CAPACITY: usize = 16;

/// Request body fed chunk by chunk from the connection task.
///
/// Reads block the calling thread, so handlers must run off the async
/// workers (engines use the blocking pool).
#[derive(Debug)]
pub struct StreamingBody {
    rx: Option<mpsc::Receiver<io::Result<Bytes>>>,
    chunk: Bytes,
}

impl StreamingBody {
    pub(crate) fn new(rx: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self {
            rx: Some(rx),
            chunk: Bytes::new(),
        }
    }
}

impl Read for StreamingBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.chunk.is_empty() {
            let Some(rx) = self.rx.as_mut() else {
                return Ok(0);
            };
            match rx.blocking_recv() {
                Some(Ok(chunk)) => self.chunk = chunk,
                Some(Err(e)) => {
                    self.rx = None;
                    return Err(e);
                }
                None => {
                    self.rx = None;
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk.advance(n);
        Ok(n)
    }
}

impl Body for StreamingBody {
    fn close(&mut self) -> io::Result<()> {
        // Dropping the receiver stops the pump on its next send.
        self.rx = None;
        self.chunk.clear();
        Ok(())
    }
}

/// Forward `body` into `tx` until it ends, fails, or the reader goes away.
pub(crate) async fn pump_body(
    mut body: Incoming,
    tx: mpsc::Sender<io::Result<Bytes>>,
    read_timeout: Option<Duration>,
) {
    loop {
        let next = match read_timeout {
            Some(limit) => match tokio::time::timeout(limit, body.frame()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::debug!(timeout = ?limit, "Request body read timed out");
                    let _ = tx
                        .send(Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "request body read timed out",
                        )))
                        .await;
                    return;
                }
            },
            None => body.frame().await,
        };

        match next {
            None => return,
            Some(Ok(frame)) => {
                let Ok(data) = frame.into_data() else {
                    continue;
                };
                if data.is_empty() {
                    continue;
                }
                if tx.send(Ok(data)).await.is_err() {
                    return;
                }
            }
            Some(Err(e)) => {
                let _ = tx.send(Err(io::Error::other(e))).await;
                return;
            }
        }
    }
}

/// Request body held entirely in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferedBody {
    data: Bytes,
}

impl BufferedBody {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl Read for BufferedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data.advance(n);
        Ok(n)
    }
}

impl Body for BufferedBody {
    fn close(&mut self) -> io::Result<()> {
        self.data.clear();
        Ok(())
    }
}

/// Target host from the `Host` header, falling back to the URI authority.
pub(crate) fn host_of(parts: &http::request::Parts) -> String {
    parts
        .headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Decoded form fields, body values ahead of query values.
#[derive(Debug, Default)]
pub(crate) struct FormValues(Vec<(String, String)>);

impl FormValues {
    /// Decode the form for one request. Consumes the body when it carries the form.
    pub(crate) fn load(
        method: &str,
        content_type: &str,
        body: &mut dyn Body,
        query: Option<&str>,
    ) -> Self {
        let mut pairs = Vec::new();

        if matches!(method, "POST" | "PUT" | "PATCH") && is_urlencoded(content_type) {
            let mut raw = Vec::new();
            match Read::take(&mut *body, MAX_FORM_BYTES).read_to_end(&mut raw) {
                Ok(_) => pairs.extend(url::form_urlencoded::parse(&raw).into_owned()),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read form body, using query values only");
                }
            }
        }

        if let Some(query) = query {
            pairs.extend(url::form_urlencoded::parse(query.as_bytes()).into_owned());
        }

        Self(pairs)
    }

    pub(crate) fn get(&self, name: &str) -> String {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }
}

fn is_urlencoded(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|mime| mime.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}
