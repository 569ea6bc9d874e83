//! Response adapter for the streaming engine.
//!
//! The handler thread and the connection task meet over two channels:
//! a oneshot carrying the response head at commit, and a bounded mpsc
//! carrying body chunks. Writes block while the client is slow and fail
//! with `BrokenPipe` once it is gone. A body that ends without the
//! `End` marker was cut short, and the connection is aborted instead of
//! being terminated cleanly.

use std::any::Any;
use std::io::{self, Write};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::Bytes;
use hyper::body::Frame;
use tokio::sync::{mpsc, oneshot};

use crate::engine::{BoxWriter, Header, Response, ResponseError};
use crate::http::response::ResponseCore;

/// Response of the streaming engine.
pub struct StandardResponse {
    core: ResponseCore,
    head_tx: Option<oneshot::Sender<http::Response<()>>>,
    end_tx: mpsc::Sender<BodyChunk>,
}

/// Item on the response body channel.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum BodyChunk {
    Data(Bytes),
    /// The handler returned and every byte was handed over.
    End,
}

impl StandardResponse {
    pub(crate) fn new(
        head_tx: oneshot::Sender<http::Response<()>>,
        body_tx: mpsc::Sender<BodyChunk>,
    ) -> Self {
        Self {
            core: ResponseCore::new(Box::new(ChannelWriter {
                tx: body_tx.clone(),
            })),
            head_tx: Some(head_tx),
            end_tx: body_tx,
        }
    }

    /// Commit if needed, flush, and close the body stream.
    ///
    /// Returns the final status and body size.
    pub(crate) fn finish(mut self) -> (u16, u64) {
        if !self.core.committed() {
            self.write_header(200);
        }
        match self.core.finish() {
            Ok(()) => {
                // Fails only when the client is already gone.
                let _ = self.end_tx.blocking_send(BodyChunk::End);
            }
            Err(e) => tracing::debug!(error = %e, "Response flush failed"),
        }
        (self.core.status(), self.core.size())
    }
}

impl Response for StandardResponse {
    fn header(&mut self) -> &mut dyn Header {
        &mut self.core.headers
    }

    fn write_header(&mut self, code: u16) {
        if !self.core.commit(code) {
            return;
        }
        if let Some(tx) = self.head_tx.take() {
            // The connection already answered (write timeout) when this fails.
            if tx.send(self.core.head()).is_err() {
                tracing::debug!(status = self.core.status(), "Response head discarded");
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.core.committed() {
            self.write_header(200);
        }
        self.core.write(buf)
    }

    fn status(&self) -> u16 {
        self.core.status()
    }

    fn size(&self) -> u64 {
        self.core.size()
    }

    fn committed(&self) -> bool {
        self.core.committed()
    }

    fn set_writer(&mut self, writer: BoxWriter) -> Result<BoxWriter, ResponseError> {
        self.core.set_writer(writer)
    }

    fn writer(&mut self) -> &mut (dyn Write + Send) {
        self.core.writer()
    }

    fn object(&self) -> &dyn Any {
        self
    }
}

/// Blocking writer into the body channel.
struct ChannelWriter {
    tx: mpsc::Sender<BodyChunk>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(BodyChunk::Data(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client connection closed"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Response body fed by a [`ChannelWriter`].
///
/// Ends cleanly on [`BodyChunk::End`]. A channel closed without it yields
/// an error frame, which makes hyper abort the connection.
pub(crate) struct ChannelBody {
    rx: mpsc::Receiver<BodyChunk>,
    done: bool,
}

impl ChannelBody {
    pub(crate) fn new(rx: mpsc::Receiver<BodyChunk>) -> Self {
        Self { rx, done: false }
    }
}

impl hyper::body::Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        if self.done {
            return Poll::Ready(None);
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(BodyChunk::Data(data)) => Poll::Ready(Some(Ok(Frame::data(data)))),
            Some(BodyChunk::End) => {
                self.done = true;
                Poll::Ready(None)
            }
            None => {
                self.done = true;
                Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "response body cut short",
                ))))
            }
        }
    }
}
