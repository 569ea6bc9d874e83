//! Response adapter for the buffered engine.

use std::any::Any;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use crate::engine::{BoxWriter, Header, Response, ResponseError};
use crate::http::response::ResponseCore;

/// Response assembled in memory and sent when the handler returns.
pub struct BufferedResponse {
    core: ResponseCore,
    buffer: SharedBuffer,
}

/// Body buffer reachable both through the output stream and the response.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BufferedResponse {
    pub fn new() -> Self {
        let buffer = SharedBuffer::default();
        Self {
            core: ResponseCore::new(Box::new(buffer.clone())),
            buffer,
        }
    }

    /// Commit if needed, flush, and assemble the outgoing response.
    ///
    /// Returns the response and the byte count seen by [`Response::write`].
    pub fn into_http(mut self) -> (http::Response<Bytes>, u64) {
        if !self.core.committed() {
            self.write_header(200);
        }
        if let Err(e) = self.core.finish() {
            tracing::warn!(error = %e, "Response flush failed");
        }
        let body = Bytes::from(self.buffer.take());
        let size = self.core.size();
        (self.core.head().map(|()| body), size)
    }
}

impl Default for BufferedResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl Response for BufferedResponse {
    fn header(&mut self) -> &mut dyn Header {
        &mut self.core.headers
    }

    fn write_header(&mut self, code: u16) {
        self.core.commit(code);
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.core.committed() {
            self.core.commit(200);
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
