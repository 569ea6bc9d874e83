//! Response state shared by the engines.
//!
//! # Responsibilities
//! - Hold outgoing headers, status and byte count
//! - Enforce single commit and freeze headers on commit
//! - Own the substitutable output stream
//!
//! # Design Decisions
//! - Invalid status codes are logged and committed as 500
//! - Engines layer their own commit side effects on top (sending the head)

use std::io::{self, Write};

use http::StatusCode;

use crate::engine::{BoxWriter, ResponseError, ResponseHeaders};

/// Commit/write bookkeeping behind both engines' responses.
pub(crate) struct ResponseCore {
    pub(crate) headers: ResponseHeaders,
    status: StatusCode,
    size: u64,
    writing: bool,
    writer: BoxWriter,
}

impl ResponseCore {
    pub(crate) fn new(writer: BoxWriter) -> Self {
        Self {
            headers: ResponseHeaders::new(),
            status: StatusCode::OK,
            size: 0,
            writing: false,
            writer,
        }
    }

    /// Fix status and headers. Returns `false` when already committed.
    pub(crate) fn commit(&mut self, code: u16) -> bool {
        if self.headers.is_committed() {
            tracing::warn!(
                status = self.status.as_u16(),
                attempted = code,
                "Response already committed"
            );
            return false;
        }
        self.status = StatusCode::from_u16(code).unwrap_or_else(|_| {
            tracing::error!(status = code, "Invalid status code, sending 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });
        self.headers.commit();
        true
    }

    /// Write through the output stream. The caller commits first.
    pub(crate) fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writing = true;
        self.writer.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(buf.len())
    }

    pub(crate) fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub(crate) fn size(&self) -> u64 {
        self.size
    }

    pub(crate) fn committed(&self) -> bool {
        self.headers.is_committed()
    }

    pub(crate) fn set_writer(&mut self, writer: BoxWriter) -> Result<BoxWriter, ResponseError> {
        if self.writing {
            return Err(ResponseError::WriterInUse);
        }
        Ok(std::mem::replace(&mut self.writer, writer))
    }

    pub(crate) fn writer(&mut self) -> &mut (dyn Write + Send) {
        self.writer.as_mut()
    }

    /// Status line and headers as committed.
    pub(crate) fn head(&self) -> http::Response<()> {
        let mut head = http::Response::new(());
        *head.status_mut() = self.status;
        *head.headers_mut() = self.headers.map().clone();
        head
    }

    /// Flush and release the output stream.
    ///
    /// Dropping matters: wrapping writers emit trailers and the engine's
    /// channel writer closes the body stream.
    pub(crate) fn finish(&mut self) -> io::Result<()> {
        let flushed = self.writer.flush();
        drop(std::mem::replace(&mut self.writer, Box::new(io::sink())));
        flushed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::engine::Header;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn second_commit_is_ignored() {
        let mut core = ResponseCore::new(Box::new(io::sink()));
        assert!(core.commit(404));
        assert!(!core.commit(200));
        assert_eq!(core.status(), 404);
    }

    #[test]
    fn invalid_status_becomes_500() {
        let mut core = ResponseCore::new(Box::new(io::sink()));
        assert!(core.commit(42));
        assert_eq!(core.status(), 500);
    }

    #[test]
    fn commit_freezes_headers() {
        let mut core = ResponseCore::new(Box::new(io::sink()));
        core.headers.set("X-Before", "1").unwrap();
        core.commit(200);
        assert!(core.headers.set("X-After", "1").is_err());
        let head = core.head();
        assert_eq!(head.headers()["x-before"], "1");
        assert!(head.headers().get("x-after").is_none());
    }

    #[test]
    fn writer_swap_refused_after_write() {
        let sink = Shared::default();
        let mut core = ResponseCore::new(Box::new(io::sink()));
        assert!(core.set_writer(Box::new(sink.clone())).is_ok());
        core.commit(200);
        core.write(b"abc").unwrap();
        assert_eq!(core.size(), 3);
        assert!(matches!(
            core.set_writer(Box::new(io::sink())),
            Err(ResponseError::WriterInUse)
        ));
        assert_eq!(sink.0.lock().unwrap().as_slice(), b"abc");
    }

    #[test]
    fn failed_write_does_not_count() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut core = ResponseCore::new(Box::new(Broken));
        core.commit(200);
        assert!(core.write(b"lost").is_err());
        assert_eq!(core.size(), 0);
    }
}
