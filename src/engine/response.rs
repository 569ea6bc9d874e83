//! Response role.
//!
//! # Responsibilities
//! - Own outgoing headers until commit
//! - Commit the status line once
//! - Count body bytes and expose the output stream
//!
//! # Design Decisions
//! - `write` writes the whole buffer or fails; `size()` never counts a failed write
//! - The output stream can be swapped only before the first `write`

use std::any::Any;
use std::io::{self, Write};

use super::header::Header;

/// Boxed output stream.
pub type BoxWriter = Box<dyn Write + Send>;

/// Error type for output stream substitution.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The body has already been written to.
    #[error("response writer already in use, cannot substitute after writing")]
    WriterInUse,
}

/// Outbound response contract.
pub trait Response: Send {
    /// Outgoing headers.
    fn header(&mut self) -> &mut dyn Header;

    /// Commit the status line and headers. Later calls are logged and ignored.
    fn write_header(&mut self, code: u16);

    /// Append `buf` to the body, committing a 200 first if needed.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Committed status, or 200 while uncommitted.
    fn status(&self) -> u16;

    /// Body bytes written through [`Response::write`].
    fn size(&self) -> u64;

    /// Whether the status line and headers are fixed.
    fn committed(&self) -> bool;

    /// Substitute the output stream, returning the previous one.
    fn set_writer(&mut self, writer: BoxWriter) -> Result<BoxWriter, ResponseError>;

    /// Current output stream.
    fn writer(&mut self) -> &mut (dyn Write + Send);

    /// The engine's concrete response.
    fn object(&self) -> &dyn Any;
}

impl dyn Response + '_ {
    /// Replace the output stream with one built around the current stream.
    ///
    /// ```rust,ignore
    /// res.wrap_writer(|inner| Box::new(std::io::BufWriter::new(inner)))?;
    /// ```
    pub fn wrap_writer<F>(&mut self, wrap: F) -> Result<(), ResponseError>
    where
        F: FnOnce(BoxWriter) -> BoxWriter,
    {
        let previous = self.set_writer(Box::new(io::sink()))?;
        self.set_writer(wrap(previous))?;
        Ok(())
    }
}
