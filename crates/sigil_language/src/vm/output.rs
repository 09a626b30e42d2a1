//! Script output sink.

use std::fmt;
use std::io::{self, Write};

/// Where `echo` and built-ins write.
pub enum Output {
    /// Collects output in memory.
    Buffer(Vec<u8>),
    /// Streams output to a writer.
    Writer(Box<dyn Write>),
}

impl Default for Output {
    fn default() -> Self {
        Self::Buffer(Vec::new())
    }
}

impl Output {
    /// Creates an in-memory buffer.
    #[must_use]
    pub fn buffer() -> Self {
        Self::default()
    }

    /// Creates a sink writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::Writer(Box::new(io::stdout()))
    }

    /// Returns the buffered bytes, or `None` for a writer.
    #[must_use]
    pub fn contents(&self) -> Option<&[u8]> {
        match self {
            Self::Buffer(buf) => Some(buf),
            Self::Writer(_) => None,
        }
    }

    /// Takes the buffered bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        match self {
            Self::Buffer(buf) => std::mem::take(buf),
            Self::Writer(_) => Vec::new(),
        }
    }
}

impl Write for Output {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        match self {
            Self::Buffer(buf) => buf.write(bytes),
            Self::Writer(w) => w.write(bytes),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Buffer(_) => Ok(()),
            Self::Writer(w) => w.flush(),
        }
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(buf) => write!(f, "Buffer({} bytes)", buf.len()),
            Self::Writer(_) => f.write_str("Writer"),
        }
    }
}
