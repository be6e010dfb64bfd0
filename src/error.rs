use thiserror::Error;

/// Errors surfaced by the buffer engine and text sources.
///
/// Range errors are reported before any mutation takes place, so a failed
/// call leaves the document byte-for-byte unchanged. Invariant violations
/// are programmer errors and are handled with debug assertions, not with
/// this type.
#[derive(Debug, Error)]
pub enum Error {
    /// An offset or range fell outside the valid document bounds.
    #[error("range out of bounds: offset {offset} + len {len} exceeds document length {doc_len}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        doc_len: usize,
    },

    /// A line index beyond the document's last line.
    #[error("line {line} out of bounds: document has {line_count} lines")]
    LineOutOfBounds { line: usize, line_count: usize },

    /// An I/O failure in a text source (e.g. opening or mapping a file).
    #[error("text source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn out_of_bounds(offset: usize, len: usize, doc_len: usize) -> Self {
        Error::OutOfBounds {
            offset,
            len,
            doc_len,
        }
    }
}
