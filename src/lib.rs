//! Piece-table text storage with O(log n) edits and integrated line
//! tracking.
//!
//! A document is an immutable original buffer (owned by a [`TextSource`])
//! plus an append-only add buffer accumulating every insertion. Pieces
//! describe contiguous spans of either buffer; an augmented red-black
//! tree keeps them in document order and caches per-node subtree length
//! and line-feed counts, so locating an offset or a line — and therefore
//! every edit — is O(log n) regardless of document size or edit position.
//!
//! The engine is single-owner: mutations take `&mut self`, reads take
//! `&self`. Surrounding layers (rendering, undo, persistence, plugins)
//! are external; they consume the change notifications and the snapshot
//! boundary this crate exposes instead of reaching into the tree.
//!
//! ```
//! use piecebuf::PieceBuffer;
//!
//! let mut buf = PieceBuffer::from_str("hello world");
//! buf.insert(5, ",").unwrap();
//! buf.delete(6, 6).unwrap();
//! assert_eq!(buf.text(), b"hello,");
//! ```

pub mod engine;
pub mod error;
pub mod piece;
pub mod snapshot;
pub mod source;

mod line_cache;
mod tree;

pub use engine::{Change, PieceBuffer, Position, TreeStats};
pub use error::{Error, Result};
pub use piece::{BufferKind, LineFeeds, Piece};
pub use snapshot::{PieceRecord, Snapshot};
pub use source::{MmapSource, StringSource, TextSource};
