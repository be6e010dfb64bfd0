//! Snapshot boundary for external persistence.
//!
//! The engine exposes its state as an in-order piece enumeration plus the
//! add buffer's raw content, and can rebuild a document directly from
//! that pair without rescanning the text. An external snapshot
//! writer/reader chooses the actual storage format; the types here only
//! need to be serializable.

use serde::{Deserialize, Serialize};

use crate::piece::{BufferKind, LineFeeds, Piece};

/// One entry of the in-order piece enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceRecord {
    pub buffer: BufferKind,
    pub start: usize,
    pub len: usize,
    pub line_feeds: LineFeeds,
}

impl From<Piece> for PieceRecord {
    fn from(p: Piece) -> Self {
        PieceRecord {
            buffer: p.buffer,
            start: p.start,
            len: p.len,
            line_feeds: p.line_feeds,
        }
    }
}

impl From<PieceRecord> for Piece {
    fn from(r: PieceRecord) -> Self {
        Piece::new(r.buffer, r.start, r.len, r.line_feeds)
    }
}

/// Everything an external persistence layer needs to restore an
/// in-progress edit session on top of the same original content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Pieces in document order.
    pub pieces: Vec<PieceRecord>,
    /// Raw content of the add buffer.
    pub added: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_converts_both_ways() {
        let piece = Piece::new(BufferKind::Added, 7, 3, LineFeeds::Known(1));
        let record = PieceRecord::from(piece);
        assert_eq!(Piece::from(record), piece);
    }

    #[test]
    fn snapshot_serializes() {
        let snapshot = Snapshot {
            pieces: vec![
                PieceRecord {
                    buffer: BufferKind::Original,
                    start: 0,
                    len: 12,
                    line_feeds: LineFeeds::Known(2),
                },
                PieceRecord {
                    buffer: BufferKind::Added,
                    start: 0,
                    len: 4,
                    line_feeds: LineFeeds::Known(0),
                },
            ],
            added: b"text".to_vec(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pieces, snapshot.pieces);
        assert_eq!(back.added, snapshot.added);
    }
}
