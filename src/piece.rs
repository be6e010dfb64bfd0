use serde::{Deserialize, Serialize};

/// Identifies which buffer a piece of text comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferKind {
    /// The immutable original content owned by the text source.
    Original,
    /// The append-only add buffer owned by the engine.
    Added,
}

/// Line-feed count of a piece.
///
/// A piece that was just split or shrunk cannot know its own count without
/// reading buffer bytes, so it is tagged `Unknown` and resolved by the
/// fixup pass before the edit that created it returns. `Unknown`
/// contributes zero to the tree's cached aggregates, which keeps them
/// internally consistent while the tag is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineFeeds {
    Known(usize),
    Unknown,
}

impl LineFeeds {
    /// Count used for aggregate bookkeeping; `Unknown` counts as zero
    /// until the fixup pass resolves it.
    pub fn count(self) -> usize {
        match self {
            LineFeeds::Known(n) => n,
            LineFeeds::Unknown => 0,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, LineFeeds::Known(_))
    }
}

/// Descriptor of one contiguous span of already-stored text.
///
/// Pieces never own bytes; they reference a range of either the original
/// buffer or the add buffer. Deleting text only removes or shrinks
/// descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub buffer: BufferKind,
    /// Start offset within the referenced buffer.
    pub start: usize,
    /// Length in bytes.
    pub len: usize,
    pub line_feeds: LineFeeds,
}

impl Piece {
    pub fn new(buffer: BufferKind, start: usize, len: usize, line_feeds: LineFeeds) -> Self {
        Piece {
            buffer,
            start,
            len,
            line_feeds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_counts_as_zero() {
        assert_eq!(LineFeeds::Unknown.count(), 0);
        assert_eq!(LineFeeds::Known(3).count(), 3);
        assert!(!LineFeeds::Unknown.is_known());
        assert!(LineFeeds::Known(0).is_known());
    }

    #[test]
    fn piece_is_a_plain_value() {
        let p = Piece::new(BufferKind::Added, 10, 5, LineFeeds::Known(1));
        let q = p;
        assert_eq!(p, q);
        assert_eq!(q.start, 10);
        assert_eq!(q.len, 5);
    }
}
