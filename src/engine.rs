//! The buffer engine: public edit/read API over the piece tree.
//!
//! A [`PieceBuffer`] owns one document: the text source holding the
//! immutable original content, the append-only add buffer, the augmented
//! tree of pieces, and a lazily-built line-offset cache. Mutations take
//! `&mut self` and reads take `&self`, so the borrow checker enforces the
//! single-owner model: edits are serialized by the caller, reads may run
//! concurrently with each other but never with a mutation. No method
//! performs explicit I/O; the only possible stall is a page fault through
//! a memory-mapped source. Teardown is `Drop`, which releases the source
//! (unmapping the file for an [`MmapSource`]-backed document) exactly
//! once.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::line_cache::LineCache;
use crate::piece::{BufferKind, LineFeeds, Piece};
use crate::snapshot::{PieceRecord, Snapshot};
use crate::source::{
    compute_line_starts, count_line_feeds_by_table, nth_line_feed_pos, MmapSource, StringSource,
    TextSource,
};
use crate::tree::PieceTree;

/// A position in the document (0-indexed line, byte column within it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Emitted to listeners after each successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Document offset of the edit.
    pub offset: usize,
    /// Bytes removed at `offset`.
    pub removed: usize,
    /// Bytes inserted at `offset` (after newline normalization).
    pub inserted: usize,
}

/// Statistics about the tree structure, for diagnostics and the scaling
/// tests.
#[derive(Debug, Clone, Copy)]
pub struct TreeStats {
    pub node_count: usize,
    pub depth: usize,
}

type ChangeListener = Box<dyn FnMut(&Change) + Send>;

/// Replace `\r\n` and lone `\r` with the internal line terminator `\n`.
/// Returns the normalized bytes and their line-feed count.
fn normalize_newlines(text: &str) -> (Vec<u8>, usize) {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut line_feeds = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' => {
                out.push(b'\n');
                line_feeds += 1;
                if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    i += 1;
                }
            }
            b'\n' => {
                out.push(b'\n');
                line_feeds += 1;
            }
            b => out.push(b),
        }
        i += 1;
    }
    (out, line_feeds)
}

/// Text-storage engine: a piece table over an immutable original buffer
/// plus an append-only add buffer, indexed by an augmented red-black tree.
pub struct PieceBuffer {
    source: Box<dyn TextSource>,
    tree: PieceTree,
    /// Append-only store for inserted text; never mutated or truncated.
    added: Vec<u8>,
    /// Line-start table of the add buffer, extended on every append.
    added_line_starts: Vec<usize>,
    line_cache: LineCache,
    listeners: Vec<ChangeListener>,
}

impl PieceBuffer {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::from_source(Box::new(StringSource::new(Vec::new())))
    }

    /// Create a document whose original content is `s`.
    pub fn from_str(s: &str) -> Self {
        Self::from_source(Box::new(StringSource::from_str(s)))
    }

    /// Create a document over an arbitrary text source.
    ///
    /// If the source supplies a precomputed line-start table, the engine
    /// adopts it for the line-offset cache instead of scanning.
    pub fn from_source(source: Box<dyn TextSource>) -> Self {
        let len = source.len();
        let tree = if len > 0 {
            let line_feeds = source.count_line_feeds(0, len);
            PieceTree::from_pieces([Piece::new(
                BufferKind::Original,
                0,
                len,
                LineFeeds::Known(line_feeds),
            )])
        } else {
            PieceTree::new()
        };
        let line_cache = match source.line_starts() {
            Some(table) => LineCache::from_table(table.to_vec()),
            None => LineCache::unbuilt(),
        };
        PieceBuffer {
            source,
            tree,
            added: Vec::new(),
            added_line_starts: vec![0],
            line_cache,
            listeners: Vec::new(),
        }
    }

    /// Open a document over a memory-mapped file. Line offsets are
    /// precomputed during a single pass at open time, so even a very
    /// large file needs no further scan.
    pub fn open_mmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = MmapSource::open(path)?;
        Ok(Self::from_source(Box::new(source)))
    }

    /// Rebuild a document from a previously enumerated snapshot and the
    /// original text source, without rescanning the document.
    pub fn from_snapshot(source: Box<dyn TextSource>, snapshot: Snapshot) -> Self {
        let added = snapshot.added;
        let added_line_starts = compute_line_starts(&added);
        let tree = PieceTree::from_pieces(snapshot.pieces.into_iter().map(Piece::from));
        let mut engine = PieceBuffer {
            source,
            tree,
            added,
            added_line_starts,
            line_cache: LineCache::unbuilt(),
            listeners: Vec::new(),
        };
        // Snapshots written after a completed edit carry only Known
        // counts, but tolerate Unknown tags from foreign writers.
        engine.fixup_line_feeds();
        engine
    }

    // ---- dimensions ----

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Total number of lines; a document with no line feeds has one line.
    pub fn line_count(&self) -> usize {
        self.tree.line_feeds() + 1
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            node_count: self.tree.node_count(),
            depth: self.tree.depth(),
        }
    }

    // ---- mutations ----

    /// Insert `text` at `offset`, normalizing line endings to `\n`.
    ///
    /// Fails with a range error (and performs no mutation) unless
    /// `offset <= len()`. Inserting the empty string is a no-op and
    /// notifies nobody.
    pub fn insert(&mut self, offset: usize, text: &str) -> Result<()> {
        if offset > self.len() {
            return Err(Error::out_of_bounds(offset, 0, self.len()));
        }
        if text.is_empty() {
            return Ok(());
        }
        let (normalized, line_feeds) = normalize_newlines(text);

        let start = self.added.len();
        self.added.extend_from_slice(&normalized);
        for (i, &b) in normalized.iter().enumerate() {
            if b == b'\n' {
                self.added_line_starts.push(start + i + 1);
            }
        }

        let piece = Piece::new(
            BufferKind::Added,
            start,
            normalized.len(),
            LineFeeds::Known(line_feeds),
        );
        self.tree.insert_at_offset(offset, piece);
        self.fixup_line_feeds();
        self.line_cache.on_insert(offset, &normalized);
        self.line_cache.reconcile(self.line_count());
        #[cfg(debug_assertions)]
        self.tree.check_invariants();

        tracing::trace!(offset, inserted = normalized.len(), "insert");
        let change = Change {
            offset,
            removed: 0,
            inserted: normalized.len(),
        };
        self.notify(&change);
        Ok(())
    }

    /// Delete `[offset, offset + len)`.
    ///
    /// Fails with a range error (and performs no mutation) unless the
    /// range lies within the document. Deleting zero bytes is a no-op and
    /// notifies nobody. No buffer bytes are touched; only piece
    /// descriptors change.
    pub fn delete(&mut self, offset: usize, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::out_of_bounds(offset, len, self.len()))?;
        if end > self.len() {
            return Err(Error::out_of_bounds(offset, len, self.len()));
        }
        if len == 0 {
            return Ok(());
        }

        self.tree.delete_range(offset, len);
        self.fixup_line_feeds();
        self.line_cache.on_delete(offset, len);
        self.line_cache.reconcile(self.line_count());
        #[cfg(debug_assertions)]
        self.tree.check_invariants();

        tracing::trace!(offset, removed = len, "delete");
        let change = Change {
            offset,
            removed: len,
            inserted: 0,
        };
        self.notify(&change);
        Ok(())
    }

    // ---- reads ----

    /// The bytes in `[offset, offset + len)`.
    pub fn text_range(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::out_of_bounds(offset, len, self.len()))?;
        if end > self.len() {
            return Err(Error::out_of_bounds(offset, len, self.len()));
        }
        let mut out = Vec::with_capacity(len);
        if len == 0 {
            return Ok(out);
        }

        let hit = self
            .tree
            .find_by_offset(offset)
            .expect("in-bounds offset must land in a piece");
        let mut node = hit.node;
        let mut piece = self.tree.piece(node);
        let take = (piece.len - hit.offset_in_piece).min(len);
        out.extend_from_slice(
            &self.piece_slice(piece)[hit.offset_in_piece..hit.offset_in_piece + take],
        );
        let mut remaining = len - take;
        while remaining > 0 {
            node = self
                .tree
                .next(node)
                .expect("in-bounds range must be covered by pieces");
            piece = self.tree.piece(node);
            let take = piece.len.min(remaining);
            out.extend_from_slice(&self.piece_slice(piece)[..take]);
            remaining -= take;
        }
        Ok(out)
    }

    /// The whole document.
    pub fn text(&self) -> Vec<u8> {
        self.text_range(0, self.len())
            .expect("full range is always in bounds")
    }

    pub fn byte_at(&self, offset: usize) -> Result<u8> {
        let hit = self
            .tree
            .find_by_offset(offset)
            .ok_or_else(|| Error::out_of_bounds(offset, 1, self.len()))?;
        let piece = self.tree.piece(hit.node);
        Ok(self.piece_slice(piece)[hit.offset_in_piece])
    }

    /// Content of line `line`, without its terminator.
    pub fn line(&self, line: usize) -> Result<String> {
        let mut lines = self.line_range(line, 1)?;
        Ok(lines.remove(0))
    }

    /// `count` consecutive lines starting at `start_line`, without their
    /// terminators.
    ///
    /// This is one bulk read: two tree descents to locate the range's
    /// offsets, one contiguous text read, one scan to split it. It is the
    /// dominant path for rendering visible lines and stays
    /// O(range length + log n).
    pub fn line_range(&self, start_line: usize, count: usize) -> Result<Vec<String>> {
        let line_count = self.line_count();
        if start_line >= line_count || count > line_count - start_line {
            return Err(Error::LineOutOfBounds {
                line: start_line + count.saturating_sub(1),
                line_count,
            });
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        let start = self.line_start_offset(start_line);
        let end = if start_line + count == line_count {
            self.len()
        } else {
            self.line_start_offset(start_line + count)
        };
        let bulk = self.text_range(start, end - start)?;

        let mut lines: Vec<String> = bulk
            .split(|&b| b == b'\n')
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect();
        // When the range ends at a line start the bulk text has a
        // trailing terminator, which split turns into one extra empty
        // fragment.
        lines.truncate(count);
        Ok(lines)
    }

    /// Document offset at which `line` starts. Caller checks bounds.
    fn line_start_offset(&self, line: usize) -> usize {
        if line == 0 {
            return 0;
        }
        let hit = self
            .tree
            .find_by_line_feed(line - 1)
            .expect("line index checked against line count");
        let piece = self.tree.piece(hit.node);
        hit.node_start + self.kth_line_feed_in_piece(piece, hit.lf_in_piece) + 1
    }

    /// Offset (within the piece) of the piece's `k`-th line feed.
    fn kth_line_feed_in_piece(&self, piece: Piece, k: usize) -> usize {
        let table = match piece.buffer {
            BufferKind::Original => self.source.line_starts(),
            BufferKind::Added => Some(self.added_line_starts.as_slice()),
        };
        if let Some(table) = table {
            if let Some(pos) = nth_line_feed_pos(table, piece.start, k) {
                debug_assert!(pos < piece.start + piece.len);
                return pos - piece.start;
            }
        }
        let bytes = self.piece_slice(piece);
        let mut seen = 0;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                if seen == k {
                    return i;
                }
                seen += 1;
            }
        }
        unreachable!("piece lacks its accounted line feed");
    }

    // ---- offset <-> position ----

    /// Convert a byte offset (up to and including `len()`) to a
    /// line/column position. Builds the line-offset cache on first use.
    pub fn offset_to_position(&mut self, offset: usize) -> Result<Position> {
        if offset > self.len() {
            return Err(Error::out_of_bounds(offset, 0, self.len()));
        }
        let starts = self.ensure_line_cache();
        let line = starts.partition_point(|&s| s <= offset) - 1;
        Ok(Position {
            line,
            column: offset - starts[line],
        })
    }

    /// Convert a line/column position to a byte offset. The column is
    /// clamped to the line's length.
    pub fn position_to_offset(&mut self, line: usize, column: usize) -> Result<usize> {
        let line_count = self.line_count();
        if line >= line_count {
            return Err(Error::LineOutOfBounds { line, line_count });
        }
        let doc_len = self.len();
        let starts = self.ensure_line_cache();
        let start = starts[line];
        let line_end = match starts.get(line + 1) {
            Some(&next) => next - 1, // excludes the terminator
            None => doc_len,
        };
        Ok(start + column.min(line_end - start))
    }

    /// Build the line-offset cache if it was never built or was discarded
    /// by the safety net.
    fn ensure_line_cache(&mut self) -> &[usize] {
        if !self.line_cache.is_built() {
            tracing::trace!(len = self.len(), "rebuilding line cache");
            let starts = compute_line_starts(&self.text());
            self.line_cache.install(starts);
        }
        self.line_cache
            .starts()
            .expect("cache was just installed")
    }

    // ---- change notification ----

    /// Register a listener invoked after every successful mutation.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&Change) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, change: &Change) {
        for listener in &mut self.listeners {
            listener(change);
        }
    }

    // ---- snapshot boundary ----

    /// In-order enumeration of the document's pieces.
    pub fn pieces(&self) -> Vec<PieceRecord> {
        self.tree
            .pieces_in_order()
            .into_iter()
            .map(PieceRecord::from)
            .collect()
    }

    /// Raw content of the add buffer.
    pub fn added_bytes(&self) -> &[u8] {
        &self.added
    }

    /// Capture the state an external persistence layer needs to restore
    /// this document over the same original content.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pieces: self.pieces(),
            added: self.added.clone(),
        }
    }

    // ---- internals ----

    fn piece_slice(&self, piece: Piece) -> &[u8] {
        match piece.buffer {
            BufferKind::Original => self.source.slice(piece.start, piece.len),
            BufferKind::Added => &self.added[piece.start..piece.start + piece.len],
        }
    }

    /// Resolve every piece the latest edit tagged `Unknown`: original
    /// pieces via the source's line table (binary search) or a range
    /// scan, add-buffer pieces via the add buffer's table.
    fn fixup_line_feeds(&mut self) {
        for node in self.tree.take_dirty() {
            let piece = self.tree.piece(node);
            let count = match piece.buffer {
                BufferKind::Original => self.source.count_line_feeds(piece.start, piece.len),
                BufferKind::Added => count_line_feeds_by_table(
                    &self.added_line_starts,
                    piece.start,
                    piece.start + piece.len,
                ),
            };
            self.tree.set_line_feeds(node, count);
        }
    }

    /// Exhaustively verify tree structure, augmented aggregates, and
    /// per-piece line-feed counts against the actual buffer bytes.
    /// Panics on violation; intended for tests and debugging.
    pub fn check_invariants(&self) {
        self.tree.check_invariants();
        let mut total = 0;
        for record in self.pieces() {
            let piece = Piece::from(record);
            let actual = self
                .piece_slice(piece)
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            match piece.line_feeds {
                LineFeeds::Known(n) => assert_eq!(n, actual, "stale piece line-feed count"),
                LineFeeds::Unknown => panic!("unresolved line-feed tag after edit"),
            }
            total += piece.len;
        }
        assert_eq!(total, self.len(), "piece lengths disagree with length");
        if let Some(starts) = self.line_cache.starts() {
            assert_eq!(
                starts,
                compute_line_starts(&self.text()),
                "line cache disagrees with document"
            );
        }
    }
}

impl Default for PieceBuffer {
    fn default() -> Self {
        Self::new()
    }
}
