//! Read-only views over a document's original content.
//!
//! A [`TextSource`] owns the original buffer for the lifetime of the
//! document. The engine never mutates it; edits go to the add buffer and
//! are described by pieces. Sources may optionally expose a precomputed
//! line-start table so the engine can bootstrap line metadata without an
//! O(n) scan of its own.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

/// Pluggable backend for a document's original content.
///
/// Implementations must be cheap to read from: no method here performs
/// explicit I/O. For a memory-mapped source the only possible stall is a
/// page fault when a read first touches a region.
pub trait TextSource: Send {
    /// Total length in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte at `offset`, if in range.
    fn byte_at(&self, offset: usize) -> Option<u8>;

    /// Borrow the bytes in `[start, start + len)`.
    ///
    /// Callers must stay within `[0, len()]`; pieces referencing the
    /// original buffer guarantee this by construction.
    fn slice(&self, start: usize, len: usize) -> &[u8];

    /// Number of `\n` bytes in `[start, start + len)`.
    fn count_line_feeds(&self, start: usize, len: usize) -> usize;

    /// Precomputed table of line-start offsets (entry 0 is always 0),
    /// or `None` if this source does not index lines.
    fn line_starts(&self) -> Option<&[usize]> {
        None
    }
}

/// Compute line start offsets for a chunk of content.
///
/// Entry `i` is the byte offset at which line `i` starts; entry 0 is 0.
pub(crate) fn compute_line_starts(data: &[u8]) -> Vec<usize> {
    let mut line_starts = vec![0];
    for (i, &byte) in data.iter().enumerate() {
        if byte == b'\n' {
            line_starts.push(i + 1);
        }
    }
    line_starts
}

/// Count `\n` bytes in `[start, end)` using a line-start table.
///
/// A line feed at position `p` corresponds to a table entry `p + 1`, so
/// the count is the number of entries in `(start, end]`.
pub(crate) fn count_line_feeds_by_table(table: &[usize], start: usize, end: usize) -> usize {
    let lo = table.partition_point(|&s| s <= start);
    let hi = table.partition_point(|&s| s <= end);
    hi - lo
}

/// Position of the `k`-th (0-based) line feed at or after `start`,
/// per the given line-start table. Returns `None` if there are fewer
/// than `k + 1` line feeds past `start`.
pub(crate) fn nth_line_feed_pos(table: &[usize], start: usize, k: usize) -> Option<usize> {
    let first = table.partition_point(|&s| s <= start);
    table.get(first + k).map(|&s| s - 1)
}

/// In-memory source: the document's initial content as an owned byte
/// vector, with its line-start table computed once at construction.
pub struct StringSource {
    data: Vec<u8>,
    line_starts: Vec<usize>,
}

impl StringSource {
    pub fn new(data: Vec<u8>) -> Self {
        let line_starts = compute_line_starts(&data);
        StringSource { data, line_starts }
    }

    pub fn from_str(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl TextSource for StringSource {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    fn slice(&self, start: usize, len: usize) -> &[u8] {
        &self.data[start..start + len]
    }

    fn count_line_feeds(&self, start: usize, len: usize) -> usize {
        count_line_feeds_by_table(&self.line_starts, start, start + len)
    }

    fn line_starts(&self) -> Option<&[usize]> {
        Some(&self.line_starts)
    }
}

/// Memory-mapped file source for large documents.
///
/// The file stays on disk; the line-start table is built in a single pass
/// over the mapping at open time, so the engine never rescans the file.
/// Dropping the source unmaps the file.
pub struct MmapSource {
    mmap: Mmap,
    line_starts: Vec<usize>,
}

impl MmapSource {
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapping is read-only and the engine's single-owner
        // contract requires the caller not to truncate the file while the
        // document is open.
        let mmap = unsafe { Mmap::map(&file)? };
        let line_starts = compute_line_starts(&mmap);
        Ok(MmapSource { mmap, line_starts })
    }
}

impl TextSource for MmapSource {
    fn len(&self) -> usize {
        self.mmap.len()
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.mmap.get(offset).copied()
    }

    fn slice(&self, start: usize, len: usize) -> &[u8] {
        &self.mmap[start..start + len]
    }

    fn count_line_feeds(&self, start: usize, len: usize) -> usize {
        count_line_feeds_by_table(&self.line_starts, start, start + len)
    }

    fn line_starts(&self) -> Option<&[usize]> {
        Some(&self.line_starts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn line_starts_table() {
        assert_eq!(compute_line_starts(b""), vec![0]);
        assert_eq!(compute_line_starts(b"abc"), vec![0]);
        assert_eq!(compute_line_starts(b"a\nb\n"), vec![0, 2, 4]);
        assert_eq!(compute_line_starts(b"\n\n"), vec![0, 1, 2]);
    }

    #[test]
    fn table_count_matches_scan() {
        let data = b"one\ntwo\nthree\n\nfive";
        let table = compute_line_starts(data);
        for start in 0..=data.len() {
            for end in start..=data.len() {
                let scanned = data[start..end].iter().filter(|&&b| b == b'\n').count();
                assert_eq!(
                    count_line_feeds_by_table(&table, start, end),
                    scanned,
                    "range {}..{}",
                    start,
                    end
                );
            }
        }
    }

    #[test]
    fn nth_line_feed_lookup() {
        let data = b"ab\ncd\nef";
        let table = compute_line_starts(data);
        assert_eq!(nth_line_feed_pos(&table, 0, 0), Some(2));
        assert_eq!(nth_line_feed_pos(&table, 0, 1), Some(5));
        assert_eq!(nth_line_feed_pos(&table, 0, 2), None);
        // Starting past the first line feed skips it
        assert_eq!(nth_line_feed_pos(&table, 2, 0), Some(5));
    }

    #[test]
    fn string_source_basics() {
        let src = StringSource::from_str("hello\nworld");
        assert_eq!(src.len(), 11);
        assert_eq!(src.byte_at(5), Some(b'\n'));
        assert_eq!(src.byte_at(11), None);
        assert_eq!(src.slice(6, 5), b"world");
        assert_eq!(src.count_line_feeds(0, 11), 1);
        assert_eq!(src.line_starts(), Some(&[0, 6][..]));
    }

    #[test]
    fn mmap_source_matches_string_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let content = b"alpha\nbeta\r\ngamma\n";
        file.write_all(content).unwrap();
        file.flush().unwrap();

        let mapped = MmapSource::open(file.path()).unwrap();
        let in_mem = StringSource::new(content.to_vec());

        assert_eq!(mapped.len(), in_mem.len());
        assert_eq!(mapped.line_starts(), in_mem.line_starts());
        for offset in 0..content.len() {
            assert_eq!(mapped.byte_at(offset), in_mem.byte_at(offset));
        }
        assert_eq!(
            mapped.count_line_feeds(0, content.len()),
            in_mem.count_line_feeds(0, content.len())
        );
    }
}
