//! Document-level cache mapping line index to absolute offset.
//!
//! Built lazily with one O(n) scan on first access (or adopted from a
//! text source's precomputed table), then patched incrementally on every
//! edit: binary-search the edited line, shift trailing entries, splice in
//! the line starts added or removed by the edit.

/// Growable array: entry `i` is the absolute document offset at which
/// line `i` starts. Entry 0 is always 0 when the cache is built.
pub(crate) struct LineCache {
    starts: Option<Vec<usize>>,
}

impl LineCache {
    pub fn unbuilt() -> Self {
        LineCache { starts: None }
    }

    pub fn from_table(starts: Vec<usize>) -> Self {
        debug_assert_eq!(starts.first(), Some(&0));
        LineCache {
            starts: Some(starts),
        }
    }

    pub fn is_built(&self) -> bool {
        self.starts.is_some()
    }

    pub fn starts(&self) -> Option<&[usize]> {
        self.starts.as_deref()
    }

    pub fn install(&mut self, starts: Vec<usize>) {
        debug_assert_eq!(starts.first(), Some(&0));
        self.starts = Some(starts);
    }

    pub fn invalidate(&mut self) {
        self.starts = None;
    }

    /// Patch the cache for `text` (already normalized, so `\n` is the
    /// only terminator) inserted at `offset`.
    pub fn on_insert(&mut self, offset: usize, text: &[u8]) {
        let Some(starts) = self.starts.as_mut() else {
            return;
        };
        // Entries strictly after the insertion point shift right; an entry
        // exactly at `offset` keeps its value because the inserted text
        // becomes the new head of that line.
        let shift_from = starts.partition_point(|&s| s <= offset);
        for s in &mut starts[shift_from..] {
            *s += text.len();
        }
        let new_starts: Vec<usize> = text
            .iter()
            .enumerate()
            .filter(|(_, &b)| b == b'\n')
            .map(|(i, _)| offset + i + 1)
            .collect();
        if !new_starts.is_empty() {
            starts.splice(shift_from..shift_from, new_starts);
        }
    }

    /// Patch the cache for a deletion of `[offset, offset + len)`.
    pub fn on_delete(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let Some(starts) = self.starts.as_mut() else {
            return;
        };
        // A line start at `v` owes its existence to the line feed at
        // `v - 1`, so starts in `(offset, offset + len]` disappear with
        // the deleted span.
        let lo = starts.partition_point(|&s| s <= offset);
        let hi = starts.partition_point(|&s| s <= offset + len);
        starts.drain(lo..hi);
        for s in &mut starts[lo..] {
            *s -= len;
        }
    }

    /// Safety net: an incremental patch that disagrees with the tree's
    /// line count is a bug in the patch path. Fail hard in debug builds;
    /// in release builds discard the cache so the next access rebuilds it
    /// from scratch instead of serving inconsistent data.
    pub fn reconcile(&mut self, expected_line_count: usize) {
        let Some(starts) = self.starts.as_ref() else {
            return;
        };
        let cache_lines = starts.len();
        if cache_lines != expected_line_count {
            debug_assert!(
                false,
                "line cache length {} disagrees with line count {}",
                cache_lines, expected_line_count
            );
            tracing::warn!(
                cache_lines,
                expected_line_count,
                "discarding inconsistent line cache"
            );
            self.invalidate();
        }
    }
}
