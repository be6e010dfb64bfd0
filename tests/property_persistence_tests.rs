// Property-based tests for the snapshot boundary (edit → snapshot →
// serialize → restore), covering:
// - Snapshots mixing original- and add-buffer pieces
// - Serialization through an external format (JSON here)
// - Restored documents staying fully editable
// - Mmap-backed originals restored over a fresh mapping

use piecebuf::{MmapSource, PieceBuffer, Snapshot, StringSource};
use proptest::prelude::*;
use std::io::Write;

/// Low-level buffer edit operations, scaled to the live document size.
#[derive(Debug, Clone)]
enum BufferOp {
    Insert { offset_percent: u8, content: String },
    Delete { offset_percent: u8, len_percent: u8 },
    InsertAtStart { content: String },
    InsertAtEnd { content: String },
}

impl BufferOp {
    fn apply(&self, buf: &mut PieceBuffer) {
        let total = buf.len();
        match self {
            Self::Insert {
                offset_percent,
                content,
            } => {
                let offset = (total * (*offset_percent as usize)) / 255;
                buf.insert(offset.min(total), content).unwrap();
            }
            Self::Delete {
                offset_percent,
                len_percent,
            } => {
                if total == 0 {
                    return;
                }
                let offset = (total * (*offset_percent as usize)) / 255 % total;
                let len = 1 + ((total - offset - 1) * (*len_percent as usize)) / 255;
                buf.delete(offset, len).unwrap();
            }
            Self::InsertAtStart { content } => buf.insert(0, content).unwrap(),
            Self::InsertAtEnd { content } => buf.insert(total, content).unwrap(),
        }
    }
}

fn buffer_op_strategy() -> impl Strategy<Value = BufferOp> {
    let content = "[a-z\n]{1,10}";
    prop_oneof![
        3 => (any::<u8>(), content).prop_map(|(offset_percent, content)| BufferOp::Insert {
            offset_percent,
            content,
        }),
        3 => (any::<u8>(), any::<u8>()).prop_map(|(offset_percent, len_percent)| {
            BufferOp::Delete {
                offset_percent,
                len_percent,
            }
        }),
        1 => content.prop_map(|content| BufferOp::InsertAtStart { content }),
        1 => content.prop_map(|content| BufferOp::InsertAtEnd { content }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        ..ProptestConfig::default()
    })]

    /// Snapshot → JSON → restore must reproduce the document exactly and
    /// leave it editable.
    #[test]
    fn json_snapshot_round_trip(
        initial in "[a-z\n]{0,50}",
        ops in prop::collection::vec(buffer_op_strategy(), 0..25)
    ) {
        let mut buf = PieceBuffer::from_str(&initial);
        for op in &ops {
            op.apply(&mut buf);
        }

        let json = serde_json::to_string(&buf.snapshot()).unwrap();
        let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
        let mut restored = PieceBuffer::from_snapshot(
            Box::new(StringSource::from_str(&initial)),
            snapshot,
        );

        prop_assert_eq!(restored.text(), buf.text());
        prop_assert_eq!(restored.len(), buf.len());
        prop_assert_eq!(restored.line_count(), buf.line_count());
        restored.check_invariants();

        restored.insert(restored.len() / 2, "after\nrestore").unwrap();
        restored.check_invariants();
    }

    /// The piece enumeration alone must account for the whole document.
    #[test]
    fn piece_enumeration_covers_document(
        initial in "[a-z\n]{0,50}",
        ops in prop::collection::vec(buffer_op_strategy(), 0..25)
    ) {
        let mut buf = PieceBuffer::from_str(&initial);
        for op in &ops {
            op.apply(&mut buf);
        }

        let pieces = buf.pieces();
        let total: usize = pieces.iter().map(|p| p.len).sum();
        prop_assert_eq!(total, buf.len());
        for piece in &pieces {
            prop_assert!(piece.len > 0, "zero-length piece in enumeration");
            prop_assert!(piece.line_feeds.is_known(), "unresolved tag escaped");
        }
    }
}

/// A snapshot of edits over a memory-mapped file restores against a fresh
/// mapping of the same file.
#[test]
fn snapshot_restores_over_remapped_file() {
    let content = "one\ntwo\nthree\nfour\n";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();

    let mut buf = PieceBuffer::from_source(Box::new(MmapSource::open(file.path()).unwrap()));
    buf.insert(4, "2.5\n").unwrap();
    buf.delete(0, 2).unwrap();
    let expected = buf.text();
    let snapshot = buf.snapshot();
    drop(buf); // unmaps the file

    let restored =
        PieceBuffer::from_snapshot(Box::new(MmapSource::open(file.path()).unwrap()), snapshot);
    assert_eq!(restored.text(), expected);
    restored.check_invariants();
}
