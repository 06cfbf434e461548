//! Conflict Detector - OCC validation at commit time
//!
//! A committing frame conflicts with every committed frame it could not see
//! (opened later, or open when it started) that wrote one of the same objects.
//! Uses first-committer-wins: the later committer is rejected.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;
use parking_lot::RwLock;

use super::frame::FrameId;
use crate::model::ObjectId;

// ============================================================================
// Conflict Result
// ============================================================================

/// Result of conflict validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResult {
    /// No conflicts detected - safe to commit
    NoConflict,
    /// Another frame committed writes to objects this frame also wrote
    WriteWriteConflict {
        /// Colliding objects, in the committing frame's write order
        objects: Vec<ObjectId>,
        /// Frames whose commits collided
        conflicting_frames: Vec<FrameId>,
    },
}

impl ConflictResult {
    /// Whether the result indicates no conflict
    pub fn is_ok(&self) -> bool {
        matches!(self, ConflictResult::NoConflict)
    }
}

// ============================================================================
// Committed Write Record
// ============================================================================

/// Write set of a committed frame (kept while some open frame cannot see it)
#[derive(Debug, Clone)]
struct CommittedWrite {
    frame_id: FrameId,
    /// Commit order, for diagnostics
    commit_seq: u64,
    objects: AHashSet<ObjectId>,
}

// ============================================================================
// Conflict Detector
// ============================================================================

/// OCC-based conflict detector
///
/// Maintains a log of recently committed write sets. An entry is dropped once
/// every open frame can see its frame, since no open frame can then conflict
/// with it.
pub struct ConflictDetector {
    committed_writes: RwLock<Vec<CommittedWrite>>,
    /// Frames below this id have been pruned from the log
    watermark: AtomicU64,
}

impl ConflictDetector {
    pub fn new() -> Self {
        Self {
            committed_writes: RwLock::new(Vec::new()),
            watermark: AtomicU64::new(0),
        }
    }

    /// Validate the write set of `frame_id` against the commit log
    ///
    /// `invalid` is the set of frames that were open when `frame_id` started.
    pub fn validate(
        &self,
        frame_id: FrameId,
        invalid: &AHashSet<FrameId>,
        writes: &[ObjectId],
    ) -> ConflictResult {
        let committed = self.committed_writes.read();
        let mut objects = Vec::new();
        let mut conflicting_frames = Vec::new();

        for cw in committed.iter() {
            if cw.frame_id == frame_id {
                continue;
            }
            let unseen = cw.frame_id > frame_id || invalid.contains(&cw.frame_id);
            if !unseen {
                continue;
            }
            let mut hit = false;
            for object in writes {
                if cw.objects.contains(object) {
                    hit = true;
                    if !objects.contains(object) {
                        objects.push(*object);
                    }
                }
            }
            if hit {
                log::trace!(
                    "Frame {} collides with frame {} (commit #{})",
                    frame_id,
                    cw.frame_id,
                    cw.commit_seq
                );
                conflicting_frames.push(cw.frame_id);
            }
        }

        if objects.is_empty() {
            ConflictResult::NoConflict
        } else {
            // Report in the committing frame's write order
            objects.sort_by_key(|o| writes.iter().position(|w| w == o));
            ConflictResult::WriteWriteConflict {
                objects,
                conflicting_frames,
            }
        }
    }

    /// Record that a frame has committed its writes
    pub fn record_commit(&self, frame_id: FrameId, commit_seq: u64, writes: &[ObjectId]) {
        if writes.is_empty() {
            return;
        }
        self.committed_writes.write().push(CommittedWrite {
            frame_id,
            commit_seq,
            objects: writes.iter().copied().collect(),
        });
    }

    /// Drop log entries every open frame can already see
    pub fn advance_watermark(&self, low_watermark: FrameId) {
        let previous = self.watermark.fetch_max(low_watermark, Ordering::SeqCst);
        if low_watermark <= previous {
            return;
        }
        self.committed_writes
            .write()
            .retain(|cw| cw.frame_id >= low_watermark);
    }

    /// Number of tracked committed write sets (for monitoring)
    pub fn committed_write_count(&self) -> usize {
        self.committed_writes.read().len()
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ObjectId> {
        raw.iter().map(|&r| ObjectId::from_raw(r)).collect()
    }

    fn frames(raw: &[FrameId]) -> AHashSet<FrameId> {
        raw.iter().copied().collect()
    }

    #[test]
    fn test_no_conflict() {
        let detector = ConflictDetector::new();
        assert!(detector.validate(1, &frames(&[]), &ids(&[1])).is_ok());
    }

    #[test]
    fn test_later_frame_committed_first() {
        let detector = ConflictDetector::new();
        // Frame 3 opened after frame 2 but committed first
        detector.record_commit(3, 1, &ids(&[7]));

        match detector.validate(2, &frames(&[]), &ids(&[7])) {
            ConflictResult::WriteWriteConflict { objects, conflicting_frames } => {
                assert_eq!(objects, ids(&[7]));
                assert_eq!(conflicting_frames, vec![3]);
            }
            other => panic!("Expected WriteWriteConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_concurrent_earlier_frame() {
        let detector = ConflictDetector::new();
        // Frame 2 was open when frame 3 started, then committed
        detector.record_commit(2, 1, &ids(&[7]));

        assert!(!detector.validate(3, &frames(&[2]), &ids(&[7])).is_ok());
    }

    #[test]
    fn test_visible_commit_is_not_a_conflict() {
        let detector = ConflictDetector::new();
        // Frame 2 committed before frame 3 started
        detector.record_commit(2, 1, &ids(&[7]));

        assert!(detector.validate(3, &frames(&[]), &ids(&[7])).is_ok());
    }

    #[test]
    fn test_disjoint_writes_do_not_conflict() {
        let detector = ConflictDetector::new();
        detector.record_commit(3, 1, &ids(&[1, 2]));

        assert!(detector.validate(2, &frames(&[]), &ids(&[3, 4])).is_ok());
    }

    #[test]
    fn test_reports_every_colliding_object() {
        let detector = ConflictDetector::new();
        detector.record_commit(4, 1, &ids(&[5]));
        detector.record_commit(5, 2, &ids(&[1, 9]));

        match detector.validate(2, &frames(&[]), &ids(&[1, 5, 6])) {
            ConflictResult::WriteWriteConflict { objects, mut conflicting_frames } => {
                assert_eq!(objects, ids(&[1, 5]));
                conflicting_frames.sort();
                assert_eq!(conflicting_frames, vec![4, 5]);
            }
            other => panic!("Expected WriteWriteConflict, got {:?}", other),
        }
    }

    #[test]
    fn test_watermark_cleanup() {
        let detector = ConflictDetector::new();
        detector.record_commit(2, 1, &ids(&[1]));
        detector.record_commit(6, 2, &ids(&[1]));
        assert_eq!(detector.committed_write_count(), 2);

        detector.advance_watermark(5);
        assert_eq!(detector.committed_write_count(), 1);

        // Going backwards never resurrects or drops more
        detector.advance_watermark(3);
        assert_eq!(detector.committed_write_count(), 1);
    }
}
