//! Record Chain - Versioned values of one framed object
//!
//! Records are kept in an unordered arena. Which record a frame sees is decided
//! only by the visibility predicate: the record with the greatest frame id the
//! frame is allowed to see. A chain never holds two records stamped with the
//! same frame id.

use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::Mutex;

use crate::frames::FrameId;

// ============================================================================
// Visibility
// ============================================================================

/// Which record ids a frame may read
///
/// A frame sees its own records, and every record of a frame with a smaller id
/// that was neither open when it started nor aborted since.
#[derive(Debug, Clone, Copy)]
pub struct Visibility<'a> {
    frame_id: FrameId,
    invalid: &'a AHashSet<FrameId>,
    aborted: &'a AHashSet<FrameId>,
}

impl<'a> Visibility<'a> {
    pub fn new(
        frame_id: FrameId,
        invalid: &'a AHashSet<FrameId>,
        aborted: &'a AHashSet<FrameId>,
    ) -> Self {
        Self { frame_id, invalid, aborted }
    }

    /// Frame the visibility is computed for
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    #[inline]
    pub fn can_see(&self, record_frame: FrameId) -> bool {
        record_frame == self.frame_id
            || (record_frame < self.frame_id
                && !self.invalid.contains(&record_frame)
                && !self.aborted.contains(&record_frame))
    }
}

// ============================================================================
// Horizon
// ============================================================================

/// Snapshot of which records can still be selected by any open or future frame
#[derive(Debug, Clone)]
pub struct Horizon {
    /// Every committed frame below this id is visible to all open frames
    pub low_watermark: FrameId,
    /// Frames whose records are never visible
    pub aborted: Arc<AHashSet<FrameId>>,
}

impl Horizon {
    pub fn new(low_watermark: FrameId, aborted: Arc<AHashSet<FrameId>>) -> Self {
        Self { low_watermark, aborted }
    }

    /// Whether a record of this frame is committed and visible to every open frame
    #[inline]
    fn is_settled(&self, record_frame: FrameId) -> bool {
        record_frame < self.low_watermark && !self.aborted.contains(&record_frame)
    }
}

// ============================================================================
// Record
// ============================================================================

/// One version of a framed object's fields
#[derive(Debug, Clone)]
pub struct Record<T> {
    frame_id: FrameId,
    value: T,
}

impl<T> Record<T> {
    /// Frame that produced this version
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

// ============================================================================
// Record Chain
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct CachedPick {
    frame_id: FrameId,
    index: usize,
    record_frame: FrameId,
}

/// Result of sweeping one chain
#[derive(Debug, Clone, Default)]
pub struct Collected {
    /// Number of records removed
    pub removed: usize,
    /// Aborted frame ids still carried by a surviving record
    pub retained_aborted: Vec<FrameId>,
}

/// All records of one framed object
#[derive(Debug)]
pub struct RecordChain<T> {
    records: Vec<Record<T>>,
    /// Last resolution: frame → record index
    cache: Mutex<Option<CachedPick>>,
}

impl<T> RecordChain<T> {
    /// Create a chain with the record produced by the creating frame
    pub fn new(frame_id: FrameId, value: T) -> Self {
        Self {
            records: vec![Record { frame_id, value }],
            cache: Mutex::new(None),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// A chain always holds at least one record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record<T>] {
        &self.records
    }

    pub fn value(&self, index: usize) -> &T {
        &self.records[index].value
    }

    pub fn value_mut(&mut self, index: usize) -> &mut T {
        &mut self.records[index].value
    }

    pub fn frame_of(&self, index: usize) -> FrameId {
        self.records[index].frame_id
    }

    /// Find the record a frame reads: the greatest visible frame id
    pub fn resolve(&self, vis: &Visibility<'_>) -> Option<usize> {
        if let Some(pick) = *self.cache.lock() {
            if pick.frame_id == vis.frame_id()
                && self.records.get(pick.index).map(|r| r.frame_id) == Some(pick.record_frame)
            {
                return Some(pick.index);
            }
        }

        let mut best: Option<usize> = None;
        for (index, record) in self.records.iter().enumerate() {
            if !vis.can_see(record.frame_id) {
                continue;
            }
            match best {
                Some(b) if self.records[b].frame_id >= record.frame_id => {}
                _ => best = Some(index),
            }
        }

        if let Some(index) = best {
            self.remember(vis.frame_id(), index);
        }
        best
    }

    /// Cache a resolution result
    pub fn remember(&self, frame_id: FrameId, index: usize) {
        *self.cache.lock() = Some(CachedPick {
            frame_id,
            index,
            record_frame: self.records[index].frame_id,
        });
    }

    /// Newest record every open frame already sees
    fn newest_settled(&self, horizon: &Horizon) -> Option<FrameId> {
        self.records
            .iter()
            .map(|r| r.frame_id)
            .filter(|&f| horizon.is_settled(f))
            .max()
    }

    fn is_dead(
        &self,
        record_frame: FrameId,
        newest_settled: Option<FrameId>,
        horizon: &Horizon,
    ) -> bool {
        horizon.aborted.contains(&record_frame)
            || newest_settled.map_or(false, |settled| record_frame < settled)
    }

    /// Find a record no open or future frame can select
    ///
    /// That is a record of an aborted frame, or one shadowed by a newer record
    /// that every open frame already sees.
    pub fn reusable_index(&self, horizon: &Horizon) -> Option<usize> {
        let settled = self.newest_settled(horizon);
        self.records
            .iter()
            .position(|r| self.is_dead(r.frame_id, settled, horizon))
    }

    /// Store a new version for `frame_id`, reusing a dead record when possible
    ///
    /// Returns the record index and whether an existing record was reused.
    pub fn stamp(&mut self, frame_id: FrameId, value: T, horizon: &Horizon) -> (usize, bool) {
        let (index, reused) = match self.reusable_index(horizon) {
            Some(index) => {
                let record = &mut self.records[index];
                record.frame_id = frame_id;
                record.value = value;
                (index, true)
            }
            None => {
                self.records.push(Record { frame_id, value });
                (self.records.len() - 1, false)
            }
        };
        self.remember(frame_id, index);
        (index, reused)
    }

    /// Remove every dead record, keeping at least one
    pub fn collect(&mut self, horizon: &Horizon) -> Collected {
        let settled = self.newest_settled(horizon);
        let before = self.records.len();

        let dead: Vec<bool> = self
            .records
            .iter()
            .map(|r| self.is_dead(r.frame_id, settled, horizon))
            .collect();

        if dead.iter().all(|&d| d) {
            // Only aborted records remain; the object stays unreadable.
            self.records.truncate(1);
        } else {
            let mut flags = dead.into_iter();
            self.records.retain(|_| !flags.next().unwrap_or(false));
        }
        *self.cache.lock() = None;

        let retained_aborted = self
            .records
            .iter()
            .map(|r| r.frame_id)
            .filter(|f| horizon.aborted.contains(f))
            .collect();

        Collected {
            removed: before - self.records.len(),
            retained_aborted,
        }
    }
}

impl<T: Clone> RecordChain<T> {
    /// Clone the value of a record
    pub fn copy_value(&self, index: usize) -> T {
        self.records[index].value.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
