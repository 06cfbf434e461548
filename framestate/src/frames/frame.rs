//! Frame - the unit of isolation
//!
//! A frame fixes, at open time, which other frames it must not read from: every
//! frame that was still open at that moment. Together with the global aborted
//! set this decides which records the frame sees.

use std::fmt;
use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::Mutex;

use super::observer::{ReadObserver, WriteObserver};
use crate::model::ObjectId;
use crate::record::Visibility;

// ============================================================================
// Frame ID
// ============================================================================

/// Unique frame identifier, never reused within a manager
pub type FrameId = u64;

// ============================================================================
// Frame Status
// ============================================================================

/// Current status of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Current on some thread
    Open,
    /// Detached from its thread, neither committed nor aborted
    Suspended,
    /// Writes are visible to frames opened afterwards
    Committed,
    /// Writes are discarded
    Aborted,
}

// ============================================================================
// Frame Options
// ============================================================================

/// Options for opening a frame
#[derive(Clone, Default)]
pub struct FrameOptions {
    pub(crate) read_only: bool,
    pub(crate) speculative: bool,
    pub(crate) read_observer: Option<ReadObserver>,
    pub(crate) write_observer: Option<WriteObserver>,
}

impl FrameOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write in this frame
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Discard the frame's writes instead of committing them
    pub fn speculative(mut self) -> Self {
        self.speculative = true;
        self
    }

    /// Called once per object the first time the frame reads it
    pub fn on_read(mut self, observer: impl Fn(ObjectId) + Send + Sync + 'static) -> Self {
        self.read_observer = Some(Arc::new(observer));
        self
    }

    /// Called once per object the first time the frame writes it
    pub fn on_write(mut self, observer: impl Fn(ObjectId) + Send + Sync + 'static) -> Self {
        self.write_observer = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for FrameOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameOptions")
            .field("read_only", &self.read_only)
            .field("speculative", &self.speculative)
            .field("read_observer", &self.read_observer.is_some())
            .field("write_observer", &self.write_observer.is_some())
            .finish()
    }
}

// ============================================================================
// Frame
// ============================================================================

/// Objects written by a frame, in first-write order
#[derive(Default)]
struct WriteSet {
    order: Vec<ObjectId>,
    seen: AHashSet<ObjectId>,
}

struct FrameState {
    id: FrameId,
    manager_id: u64,
    invalid: AHashSet<FrameId>,
    read_only: bool,
    speculative: bool,
    read_observer: Option<ReadObserver>,
    write_observer: Option<WriteObserver>,
    status: Mutex<FrameStatus>,
    writes: Mutex<WriteSet>,
    reads: Mutex<AHashSet<ObjectId>>,
}

/// Handle to a frame
///
/// Cloning yields another handle to the same frame. A suspended frame is
/// carried around as this handle until it is restored, committed or aborted.
#[derive(Clone)]
pub struct Frame {
    state: Arc<FrameState>,
}

impl Frame {
    pub(crate) fn new(
        id: FrameId,
        manager_id: u64,
        invalid: AHashSet<FrameId>,
        options: FrameOptions,
    ) -> Self {
        Self {
            state: Arc::new(FrameState {
                id,
                manager_id,
                invalid,
                read_only: options.read_only,
                speculative: options.speculative,
                read_observer: options.read_observer,
                write_observer: options.write_observer,
                status: Mutex::new(FrameStatus::Open),
                writes: Mutex::new(WriteSet::default()),
                reads: Mutex::new(AHashSet::new()),
            }),
        }
    }

    pub fn id(&self) -> FrameId {
        self.state.id
    }

    pub fn status(&self) -> FrameStatus {
        *self.state.status.lock()
    }

    /// Whether the frame is neither committed nor aborted
    pub fn is_open(&self) -> bool {
        matches!(self.status(), FrameStatus::Open | FrameStatus::Suspended)
    }

    pub fn is_read_only(&self) -> bool {
        self.state.read_only
    }

    /// Whether committing this frame discards it
    pub fn is_speculative(&self) -> bool {
        self.state.speculative
    }

    /// Frames that were open when this frame started
    pub fn invalid_frames(&self) -> &AHashSet<FrameId> {
        &self.state.invalid
    }

    /// Objects this frame has written, in first-write order
    pub fn modified_objects(&self) -> Vec<ObjectId> {
        self.state.writes.lock().order.clone()
    }

    pub fn was_modified(&self, object: ObjectId) -> bool {
        self.state.writes.lock().seen.contains(&object)
    }

    pub fn visibility<'a>(&'a self, aborted: &'a AHashSet<FrameId>) -> Visibility<'a> {
        Visibility::new(self.state.id, &self.state.invalid, aborted)
    }

    pub(crate) fn manager_id(&self) -> u64 {
        self.state.manager_id
    }

    pub(crate) fn set_status(&self, status: FrameStatus) {
        *self.state.status.lock() = status;
    }

    /// Move to `to` if the current status is `from`
    pub(crate) fn transition(
        &self,
        from: FrameStatus,
        to: FrameStatus,
    ) -> Result<(), FrameStatus> {
        let mut status = self.state.status.lock();
        if *status != from {
            return Err(*status);
        }
        *status = to;
        Ok(())
    }

    /// Record a write; fires the write observer on the first write of an object
    pub(crate) fn note_write(&self, object: ObjectId) {
        let first = {
            let mut writes = self.state.writes.lock();
            if writes.seen.insert(object) {
                writes.order.push(object);
                true
            } else {
                false
            }
        };
        if first {
            if let Some(observer) = &self.state.write_observer {
                observer(object);
            }
        }
    }

    /// Fires the read observer on the first read of an object
    pub(crate) fn note_read(&self, object: ObjectId) {
        if let Some(observer) = &self.state.read_observer {
            let first = self.state.reads.lock().insert(object);
            if first {
                observer(object);
            }
        }
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for Frame {}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.state.id)
            .field("status", &self.status())
            .field("read_only", &self.state.read_only)
            .field("speculative", &self.state.speculative)
            .field("invalid", &self.state.invalid.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_write_set_order_and_dedup() {
        let frame = Frame::new(3, 1, AHashSet::new(), FrameOptions::new());
        let a = ObjectId::from_raw(10);
        let b = ObjectId::from_raw(11);

        frame.note_write(b);
        frame.note_write(a);
        frame.note_write(b);

        assert_eq!(frame.modified_objects(), vec![b, a]);
        assert!(frame.was_modified(a));
        assert!(!frame.was_modified(ObjectId::from_raw(12)));
    }

    #[test]
    fn test_observers_fire_once_per_object() {
        let reads = Arc::new(AtomicUsize::new(0));
        let writes = Arc::new(AtomicUsize::new(0));
        let options = {
            let reads = reads.clone();
            let writes = writes.clone();
            FrameOptions::new()
                .on_read(move |_| {
                    reads.fetch_add(1, Ordering::SeqCst);
                })
                .on_write(move |_| {
                    writes.fetch_add(1, Ordering::SeqCst);
                })
        };
        let frame = Frame::new(1, 1, AHashSet::new(), options);
        let a = ObjectId::from_raw(1);

        frame.note_read(a);
        frame.note_read(a);
        frame.note_write(a);
        frame.note_write(a);

        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_transition_requires_expected_status() {
        let frame = Frame::new(1, 1, AHashSet::new(), FrameOptions::new());
        assert_eq!(
            frame.transition(FrameStatus::Suspended, FrameStatus::Open),
            Err(FrameStatus::Open)
        );

        frame.set_status(FrameStatus::Suspended);
        assert!(frame.transition(FrameStatus::Suspended, FrameStatus::Open).is_ok());
        assert_eq!(frame.status(), FrameStatus::Open);
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let a = Frame::new(1, 1, AHashSet::new(), FrameOptions::new());
        let b = Frame::new(1, 1, AHashSet::new(), FrameOptions::new());
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
