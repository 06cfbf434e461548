//! Frame Manager - Lifecycle management for frames
//!
//! Coordinates frame creation, commit, abort, suspend and restore, and owns
//! the shared bookkeeping every framed object consults: the open frame table,
//! the aborted set, the conflict log, observers and the object registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::{AHashMap, AHashSet};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use super::conflict::{ConflictDetector, ConflictResult};
use super::context;
use super::frame::{Frame, FrameId, FrameOptions, FrameStatus};
use super::observer::{
    CommitObserverHandle, CommitObserverRegistry, ReadObserverGuard, ScopedReadObserver,
};
use crate::config::FrameConfig;
use crate::model::ObjectId;
use crate::record::gc::{Collectable, GarbageCollector, GcStats};
use crate::record::Horizon;
use crate::{FrameError, Result};

// ============================================================================
// Manager ID
// ============================================================================

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

static DEFAULT_MANAGER: Lazy<FrameManager> = Lazy::new(FrameManager::new);

/// Process-wide default manager
pub fn frame_manager() -> &'static FrameManager {
    &DEFAULT_MANAGER
}

// ============================================================================
// Open Frame Table
// ============================================================================

struct OpenFrames {
    next_id: FrameId,
    commit_seq: u64,
    /// Open frame id → lowest frame id it cannot see (itself or an invalid frame)
    open: BTreeMap<FrameId, FrameId>,
}

impl OpenFrames {
    fn low_watermark(&self) -> FrameId {
        self.open.values().copied().min().unwrap_or(self.next_id)
    }
}

// ============================================================================
// Shared State
// ============================================================================

pub(crate) struct ManagerShared {
    id: u64,
    config: FrameConfig,
    frames: Mutex<OpenFrames>,
    /// Replaced wholesale on abort so readers can hold a snapshot lock-free
    aborted: RwLock<Arc<AHashSet<FrameId>>>,
    conflict_detector: ConflictDetector,
    commit_observers: Arc<CommitObserverRegistry>,
    next_observer_token: AtomicU64,
    objects: RwLock<AHashMap<ObjectId, Weak<dyn Collectable>>>,
    total_records: AtomicU64,
    gc: GarbageCollector,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
}

impl ManagerShared {
    fn new(config: FrameConfig) -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::SeqCst),
            gc: GarbageCollector::with_config(config.gc.clone()),
            config,
            frames: Mutex::new(OpenFrames {
                next_id: 1,
                commit_seq: 0,
                open: BTreeMap::new(),
            }),
            aborted: RwLock::new(Arc::new(AHashSet::new())),
            conflict_detector: ConflictDetector::new(),
            commit_observers: Arc::new(CommitObserverRegistry::default()),
            next_observer_token: AtomicU64::new(1),
            objects: RwLock::new(AHashMap::new()),
            total_records: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The current frame, which must still be open
    pub(crate) fn access_frame(&self) -> Result<Frame> {
        let frame = context::current(self.id).ok_or(FrameError::NotInFrame)?;
        match frame.status() {
            FrameStatus::Open => Ok(frame),
            status => Err(FrameError::IllegalState(format!(
                "Frame {} is {:?}",
                frame.id(),
                status
            ))),
        }
    }

    pub(crate) fn aborted_snapshot(&self) -> Arc<AHashSet<FrameId>> {
        self.aborted.read().clone()
    }

    pub(crate) fn horizon(&self, aborted: Arc<AHashSet<FrameId>>) -> Horizon {
        let low = self.frames.lock().low_watermark();
        Horizon::new(low, aborted)
    }

    /// Report a read to the frame's observer and this thread's observers
    pub(crate) fn notify_read(&self, frame: &Frame, object: ObjectId) {
        frame.note_read(object);
        for observer in context::read_observers(self.id) {
            observer.notify(object);
        }
    }

    pub(crate) fn register_object(&self, id: ObjectId, object: Weak<dyn Collectable>) {
        self.objects.write().insert(id, object);
        self.total_records.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unregister_object(&self, id: ObjectId, records: usize) {
        self.objects.write().remove(&id);
        self.total_records.fetch_sub(records as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_added(&self) {
        self.total_records.fetch_add(1, Ordering::Relaxed);
    }

    fn create_frame(&self, options: FrameOptions) -> Frame {
        let mut frames = self.frames.lock();
        let id = frames.next_id;
        frames.next_id += 1;
        let invalid: AHashSet<FrameId> = frames.open.keys().copied().collect();
        let floor = invalid.iter().copied().min().map_or(id, |m| m.min(id));
        frames.open.insert(id, floor);
        drop(frames);

        Frame::new(id, self.id, invalid, options)
    }

    /// Must be called with the frame table locked
    fn mark_aborted(&self, frame_id: FrameId) {
        let mut aborted = self.aborted.write();
        let mut next = AHashSet::clone(&aborted);
        next.insert(frame_id);
        *aborted = Arc::new(next);
    }

    fn commit(&self, frame: &Frame) -> Result<()> {
        let id = frame.id();
        let writes = frame.modified_objects();

        let mut frames = self.frames.lock();
        if !frame.is_open() || !frames.open.contains_key(&id) {
            return Err(FrameError::IllegalState(format!(
                "Frame {} is already {:?}",
                id,
                frame.status()
            )));
        }

        if !writes.is_empty() {
            let result = self
                .conflict_detector
                .validate(id, frame.invalid_frames(), &writes);
            if let ConflictResult::WriteWriteConflict {
                objects,
                conflicting_frames,
            } = result
            {
                frames.open.remove(&id);
                self.mark_aborted(id);
                frame.set_status(FrameStatus::Aborted);
                let low = frames.low_watermark();
                drop(frames);

                self.conflict_detector.advance_watermark(low);
                self.total_aborted.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Frame {} aborted on commit: {} object(s) also written by frame(s) {:?}",
                    id,
                    objects.len(),
                    conflicting_frames
                );
                return Err(FrameError::FrameConflict { frame: id, objects });
            }

            frames.commit_seq += 1;
            self.conflict_detector
                .record_commit(id, frames.commit_seq, &writes);
        }

        frames.open.remove(&id);
        frame.set_status(FrameStatus::Committed);
        let low = frames.low_watermark();
        drop(frames);

        self.conflict_detector.advance_watermark(low);
        self.total_committed.fetch_add(1, Ordering::Relaxed);
        log::debug!("Committed frame {} ({} object(s) written)", id, writes.len());

        if !writes.is_empty() {
            self.commit_observers.notify(&writes, frame);
        }
        self.maybe_collect();
        Ok(())
    }

    fn abort(&self, frame: &Frame) -> Result<()> {
        let id = frame.id();
        let mut frames = self.frames.lock();
        if !frame.is_open() || frames.open.remove(&id).is_none() {
            return Err(FrameError::IllegalState(format!(
                "Frame {} is already {:?}",
                id,
                frame.status()
            )));
        }
        self.mark_aborted(id);
        frame.set_status(FrameStatus::Aborted);
        let low = frames.low_watermark();
        drop(frames);

        self.conflict_detector.advance_watermark(low);
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
        log::debug!("Aborted frame {}", id);
        Ok(())
    }

    fn live_objects(&self) -> Vec<Arc<dyn Collectable>> {
        let mut objects = self.objects.write();
        objects.retain(|_, o| o.strong_count() > 0);
        objects.values().filter_map(Weak::upgrade).collect()
    }

    fn collect_garbage(&self) -> Option<GcStats> {
        let objects = self.live_objects();
        let horizon = self.horizon(self.aborted_snapshot());
        let stats = self.gc.run(&objects, &horizon)?;
        self.total_records
            .fetch_sub(stats.records_removed as u64, Ordering::Relaxed);

        // Aborted ids below the watermark that no record carries can be forgotten.
        let retained: AHashSet<FrameId> = stats.retained_aborted.iter().copied().collect();
        {
            let mut aborted = self.aborted.write();
            let pruned: AHashSet<FrameId> = aborted
                .iter()
                .copied()
                .filter(|f| *f >= horizon.low_watermark || retained.contains(f))
                .collect();
            if pruned.len() != aborted.len() {
                *aborted = Arc::new(pruned);
            }
        }

        log::debug!(
            "Record GC removed {} record(s) from {} object(s) in {:?}",
            stats.records_removed,
            stats.objects_scanned,
            stats.duration
        );
        Some(stats)
    }

    fn maybe_collect(&self) {
        if self.gc.should_run(self.total_records.load(Ordering::Relaxed)) {
            self.collect_garbage();
        }
    }
}

// ============================================================================
// Frame Manager
// ============================================================================

/// Central frame manager
///
/// Frame lifecycle:
/// 1. OPEN: assign an id, remember which frames are still open
/// 2. READ/WRITE: framed objects resolve records against the current frame
/// 3. COMMIT: validate (OCC), make writes visible, notify commit observers
/// 4. ABORT: mark the id aborted so its records are never selected
///
/// A manager is a cheap handle; clones share state. Each thread has at most
/// one current frame per manager.
#[derive(Clone)]
pub struct FrameManager {
    shared: Arc<ManagerShared>,
}

impl FrameManager {
    /// Create a new frame manager with default configuration
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            shared: Arc::new(ManagerShared::new(config)),
        }
    }

    pub(crate) fn from_shared(shared: Arc<ManagerShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<ManagerShared> {
        &self.shared
    }

    /// Unique id of this manager within the process
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn config(&self) -> &FrameConfig {
        &self.shared.config
    }

    // ========================================================================
    // Frame Lifecycle
    // ========================================================================

    /// Open a frame on this thread
    ///
    /// If a frame is already current, the call re-enters it and must be paired
    /// with its own `commit` or `abort`.
    pub fn open(&self) -> Result<()> {
        self.open_with(FrameOptions::default())
    }

    pub fn open_read_only(&self) -> Result<()> {
        self.open_with(FrameOptions::new().read_only())
    }

    /// Open a speculative frame on this thread
    ///
    /// Its writes are visible only inside it. Committing it aborts it, so its
    /// records are reused like those of any aborted frame.
    pub fn speculate(&self) -> Result<()> {
        self.open_with(FrameOptions::new().speculative())
    }

    /// Open a frame with observers or read-only mode
    ///
    /// Options are ignored when re-entering an already current frame.
    pub fn open_with(&self, options: FrameOptions) -> Result<()> {
        if options.speculative {
            if let Some(current) = context::current(self.id()) {
                return Err(FrameError::IllegalState(format!(
                    "Cannot speculate inside frame {}",
                    current.id()
                )));
            }
        }
        if context::enter_nested(self.id()) {
            log::trace!("Re-entered current frame at depth {}", context::depth(self.id()));
            return Ok(());
        }
        let frame = self.shared.create_frame(options);
        log::debug!("Opened frame {}", frame.id());
        context::install(self.id(), frame);
        Ok(())
    }

    /// Commit the current frame
    ///
    /// Inside a re-entered frame this only leaves one nesting level.
    pub fn commit(&self) -> Result<()> {
        let frame = context::current(self.id()).ok_or(FrameError::NotInFrame)?;
        if context::leave_nested(self.id()) {
            return Ok(());
        }
        self.commit_frame(&frame)
    }

    /// Commit a specific frame, typically a suspended one
    ///
    /// A speculative frame is aborted instead.
    pub fn commit_frame(&self, frame: &Frame) -> Result<()> {
        self.check_owner(frame)?;
        let result = if frame.is_speculative() {
            log::debug!("Discarding speculative frame {}", frame.id());
            self.shared.abort(frame)
        } else {
            self.shared.commit(frame)
        };
        if !frame.is_open() {
            context::clear_if(self.id(), frame.id());
        }
        result
    }

    /// Abort the current frame, discarding its writes
    ///
    /// Aborting a re-entered frame aborts the whole shared frame.
    pub fn abort(&self) -> Result<()> {
        let frame = context::current(self.id()).ok_or(FrameError::NotInFrame)?;
        self.abort_frame(&frame)
    }

    /// Abort a specific frame, typically a suspended one
    pub fn abort_frame(&self, frame: &Frame) -> Result<()> {
        self.check_owner(frame)?;
        let result = self.shared.abort(frame);
        if !frame.is_open() {
            context::clear_if(self.id(), frame.id());
        }
        result
    }

    /// Detach the current frame without committing or aborting it
    pub fn suspend(&self) -> Result<Frame> {
        let frame = context::current(self.id()).ok_or(FrameError::NotInFrame)?;
        if context::depth(self.id()) > 0 {
            return Err(FrameError::IllegalState(format!(
                "Cannot suspend frame {} while it is re-entered",
                frame.id()
            )));
        }
        frame
            .transition(FrameStatus::Open, FrameStatus::Suspended)
            .map_err(|status| {
                FrameError::IllegalState(format!("Frame {} is {:?}", frame.id(), status))
            })?;
        context::take(self.id());
        log::debug!("Suspended frame {}", frame.id());
        Ok(frame)
    }

    /// Make a suspended frame current on this thread
    pub fn restore(&self, frame: &Frame) -> Result<()> {
        self.check_owner(frame)?;
        if let Some(current) = context::current(self.id()) {
            return Err(FrameError::IllegalState(format!(
                "Cannot restore frame {} while frame {} is open",
                frame.id(),
                current.id()
            )));
        }
        frame
            .transition(FrameStatus::Suspended, FrameStatus::Open)
            .map_err(|status| {
                FrameError::IllegalState(format!(
                    "Frame {} is {:?}, not suspended",
                    frame.id(),
                    status
                ))
            })?;
        context::install(self.id(), frame.clone());
        log::debug!("Restored frame {}", frame.id());
        Ok(())
    }

    /// Whether a frame is current on this thread
    pub fn is_in_frame(&self) -> bool {
        context::current(self.id()).is_some()
    }

    pub fn current_frame(&self) -> Option<Frame> {
        context::current(self.id())
    }

    /// Run `f` in the current frame, or in a new frame committed afterwards
    ///
    /// A new frame is aborted if `f` returns an error or panics.
    pub fn framed<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        if self.is_in_frame() {
            return f();
        }
        self.open()?;
        let frame = self.current_frame().ok_or(FrameError::NotInFrame)?;
        let mut guard = AbortOnUnwind {
            manager: self,
            frame: Some(frame.clone()),
        };
        let result = f();
        guard.frame = None;

        match result {
            Ok(value) => {
                // The block may have ended or suspended the frame itself.
                if frame.status() == FrameStatus::Open {
                    self.commit_frame(&frame)?;
                }
                Ok(value)
            }
            Err(e) => {
                if frame.is_open() {
                    if let Err(abort_err) = self.abort_frame(&frame) {
                        log::error!("Failed to abort frame {}: {}", frame.id(), abort_err);
                    }
                }
                Err(e)
            }
        }
    }

    /// Run `f` in a new speculative frame and discard its writes
    pub fn speculation<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        self.speculate()?;
        let frame = self.current_frame().ok_or(FrameError::NotInFrame)?;
        let mut guard = AbortOnUnwind {
            manager: self,
            frame: Some(frame.clone()),
        };
        let result = f();
        guard.frame = None;

        if frame.is_open() {
            self.abort_frame(&frame)?;
        }
        result
    }

    /// Run `f` with no current frame, restoring the current one afterwards
    pub fn unframed<R>(&self, f: impl FnOnce() -> R) -> Result<R> {
        if !self.is_in_frame() {
            return Ok(f());
        }
        let frame = self.suspend()?;
        let mut guard = RestoreOnUnwind {
            manager: self,
            frame: Some(frame.clone()),
        };
        let result = f();
        guard.frame = None;
        self.restore(&frame)?;
        Ok(result)
    }

    fn check_owner(&self, frame: &Frame) -> Result<()> {
        if frame.manager_id() != self.id() {
            return Err(FrameError::IllegalState(format!(
                "Frame {} belongs to another manager",
                frame.id()
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Report every object read on this thread while `block` runs
    ///
    /// `on_read` is called once per distinct object, with `scope` passed
    /// through. Registrations nest: every active observer is notified.
    pub fn observe_reads<S, R>(
        &self,
        scope: S,
        on_read: impl Fn(&S, ObjectId) + Send + Sync + 'static,
        block: impl FnOnce() -> R,
    ) -> R
    where
        S: Send + Sync + 'static,
    {
        self.observe_all_reads(move |object| on_read(&scope, object), block)
    }

    /// Report every object read on this thread while `block` runs, across frames
    pub fn observe_all_reads<R>(
        &self,
        on_read: impl Fn(ObjectId) + Send + Sync + 'static,
        block: impl FnOnce() -> R,
    ) -> R {
        let token = self.shared.next_observer_token.fetch_add(1, Ordering::Relaxed);
        context::push_read_observer(
            self.id(),
            Arc::new(ScopedReadObserver::new(token, Arc::new(on_read))),
        );
        let _guard = ReadObserverGuard::new(self.id(), token);
        block()
    }

    /// Report every successful commit while `block` runs
    pub fn observe_commit<R>(
        &self,
        on_commit: impl Fn(&[ObjectId], &Frame) + Send + Sync + 'static,
        block: impl FnOnce() -> R,
    ) -> R {
        let _handle = self.register_commit_observer(on_commit);
        block()
    }

    /// Register a commit observer until the returned handle is dropped
    ///
    /// Observers are called after every commit that wrote at least one object.
    pub fn register_commit_observer(
        &self,
        on_commit: impl Fn(&[ObjectId], &Frame) + Send + Sync + 'static,
    ) -> CommitObserverHandle {
        let token = self.shared.commit_observers.register(Arc::new(on_commit));
        CommitObserverHandle::new(&self.shared.commit_observers, token)
    }

    // ========================================================================
    // Garbage Collection
    // ========================================================================

    /// Remove every record no open or future frame can select
    ///
    /// Returns None if a collection is already running.
    pub fn collect_garbage(&self) -> Option<GcStats> {
        self.shared.collect_garbage()
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    /// Number of open (current or suspended) frames
    pub fn open_count(&self) -> usize {
        self.shared.frames.lock().open.len()
    }

    pub fn total_committed(&self) -> u64 {
        self.shared.total_committed.load(Ordering::Relaxed)
    }

    pub fn total_aborted(&self) -> u64 {
        self.shared.total_aborted.load(Ordering::Relaxed)
    }

    /// Committed write sets still needed for conflict detection
    pub fn committed_write_count(&self) -> usize {
        self.shared.conflict_detector.committed_write_count()
    }

    /// Number of aborted frame ids still tracked
    pub fn aborted_count(&self) -> usize {
        self.shared.aborted.read().len()
    }

    /// Number of live framed objects
    pub fn live_object_count(&self) -> usize {
        self.shared.objects.read().values().filter(|o| o.strong_count() > 0).count()
    }

    /// Records removed by garbage collection so far
    pub fn gc_records_removed(&self) -> u64 {
        self.shared.gc.total_removed()
    }

    /// Records held by all live framed objects
    pub fn total_records(&self) -> u64 {
        self.shared.total_records.load(Ordering::Relaxed)
    }

    /// Number of registered commit observers
    pub fn commit_observer_count(&self) -> usize {
        self.shared.commit_observers.len()
    }
}

impl Default for FrameManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FrameManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameManager")
            .field("id", &self.shared.id)
            .field("open", &self.open_count())
            .field("committed", &self.total_committed())
            .field("aborted", &self.total_aborted())
            .finish()
    }
}

// ============================================================================
// Unwind Guards
// ============================================================================

struct AbortOnUnwind<'a> {
    manager: &'a FrameManager,
    frame: Option<Frame>,
}

impl Drop for AbortOnUnwind<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            if frame.is_open() {
                let _ = self.manager.abort_frame(&frame);
            }
        }
    }
}

struct RestoreOnUnwind<'a> {
    manager: &'a FrameManager,
    frame: Option<Frame>,
}

impl Drop for RestoreOnUnwind<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            if !self.manager.is_in_frame() {
                let _ = self.manager.restore(&frame);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_commit() {
        let mgr = FrameManager::new();
        assert!(!mgr.is_in_frame());

        mgr.open().unwrap();
        assert!(mgr.is_in_frame());
        assert_eq!(mgr.open_count(), 1);

        mgr.commit().unwrap();
        assert!(!mgr.is_in_frame());
        assert_eq!(mgr.open_count(), 0);
        assert_eq!(mgr.total_committed(), 1);
    }

    #[test]
    fn test_open_abort() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let frame = mgr.current_frame().unwrap();
        mgr.abort().unwrap();

        assert_eq!(frame.status(), FrameStatus::Aborted);
        assert_eq!(mgr.total_aborted(), 1);
        assert_eq!(mgr.aborted_count(), 1);
    }

    #[test]
    fn test_frame_ids_are_monotonic() {
        let mgr = FrameManager::new();
        let mut last = 0;
        for _ in 0..5 {
            mgr.open().unwrap();
            let id = mgr.current_frame().unwrap().id();
            assert!(id > last);
            last = id;
            mgr.commit().unwrap();
        }
    }

    #[test]
    fn test_commit_without_frame() {
        let mgr = FrameManager::new();
        assert!(matches!(mgr.commit(), Err(FrameError::NotInFrame)));
        assert!(matches!(mgr.abort(), Err(FrameError::NotInFrame)));
        assert!(matches!(mgr.suspend(), Err(FrameError::NotInFrame)));
    }

    #[test]
    fn test_nested_open_shares_frame() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let outer = mgr.current_frame().unwrap();

        mgr.open().unwrap();
        assert_eq!(mgr.current_frame().unwrap(), outer);
        mgr.commit().unwrap();

        // Inner commit only left the nesting level
        assert!(mgr.is_in_frame());
        assert_eq!(outer.status(), FrameStatus::Open);

        mgr.commit().unwrap();
        assert_eq!(outer.status(), FrameStatus::Committed);
        assert!(!mgr.is_in_frame());
    }

    #[test]
    fn test_suspend_restore() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let frame = mgr.suspend().unwrap();
        assert!(!mgr.is_in_frame());
        assert_eq!(frame.status(), FrameStatus::Suspended);
        assert_eq!(mgr.open_count(), 1);

        mgr.restore(&frame).unwrap();
        assert_eq!(mgr.current_frame().unwrap(), frame);
        mgr.commit().unwrap();
        assert_eq!(frame.status(), FrameStatus::Committed);
    }

    #[test]
    fn test_restore_while_open_fails() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let suspended = mgr.suspend().unwrap();

        mgr.open().unwrap();
        let err = mgr.restore(&suspended).unwrap_err();
        assert!(err.is_illegal_state());
        mgr.commit().unwrap();

        mgr.restore(&suspended).unwrap();
        mgr.commit().unwrap();
    }

    #[test]
    fn test_restore_requires_suspended_frame() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let frame = mgr.suspend().unwrap();
        mgr.commit_frame(&frame).unwrap();

        assert!(mgr.restore(&frame).unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_double_commit_fails() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let frame = mgr.suspend().unwrap();

        mgr.commit_frame(&frame).unwrap();
        assert!(mgr.commit_frame(&frame).unwrap_err().is_illegal_state());
        assert!(mgr.abort_frame(&frame).unwrap_err().is_illegal_state());
    }

    #[test]
    fn test_frame_from_other_manager_rejected() {
        let a = FrameManager::new();
        let b = FrameManager::new();
        a.open().unwrap();
        let frame = a.suspend().unwrap();

        assert!(b.restore(&frame).unwrap_err().is_illegal_state());
        assert!(b.commit_frame(&frame).unwrap_err().is_illegal_state());
        a.abort_frame(&frame).unwrap();
    }

    #[test]
    fn test_managers_have_independent_frames() {
        let a = FrameManager::new();
        let b = FrameManager::new();
        a.open().unwrap();
        assert!(a.is_in_frame());
        assert!(!b.is_in_frame());
        a.commit().unwrap();
    }

    #[test]
    fn test_framed_commits_on_ok() {
        let mgr = FrameManager::new();
        let id = mgr
            .framed(|| Ok(mgr.current_frame().unwrap()))
            .unwrap();
        assert_eq!(id.status(), FrameStatus::Committed);
        assert!(!mgr.is_in_frame());
    }

    #[test]
    fn test_framed_aborts_on_err() {
        let mgr = FrameManager::new();
        let mut seen = None;
        let result: Result<()> = mgr.framed(|| {
            seen = mgr.current_frame();
            Err(FrameError::IllegalState("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(seen.unwrap().status(), FrameStatus::Aborted);
        assert!(!mgr.is_in_frame());
    }

    #[test]
    fn test_framed_aborts_on_panic() {
        let mgr = FrameManager::new();
        let frame = Arc::new(Mutex::new(None));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = mgr.framed(|| {
                *frame.lock() = mgr.current_frame();
                panic!("inside frame");
            });
        }));
        assert!(outcome.is_err());
        let frame = frame.lock().clone().unwrap();
        assert_eq!(frame.status(), FrameStatus::Aborted);
        assert!(!mgr.is_in_frame());
    }

    #[test]
    fn test_framed_reuses_current_frame() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let outer = mgr.current_frame().unwrap();
        let inner = mgr.framed(|| Ok(mgr.current_frame().unwrap())).unwrap();
        assert_eq!(inner, outer);
        assert_eq!(outer.status(), FrameStatus::Open);
        mgr.commit().unwrap();
    }

    #[test]
    fn test_unframed_restores_frame() {
        let mgr = FrameManager::new();
        mgr.open().unwrap();
        let outer = mgr.current_frame().unwrap();

        let inside = mgr.unframed(|| mgr.is_in_frame()).unwrap();
        assert!(!inside);
        assert_eq!(mgr.current_frame().unwrap(), outer);
        mgr.commit().unwrap();
    }

    #[test]
    fn test_commit_observer_handle_scope() {
        let mgr = FrameManager::new();
        let handle = mgr.register_commit_observer(|_, _| {});
        assert_eq!(mgr.commit_observer_count(), 1);
        handle.unregister();
        assert_eq!(mgr.commit_observer_count(), 0);

        mgr.observe_commit(|_, _| {}, || {
            assert_eq!(mgr.commit_observer_count(), 1);
        });
        assert_eq!(mgr.commit_observer_count(), 0);
    }

    #[test]
    fn test_default_manager_is_shared() {
        assert_eq!(frame_manager().id(), frame_manager().id());
    }
}
