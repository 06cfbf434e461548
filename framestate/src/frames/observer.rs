//! Observation hooks - read, write and commit observers
//!
//! Read observers report which objects a block of code read, so a caller can
//! re-run that block when one of them changes. Commit observers report which
//! objects a commit made visible. Registrations are scoped: they are released
//! when their guard or handle drops, including during unwinding.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashSet;
use parking_lot::{Mutex, RwLock};

use super::context;
use super::frame::Frame;
use crate::model::ObjectId;

/// Called with the id of an object that was read
pub type ReadObserver = Arc<dyn Fn(ObjectId) + Send + Sync>;

/// Called with the id of an object that was written
pub type WriteObserver = Arc<dyn Fn(ObjectId) + Send + Sync>;

/// Called with the objects a frame committed
pub type CommitObserver = Arc<dyn Fn(&[ObjectId], &Frame) + Send + Sync>;

// ============================================================================
// Thread-scoped read observers
// ============================================================================

/// A read observer registered for the current thread
pub(crate) struct ScopedReadObserver {
    token: u64,
    callback: ReadObserver,
    seen: Mutex<AHashSet<ObjectId>>,
}

impl ScopedReadObserver {
    pub(crate) fn new(token: u64, callback: ReadObserver) -> Self {
        Self {
            token,
            callback,
            seen: Mutex::new(AHashSet::new()),
        }
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    /// Report `object` unless this registration already has
    pub(crate) fn notify(&self, object: ObjectId) {
        let first = self.seen.lock().insert(object);
        if first {
            (self.callback)(object);
        }
    }
}

/// Removes a thread-scoped read observer on drop
///
/// Not `Send`: the registration lives in the registering thread's context.
pub(crate) struct ReadObserverGuard {
    manager_id: u64,
    token: u64,
    _not_send: PhantomData<*const ()>,
}

impl ReadObserverGuard {
    pub(crate) fn new(manager_id: u64, token: u64) -> Self {
        Self {
            manager_id,
            token,
            _not_send: PhantomData,
        }
    }
}

impl Drop for ReadObserverGuard {
    fn drop(&mut self) {
        context::remove_read_observer(self.manager_id, self.token);
    }
}

// ============================================================================
// Commit observers
// ============================================================================

/// Manager-wide commit observer list
#[derive(Default)]
pub(crate) struct CommitObserverRegistry {
    next_token: AtomicU64,
    observers: RwLock<Vec<(u64, CommitObserver)>>,
}

impl CommitObserverRegistry {
    pub(crate) fn register(&self, observer: CommitObserver) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.observers.write().push((token, observer));
        token
    }

    pub(crate) fn unregister(&self, token: u64) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(t, _)| *t != token);
        observers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Call every observer; the list lock is not held during callbacks
    pub(crate) fn notify(&self, objects: &[ObjectId], frame: &Frame) {
        let observers: Vec<CommitObserver> = self
            .observers
            .read()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            observer(objects, frame);
        }
    }
}

/// Registration of a commit observer; unregisters on drop
pub struct CommitObserverHandle {
    registry: Weak<CommitObserverRegistry>,
    token: u64,
}

impl CommitObserverHandle {
    pub(crate) fn new(registry: &Arc<CommitObserverRegistry>, token: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            token,
        }
    }

    /// Unregister now instead of at drop
    pub fn unregister(self) {
        drop(self);
    }
}

impl Drop for CommitObserverHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.token);
        }
    }
}

impl fmt::Debug for CommitObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommitObserverHandle").field("token", &self.token).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
