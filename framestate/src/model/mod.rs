//! Framed objects
//!
//! A [`Model`] is the explicit "framed field" wrapper: every read and write of
//! its value goes through the current frame, which selects or produces the
//! right record. Collections build on it in [`list`] and [`map`].

pub mod collection;
pub mod list;
pub mod map;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::frames::context;
use crate::frames::manager::ManagerShared;
use crate::frames::{frame_manager, Frame, FrameId, FrameManager};
use crate::record::chain::Collected;
use crate::record::gc::Collectable;
use crate::record::{Horizon, RecordChain};
use crate::{FrameError, Result};

// ============================================================================
// Object ID
// ============================================================================

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a framed object, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u64) -> Self {
        ObjectId(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Model
// ============================================================================

struct ModelInner<T> {
    id: ObjectId,
    shared: Arc<ManagerShared>,
    chain: RwLock<RecordChain<T>>,
}

impl<T: Send + Sync> Collectable for ModelInner<T> {
    fn collect(&self, horizon: &Horizon) -> Collected {
        self.chain.write().collect(horizon)
    }

    fn record_count(&self) -> usize {
        self.chain.read().len()
    }
}

impl<T> Drop for ModelInner<T> {
    fn drop(&mut self) {
        let records = self.chain.get_mut().len();
        self.shared.unregister_object(self.id, records);
    }
}

/// Handle to a framed value
///
/// Clones share the same object. Every access requires an open frame of the
/// manager the object was created in.
pub struct Model<T> {
    inner: Arc<ModelInner<T>>,
}

impl<T: Send + Sync + 'static> Model<T> {
    /// Create an object in the current frame of the default manager
    pub fn new(value: T) -> Result<Self> {
        Self::new_in(frame_manager(), value)
    }

    /// Create an object in the current frame of `manager`
    ///
    /// Creation counts as a write: frames that cannot see the current frame
    /// cannot read the object either.
    pub fn new_in(manager: &FrameManager, value: T) -> Result<Self> {
        let shared = manager.shared().clone();
        let frame = shared.access_frame()?;
        if frame.is_read_only() {
            return Err(FrameError::ReadOnlyFrame(frame.id()));
        }

        let id = ObjectId::next();
        let inner = Arc::new(ModelInner {
            id,
            shared: shared.clone(),
            chain: RwLock::new(RecordChain::new(frame.id(), value)),
        });
        let weak: Weak<ModelInner<T>> = Arc::downgrade(&inner);
        let weak: Weak<dyn Collectable> = weak;
        shared.register_object(id, weak);
        log::trace!("Created object {} in frame {}", id, frame.id());

        frame.note_write(id);
        Ok(Self { inner })
    }
}

impl<T> Model<T> {
    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    /// Manager the object belongs to
    pub fn manager(&self) -> FrameManager {
        FrameManager::from_shared(self.inner.shared.clone())
    }

    /// Run `f` on the value visible to the current frame
    ///
    /// The object stays locked while `f` runs, so `f` must not access this
    /// object again; doing so deadlocks.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let shared = &self.inner.shared;
        let frame = shared.access_frame()?;
        let aborted = shared.aborted_snapshot();

        let result = {
            let chain = self.inner.chain.read();
            let index = self.resolve(&chain, &frame, &aborted)?;
            f(chain.value(index))
        };

        shared.notify_read(&frame, self.inner.id);
        Ok(result)
    }

    /// Whether the current frame has written this object
    pub fn was_modified(&self) -> bool {
        context::current(self.inner.shared.id())
            .map_or(false, |frame| frame.was_modified(self.inner.id))
    }

    /// Number of records currently held
    pub fn record_count(&self) -> usize {
        self.inner.chain.read().len()
    }

    /// Frame ids of the records currently held, in storage order
    pub fn record_frames(&self) -> Vec<FrameId> {
        self.inner
            .chain
            .read()
            .records()
            .iter()
            .map(|r| r.frame_id())
            .collect()
    }

    pub(crate) fn current_frame_id(&self) -> Option<FrameId> {
        context::current(self.inner.shared.id()).map(|frame| frame.id())
    }

    fn resolve(
        &self,
        chain: &RecordChain<T>,
        frame: &Frame,
        aborted: &ahash::AHashSet<FrameId>,
    ) -> Result<usize> {
        chain
            .resolve(&frame.visibility(aborted))
            .ok_or(FrameError::InvalidRecordAccess {
                object: self.inner.id,
                frame: frame.id(),
            })
    }
}

impl<T: Clone> Model<T> {
    /// Run `f` on a value private to the current frame
    ///
    /// The first write in a frame copies the visible value into a record
    /// stamped with the frame id, reusing a dead record when one exists. Later
    /// writes in the same frame update that record in place.
    ///
    /// As with [`Model::read`], `f` runs under the object's lock and must not
    /// touch this object.
    pub fn write<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let shared = &self.inner.shared;
        let frame = shared.access_frame()?;
        if frame.is_read_only() {
            return Err(FrameError::ReadOnlyFrame(frame.id()));
        }
        let aborted = shared.aborted_snapshot();

        let result = {
            let mut chain = self.inner.chain.write();
            let mut index = self.resolve(&chain, &frame, &aborted)?;

            if chain.frame_of(index) != frame.id() {
                let value = chain.copy_value(index);
                let horizon = shared.horizon(aborted);
                let (stamped, reused) = chain.stamp(frame.id(), value, &horizon);
                if reused {
                    log::trace!("Frame {} reused a record of {}", frame.id(), self.inner.id);
                } else {
                    shared.record_added();
                    log::trace!("Frame {} appended a record to {}", frame.id(), self.inner.id);
                }
                index = stamped;
            }
            f(chain.value_mut(index))
        };

        frame.note_write(self.inner.id);
        Ok(result)
    }

    /// Copy of the value visible to the current frame
    pub fn get(&self) -> Result<T> {
        self.read(T::clone)
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.write(|v| *v = value)
    }
}

impl<T> Clone for Model<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PartialEq for Model<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for Model<T> {}

impl<T> Hash for Model<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl<T> fmt::Debug for Model<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.inner.id)
            .field("records", &self.record_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
