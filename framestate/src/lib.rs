//! Framestate - snapshot isolation for mutable model objects
//!
//! Every framed object keeps several time-ordered versions of its fields
//! ("records"). Code runs inside a *frame*: reads see the records that were
//! committed before the frame opened plus the frame's own writes, writes
//! produce a private record, and commit makes them visible to frames opened
//! afterwards. Two frames that race to write the same object are resolved at
//! commit time: the first committer wins, the second gets
//! [`FrameError::FrameConflict`].
//!
//! ```no_run
//! use framestate::{FrameManager, Model};
//!
//! # fn main() -> framestate::Result<()> {
//! let manager = FrameManager::new();
//! let counter = manager.framed(|| Model::new_in(&manager, 0u32))?;
//!
//! manager.open()?;
//! counter.set(1)?;
//! let pending = manager.suspend()?;
//!
//! // Frames opened meanwhile keep seeing the committed value.
//! assert_eq!(manager.framed(|| counter.get())?, 0);
//!
//! manager.commit_frame(&pending)?;
//! assert_eq!(manager.framed(|| counter.get())?, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod frames;
pub mod model;
pub mod record;

pub use config::{FrameConfig, GcConfig};
pub use frames::{
    frame_manager, CommitObserver, CommitObserverHandle, Frame, FrameId, FrameManager,
    FrameOptions, FrameStatus, ReadObserver, WriteObserver,
};
pub use model::collection::{CollectionCursor, CollectionView, MutableCollection};
pub use model::list::{framed_list_of, FramedList, FramedListIterator, SubListMut};
pub use model::map::{framed_map_of, FramedMap};
pub use model::{Model, ObjectId};
pub use record::gc::GcStats;

/// Frame runtime error type
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Not in a frame")]
    NotInFrame,

    #[error("No record of object {object} is visible to frame {frame}")]
    InvalidRecordAccess { object: ObjectId, frame: FrameId },

    #[error("Frame {frame} aborted: conflicting writes to {objects:?}")]
    FrameConflict { frame: FrameId, objects: Vec<ObjectId> },

    #[error("Frame {0} is read-only")]
    ReadOnlyFrame(FrameId),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("No such element")]
    NoSuchElement,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether this error is a commit-time write conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, FrameError::FrameConflict { .. })
    }

    /// Whether this error reports lifecycle or iterator misuse
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, FrameError::IllegalState(_) | FrameError::NotInFrame)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
