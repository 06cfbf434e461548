//! Frames - snapshot isolation for framed objects
//!
//! Provides OPEN / COMMIT / ABORT / SUSPEND / RESTORE semantics with
//! optimistic concurrency control.
//!
//! Architecture:
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              FrameManager                         │
//! │  - Assigns monotonic frame ids                   │
//! │  - Tracks open (current or suspended) frames     │
//! │  - Coordinates commit/abort                      │
//! ├──────────────────────────────────────────────────┤
//! │  Thread context                                  │
//! │  - Current frame per thread and manager          │
//! │  - Nesting depth, thread-scoped read observers   │
//! ├──────────────────────────────────────────────────┤
//! │  Frame                                           │
//! │  - Invalid set: frames open when it started      │
//! │  - Write set, read/write observers               │
//! ├──────────────────────────────────────────────────┤
//! │  ConflictDetector (OCC)                          │
//! │  - Log of committed write sets                   │
//! │  - Detects write-write conflicts at commit       │
//! │  - First-committer-wins strategy                 │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod conflict;
pub(crate) mod context;
pub mod frame;
pub mod manager;
pub mod observer;


pub use conflict::{ConflictDetector, ConflictResult};
pub use frame::{Frame, FrameId, FrameOptions, FrameStatus};
pub use manager::{frame_manager, FrameManager};
pub use observer::{CommitObserver, CommitObserverHandle, ReadObserver, WriteObserver};
