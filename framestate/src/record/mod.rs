//! Record storage - versioned field values for framed objects
//!
//! Architecture:
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              RecordChain                          │
//! │  - One arena of records per framed object        │
//! │  - Each record: (frame_id, value)                │
//! │  - Visibility picks the newest visible record    │
//! ├──────────────────────────────────────────────────┤
//! │  Horizon                                         │
//! │  - Lowest frame id any open frame cannot see     │
//! │  - Aborted frame ids                             │
//! │  - Decides which records are dead                │
//! ├──────────────────────────────────────────────────┤
//! │  GarbageCollector                                │
//! │  - Sweeps dead records from every live object    │
//! │  - Prunes aborted ids no record carries          │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod chain;
pub mod gc;

pub use chain::{Horizon, Record, RecordChain, Visibility};
pub use gc::{GarbageCollector, GcStats};
