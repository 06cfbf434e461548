//! Thread context - the current frame of each thread, per manager
//!
//! Keyed by manager id so independent managers in one process never see each
//! other's frames.

use std::cell::RefCell;
use std::sync::Arc;

use ahash::AHashMap;

use super::frame::Frame;
use super::observer::ScopedReadObserver;

#[derive(Default)]
struct ThreadFrames {
    current: Option<Frame>,
    /// Number of re-entrant opens sharing `current`
    depth: usize,
    read_observers: Vec<Arc<ScopedReadObserver>>,
}

impl ThreadFrames {
    fn is_idle(&self) -> bool {
        self.current.is_none() && self.read_observers.is_empty()
    }
}

thread_local! {
    static THREAD_FRAMES: RefCell<AHashMap<u64, ThreadFrames>> =
        RefCell::new(AHashMap::new());
}

fn with_entry<R>(manager_id: u64, f: impl FnOnce(&mut ThreadFrames) -> R) -> R {
    THREAD_FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let entry = frames.entry(manager_id).or_default();
        let result = f(entry);
        if entry.is_idle() {
            frames.remove(&manager_id);
        }
        result
    })
}

/// Current frame of this thread
pub(crate) fn current(manager_id: u64) -> Option<Frame> {
    THREAD_FRAMES.with(|frames| {
        frames
            .borrow()
            .get(&manager_id)
            .and_then(|entry| entry.current.clone())
    })
}

/// Make `frame` current at nesting depth zero
pub(crate) fn install(manager_id: u64, frame: Frame) {
    with_entry(manager_id, |entry| {
        entry.current = Some(frame);
        entry.depth = 0;
    });
}

/// Detach the current frame
pub(crate) fn take(manager_id: u64) -> Option<Frame> {
    with_entry(manager_id, |entry| {
        entry.depth = 0;
        entry.current.take()
    })
}

/// Detach the current frame if it is `frame_id`
pub(crate) fn clear_if(manager_id: u64, frame_id: u64) -> bool {
    with_entry(manager_id, |entry| match &entry.current {
        Some(frame) if frame.id() == frame_id => {
            entry.current = None;
            entry.depth = 0;
            true
        }
        _ => false,
    })
}

/// Re-enter the current frame; false if none is current
pub(crate) fn enter_nested(manager_id: u64) -> bool {
    with_entry(manager_id, |entry| {
        if entry.current.is_some() {
            entry.depth += 1;
            true
        } else {
            false
        }
    })
}

/// Leave one nesting level; false if already at the outermost level
pub(crate) fn leave_nested(manager_id: u64) -> bool {
    with_entry(manager_id, |entry| {
        if entry.depth > 0 {
            entry.depth -= 1;
            true
        } else {
            false
        }
    })
}

pub(crate) fn depth(manager_id: u64) -> usize {
    THREAD_FRAMES.with(|frames| frames.borrow().get(&manager_id).map_or(0, |e| e.depth))
}

pub(crate) fn push_read_observer(manager_id: u64, observer: Arc<ScopedReadObserver>) {
    with_entry(manager_id, |entry| entry.read_observers.push(observer));
}

pub(crate) fn remove_read_observer(manager_id: u64, token: u64) {
    // The thread-local may already be gone when a guard drops during thread exit.
    let _ = THREAD_FRAMES.try_with(|frames| {
        let mut frames = frames.borrow_mut();
        if let Some(entry) = frames.get_mut(&manager_id) {
            entry.read_observers.retain(|o| o.token() != token);
            if entry.is_idle() {
                frames.remove(&manager_id);
            }
        }
    });
}

/// Read observers registered on this thread, outermost first
pub(crate) fn read_observers(manager_id: u64) -> Vec<Arc<ScopedReadObserver>> {
    THREAD_FRAMES.with(|frames| {
        frames
            .borrow()
            .get(&manager_id)
            .map(|entry| entry.read_observers.clone())
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::frame::FrameOptions;
    use ahash::AHashSet;

    // Manager ids far outside the range real managers use in this process.
    const M1: u64 = u64::MAX - 1;
    const M2: u64 = u64::MAX - 2;

    fn frame(id: u64) -> Frame {
        Frame::new(id, M1, AHashSet::new(), FrameOptions::new())
    }

    #[test]
    fn test_managers_are_isolated() {
        install(M1, frame(1));
        assert!(current(M1).is_some());
        assert!(current(M2).is_none());
        assert_eq!(take(M1).map(|f| f.id()), Some(1));
        assert!(current(M1).is_none());
    }

    #[test]
    fn test_nesting_depth() {
        assert!(!enter_nested(M1));
        install(M1, frame(2));
        assert!(enter_nested(M1));
        assert!(enter_nested(M1));
        assert_eq!(depth(M1), 2);
        assert!(leave_nested(M1));
        assert!(leave_nested(M1));
        assert!(!leave_nested(M1));
        assert!(clear_if(M1, 2));
        assert!(current(M1).is_none());
    }

    #[test]
    fn test_clear_if_other_frame_is_noop() {
        install(M2, frame(3));
        assert!(!clear_if(M2, 4));
        assert!(current(M2).is_some());
        take(M2);
    }

    #[test]
    fn test_frames_are_thread_local() {
        install(M1, frame(5));
        let seen = std::thread::spawn(|| current(M1).is_some()).join().unwrap();
        assert!(!seen);
        take(M1);
    }
}
