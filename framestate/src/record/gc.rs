//! Garbage Collector - Removes records no frame can select any more
//!
//! Runs on demand or after commits to reclaim records that are shadowed by a
//! version every open frame already sees, and records of aborted frames.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::chain::{Collected, Horizon};
use crate::config::GcConfig;
use crate::frames::FrameId;

// ============================================================================
// Collectable
// ============================================================================

/// A record store the collector can sweep
pub trait Collectable: Send + Sync {
    /// Remove dead records
    fn collect(&self, horizon: &Horizon) -> Collected;

    /// Current number of records
    fn record_count(&self) -> usize;
}

// ============================================================================
// GC Statistics
// ============================================================================

/// Statistics from a GC run
#[derive(Debug, Clone, Default)]
pub struct GcStats {
    /// Number of records removed
    pub records_removed: usize,
    /// Number of objects swept
    pub objects_scanned: usize,
    /// Duration of the GC run
    pub duration: Duration,
    /// Low watermark used for this run
    pub low_watermark: FrameId,
    /// Aborted frame ids still referenced by a surviving record
    pub retained_aborted: Vec<FrameId>,
}

// ============================================================================
// Garbage Collector
// ============================================================================

/// Garbage collector for record chains
///
/// Safety guarantee: never removes a record that an open frame, or a frame
/// opened later, could select.
pub struct GarbageCollector {
    config: GcConfig,
    /// Last GC run time, epoch millis
    last_run: AtomicU64,
    /// Whether a GC is currently in progress
    running: AtomicBool,
    /// Total records removed across all GC runs
    total_removed: AtomicU64,
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl GarbageCollector {
    pub fn with_config(config: GcConfig) -> Self {
        Self {
            config,
            last_run: AtomicU64::new(0),
            running: AtomicBool::new(false),
            total_removed: AtomicU64::new(0),
        }
    }

    /// Check if an automatic GC should run
    pub fn should_run(&self, total_records: u64) -> bool {
        if !self.config.enabled {
            return false;
        }
        if self.running.load(Ordering::Relaxed) {
            return false;
        }
        if total_records < self.config.min_records {
            return false;
        }
        let elapsed = now_millis().saturating_sub(self.last_run.load(Ordering::Relaxed));
        Duration::from_millis(elapsed) >= self.config.interval()
    }

    /// Sweep every object
    ///
    /// Returns None if another sweep is already in progress.
    pub fn run(&self, objects: &[Arc<dyn Collectable>], horizon: &Horizon) -> Option<GcStats> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        let start = Instant::now();
        let (removed, mut retained) = objects
            .par_iter()
            .map(|object| {
                let collected = object.collect(horizon);
                (collected.removed, collected.retained_aborted)
            })
            .reduce(
                || (0, Vec::new()),
                |(a_removed, mut a_retained), (b_removed, b_retained)| {
                    a_retained.extend(b_retained);
                    (a_removed + b_removed, a_retained)
                },
            );
        retained.sort_unstable();
        retained.dedup();

        self.total_removed.fetch_add(removed as u64, Ordering::Relaxed);
        self.last_run.store(now_millis(), Ordering::Relaxed);
        self.running.store(false, Ordering::SeqCst);

        Some(GcStats {
            records_removed: removed,
            objects_scanned: objects.len(),
            duration: start.elapsed(),
            low_watermark: horizon.low_watermark,
            retained_aborted: retained,
        })
    }

    /// Total records removed across all GC runs
    pub fn total_removed(&self) -> u64 {
        self.total_removed.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Tests
// ============================================================================
