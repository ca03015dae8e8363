//! Shared progress and cancellation state.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Progress counter and abort flag shared by every evolution worker.
///
/// Progress is a monotonic count of processed reference bases with relaxed
/// visibility (readers only display it). The abort flag is written once and
/// polled often; workers check it at every tree edge and every 128 mutation
/// jumps, so cancellation latency is bounded without synchronizing the hot
/// loop.
#[derive(Debug, Default)]
pub struct EvolveMonitor {
    progress: AtomicU64,
    abort: AtomicBool,
}

impl EvolveMonitor {
    /// Fresh monitor: zero progress, not aborted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add processed bases to the progress counter.
    #[inline]
    pub fn add_progress(&self, bases: u64) {
        self.progress.fetch_add(bases, Ordering::Relaxed);
    }

    /// Current progress in processed bases.
    #[inline]
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Request cooperative cancellation.
    #[inline]
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }
}
