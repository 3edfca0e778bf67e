//! Dispatch metrics for the queue processor and reclaimer
//!
//! ## Design
//! - **Relaxed ordering** for independent counters; nothing is derived from
//!   two counters at once
//! - **Snapshot** copies every counter into a serializable struct

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by the processor and reclaimer.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    ticks: AtomicU64,
    claimed: AtomicU64,
    completed: AtomicU64,
    retry_scheduled: AtomicU64,
    failed_terminal: AtomicU64,
    timeouts: AtomicU64,
    panics: AtomicU64,
    capacity_skips: AtomicU64,
    reclaimed: AtomicU64,
}

/// Point-in-time copy of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchMetricsSnapshot {
    pub ticks: u64,
    pub claimed: u64,
    pub completed: u64,
    pub retry_scheduled: u64,
    pub failed_terminal: u64,
    pub timeouts: u64,
    pub panics: u64,
    pub capacity_skips: u64,
    pub reclaimed: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_claimed(&self) {
        self.claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry_scheduled(&self) {
        self.retry_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_terminal(&self) {
        self.failed_terminal.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capacity_skips(&self, count: usize) {
        self.capacity_skips.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_reclaimed(&self, count: usize) {
        self.reclaimed.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            claimed: self.claimed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            retry_scheduled: self.retry_scheduled.load(Ordering::Relaxed),
            failed_terminal: self.failed_terminal.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
            capacity_skips: self.capacity_skips.load(Ordering::Relaxed),
            reclaimed: self.reclaimed.load(Ordering::Relaxed),
        }
    }
}
