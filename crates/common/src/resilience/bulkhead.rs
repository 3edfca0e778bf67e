//! Bulkhead for bounding concurrent dispatches
//!
//! The bulkhead caps how many operations run at once. Callers take a slot
//! with [`Bulkhead::try_acquire`], which never waits: when every slot is
//! taken the caller backs off and tries again later instead of queueing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

/// Metrics for bulkhead monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkheadMetrics {
    /// Slots handed out since creation
    pub acquired: u64,
    /// Acquire attempts refused because the bulkhead was full
    pub rejected: u64,
    /// Slots currently held
    pub current_concurrent: usize,
    /// Maximum concurrent operations allowed
    pub max_concurrent: usize,
}

impl BulkheadMetrics {
    pub fn is_at_capacity(&self) -> bool {
        self.current_concurrent >= self.max_concurrent
    }
}

/// Slot held for the duration of one operation; released on drop.
#[derive(Debug)]
pub struct BulkheadSlot {
    _permit: OwnedSemaphorePermit,
}

/// Fixed-size pool of concurrency slots.
///
/// # Examples
///
/// ```rust
/// use crmsync_common::resilience::Bulkhead;
///
/// let bulkhead = Bulkhead::new(2);
/// let first = bulkhead.try_acquire();
/// let second = bulkhead.try_acquire();
/// assert!(first.is_some() && second.is_some());
/// assert!(bulkhead.try_acquire().is_none());
///
/// drop(first);
/// assert!(bulkhead.try_acquire().is_some());
/// ```
#[derive(Clone)]
pub struct Bulkhead {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    acquired: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl Bulkhead {
    /// Create a bulkhead with `max_concurrent` slots (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            acquired: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Take a slot without waiting. `None` when the bulkhead is full.
    pub fn try_acquire(&self) -> Option<BulkheadSlot> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                self.acquired.fetch_add(1, Ordering::Relaxed);
                Some(BulkheadSlot { _permit: permit })
            }
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                trace!(max_concurrent = self.max_concurrent, "Bulkhead full");
                None
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_concurrent
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get the current number of held slots
    pub fn current_concurrent(&self) -> usize {
        self.max_concurrent.saturating_sub(self.available())
    }

    pub fn metrics(&self) -> BulkheadMetrics {
        BulkheadMetrics {
            acquired: self.acquired.load(Ordering::Acquire),
            rejected: self.rejected.load(Ordering::Acquire),
            current_concurrent: self.current_concurrent(),
            max_concurrent: self.max_concurrent,
        }
    }
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("max_concurrent", &self.max_concurrent)
            .field("current_concurrent", &self.current_concurrent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_zero_capacity_is_clamped() {
        let bulkhead = Bulkhead::new(0);
        assert_eq!(bulkhead.capacity(), 1);
        assert!(bulkhead.try_acquire().is_some());
    }

    #[test]
    fn test_full_bulkhead_rejects_without_waiting() {
        let bulkhead = Bulkhead::new(2);
        let _a = bulkhead.try_acquire().unwrap();
        let _b = bulkhead.try_acquire().unwrap();

        assert!(bulkhead.try_acquire().is_none());
        let metrics = bulkhead.metrics();
        assert_eq!(metrics.acquired, 2);
        assert_eq!(metrics.rejected, 1);
        assert!(metrics.is_at_capacity());
    }

    #[tokio::test]
    async fn test_slot_released_when_task_finishes() {
        let bulkhead = Bulkhead::new(1);
        let slot = bulkhead.try_acquire().unwrap();

        let handle = tokio::spawn(async move {
            let _slot = slot;
            tokio::time::sleep(Duration::from_millis(10)).await;
        });
        assert_eq!(bulkhead.current_concurrent(), 1);

        handle.await.unwrap();
        assert_eq!(bulkhead.current_concurrent(), 0);
        assert!(bulkhead.try_acquire().is_some());
    }

    #[test]
    fn test_clones_share_slots() {
        let bulkhead = Bulkhead::new(1);
        let clone = bulkhead.clone();
        let _slot = bulkhead.try_acquire().unwrap();
        assert!(clone.try_acquire().is_none());
    }
}
