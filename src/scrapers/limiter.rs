//! Bounded in-flight work.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;

/// Caps how many futures run at once. Cheap to clone; clones share the cap.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max: usize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyLimiter {
    /// Create a limiter allowing `max` concurrent tasks. Returns None for zero.
    pub fn new(max: usize) -> Option<Self> {
        if max == 0 {
            return None;
        }
        Some(Self {
            semaphore: Arc::new(Semaphore::new(max)),
            max,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of tasks observed running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Wait for a slot, then run `task` while holding it.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire only fails if that changes.
        let _permit = self.semaphore.acquire().await;
        let _slot = SlotGuard::enter(self);
        task.await
    }
}

/// Keeps the in-flight count right even when the task panics or is dropped.
struct SlotGuard<'a> {
    in_flight: &'a AtomicUsize,
}

impl<'a> SlotGuard<'a> {
    fn enter(limiter: &'a ConcurrencyLimiter) -> Self {
        let now = limiter.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        limiter.peak.fetch_max(now, Ordering::SeqCst);
        Self {
            in_flight: &limiter.in_flight,
        }
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
