use std::sync::atomic::{AtomicBool, Ordering};

/// Mutual exclusion for reconciliation sweeps
///
/// At most one [`SweepPermit`] exists at a time. A second sweep that starts
/// while one is running gets `None` instead of waiting.
#[derive(Debug, Default)]
pub struct SweepGuard {
    running: AtomicBool,
}

impl SweepGuard {
    /// Create an idle guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the permit if no sweep is running
    pub fn try_acquire(&self) -> Option<SweepPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepPermit {
                running: &self.running,
            })
    }

    /// Whether a sweep currently holds the permit
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Held for the duration of a sweep; released on drop
#[derive(Debug)]
pub struct SweepPermit<'a> {
    running: &'a AtomicBool,
}

impl Drop for SweepPermit<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
