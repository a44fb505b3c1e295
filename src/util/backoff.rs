//! Idle backoff for loops polling for more work.

use std::hint::spin_loop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Spins with exponential growth, then yields, then reports completion so
/// the caller can park or sleep.
#[derive(Debug, Default)]
pub struct Backoff {
    step: AtomicUsize,
}

impl Backoff {
    const SPIN_LIMIT: usize = 6;
    const YIELD_LIMIT: usize = 10;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.step.store(0, Ordering::Relaxed);
    }

    pub fn spin(&self) {
        let step = self.step.fetch_add(1, Ordering::Relaxed);

        if step <= Self::SPIN_LIMIT {
            for _ in 0..(1 << step) {
                spin_loop();
            }
        } else {
            thread::yield_now();
        }
    }

    /// Past the yield phase; time to block.
    pub fn is_completed(&self) -> bool {
        self.step.load(Ordering::Relaxed) > Self::YIELD_LIMIT
    }
}
