//! Counters and step latency for a scheduler.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Longest step latency tracked precisely: one minute.
const MAX_TRACKED_NS: u64 = 60_000_000_000;

#[derive(Debug)]
pub struct Metrics {
    units_spawned: AtomicU64,
    steps: AtomicU64,
    units_completed: AtomicU64,
    units_cancelled: AtomicU64,
    units_panicked: AtomicU64,
    stop_chains_dispatched: AtomicU64,

    // None if the histogram could not be built; latency is then not tracked
    step_latency: Option<Mutex<Histogram<u64>>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        let step_latency = Histogram::new_with_bounds(1, MAX_TRACKED_NS, 3)
            .ok()
            .map(Mutex::new);

        Self {
            units_spawned: AtomicU64::new(0),
            steps: AtomicU64::new(0),
            units_completed: AtomicU64::new(0),
            units_cancelled: AtomicU64::new(0),
            units_panicked: AtomicU64::new(0),
            stop_chains_dispatched: AtomicU64::new(0),
            step_latency,
            start_time: Instant::now(),
        }
    }

    pub fn record_spawn(&self) {
        self.units_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_step(&self, duration_ns: u64) {
        self.steps.fetch_add(1, Ordering::Relaxed);

        // contended samples are dropped rather than stalling a step loop
        if let Some(hist) = &self.step_latency {
            if let Some(mut hist) = hist.try_lock() {
                hist.saturating_record(duration_ns.max(1));
            }
        }
    }

    pub fn record_completion(&self) {
        self.units_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancel(&self) {
        self.units_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.units_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stop_chains(&self, count: usize) {
        self.stop_chains_dispatched
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (avg_step_ns, p99_step_ns, max_step_ns) = match &self.step_latency {
            Some(hist) => {
                let hist = hist.lock();
                if hist.is_empty() {
                    (0, 0, 0)
                } else {
                    (
                        hist.mean() as u64,
                        hist.value_at_quantile(0.99),
                        hist.max(),
                    )
                }
            }
            None => (0, 0, 0),
        };

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            units_spawned: self.units_spawned.load(Ordering::Relaxed),
            steps: self.steps.load(Ordering::Relaxed),
            units_completed: self.units_completed.load(Ordering::Relaxed),
            units_cancelled: self.units_cancelled.load(Ordering::Relaxed),
            units_panicked: self.units_panicked.load(Ordering::Relaxed),
            stop_chains_dispatched: self.stop_chains_dispatched.load(Ordering::Relaxed),
            avg_step_ns,
            p99_step_ns,
            max_step_ns,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub units_spawned: u64,
    pub steps: u64,
    pub units_completed: u64,
    pub units_cancelled: u64,
    pub units_panicked: u64,
    pub stop_chains_dispatched: u64,
    pub avg_step_ns: u64,
    pub p99_step_ns: u64,
    pub max_step_ns: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_spawn();
        metrics.record_spawn();
        metrics.record_step(1_000);
        metrics.record_step(3_000);
        metrics.record_completion();
        metrics.record_cancel();
        metrics.record_stop_chains(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.units_spawned, 2);
        assert_eq!(snapshot.steps, 2);
        assert_eq!(snapshot.units_completed, 1);
        assert_eq!(snapshot.units_cancelled, 1);
        assert_eq!(snapshot.stop_chains_dispatched, 2);
        assert!(snapshot.max_step_ns >= 2_990);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.steps, 0);
        assert_eq!(snapshot.avg_step_ns, 0);
    }
}
