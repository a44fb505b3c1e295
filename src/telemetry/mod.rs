//! Runtime counters for the host scheduler.
//!
//! Compiled to a zero-sized stub unless the `telemetry` feature is on.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::Duration;

    #[derive(Debug, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self { Self }
        pub fn record_spawn(&self) {}
        pub fn record_step(&self, _: u64) {}
        pub fn record_completion(&self) {}
        pub fn record_cancel(&self) {}
        pub fn record_panic(&self) {}
        pub fn record_stop_chains(&self, _: usize) {}
        pub fn snapshot(&self) -> MetricsSnapshot { MetricsSnapshot::default() }
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
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
