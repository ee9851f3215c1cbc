//! Queue observability.
//!
//! With the `telemetry` feature the queue keeps atomic counters and a latency
//! histogram of task run times. Without it the same API compiles to no-ops.

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub use metrics::{Metrics, MetricsSnapshot};

// Stub implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use std::time::Duration;

    #[derive(Debug, Clone, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self {
            Self
        }

        pub fn record_enqueued(&self, _: usize) {}
        pub fn record_rejected(&self, _: usize) {}
        pub fn record_task_execution(&self, _: u64) {}
        pub fn record_task_panic(&self) {}
        pub fn record_dropped(&self, _: usize) {}

        pub fn snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct MetricsSnapshot {
        pub uptime: Duration,
        pub tasks_enqueued: u64,
        pub tasks_rejected: u64,
        pub tasks_executed: u64,
        pub tasks_panicked: u64,
        pub tasks_dropped: u64,
        pub avg_latency_ns: u64,
        pub p50_latency_ns: u64,
        pub p99_latency_ns: u64,
        pub max_latency_ns: u64,
    }

    impl MetricsSnapshot {
        pub fn tasks_per_second(&self) -> f64 {
            0.0
        }
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::{Metrics, MetricsSnapshot};
