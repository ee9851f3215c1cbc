//! Queue counters and run-time latency.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Queue metrics collector
#[derive(Debug)]
pub struct Metrics {
    tasks_enqueued: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_executed: AtomicU64,
    tasks_panicked: AtomicU64,
    tasks_dropped: AtomicU64,

    // run time of task bodies, in nanoseconds
    latency_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        // 3 significant figures, max value of 1 hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .expect("Failed to create histogram");

        Self {
            tasks_enqueued: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            tasks_dropped: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub fn record_enqueued(&self, count: usize) {
        self.tasks_enqueued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, count: usize) {
        self.tasks_rejected.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_task_execution(&self, duration_ns: u64) {
        self.tasks_executed.fetch_add(1, Ordering::Relaxed);

        if let Some(mut hist) = self.latency_histogram.try_write() {
            let _ = hist.record(duration_ns);
        }
    }

    pub fn record_task_panic(&self) {
        self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, count: usize) {
        self.tasks_dropped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_enqueued: self.tasks_enqueued.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_executed: self.tasks_executed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            tasks_dropped: self.tasks_dropped.load(Ordering::Relaxed),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
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
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_executed as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_enqueued(3);
        metrics.record_task_execution(1000);
        metrics.record_task_execution(2000);
        metrics.record_task_panic();
        metrics.record_dropped(1);
        metrics.record_rejected(4);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_enqueued, 3);
        assert_eq!(snapshot.tasks_executed, 2);
        assert_eq!(snapshot.tasks_panicked, 1);
        assert_eq!(snapshot.tasks_dropped, 1);
        assert_eq!(snapshot.tasks_rejected, 4);
        assert!(snapshot.avg_latency_ns > 0);
        assert!(snapshot.max_latency_ns >= 2000);
    }

    #[test]
    fn test_tasks_per_second() {
        let snapshot = MetricsSnapshot {
            uptime: Duration::from_secs(2),
            tasks_executed: 10,
            ..Default::default()
        };
        assert_eq!(snapshot.tasks_per_second(), 5.0);
        assert_eq!(MetricsSnapshot::default().tasks_per_second(), 0.0);
    }
}
