//! Metrics collection for pool monitoring.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Pool-wide counters and task run-time histogram.
#[derive(Debug)]
pub struct Metrics {
    // Task counters
    tasks_admitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_panicked: AtomicU64,
    tasks_rejected: AtomicU64,
    tasks_discarded: AtomicU64,
    tasks_caller_ran: AtomicU64,
    tasks_drained: AtomicU64,

    // Worker lifecycle counters
    workers_started: AtomicU64,
    workers_retired: AtomicU64,

    // Timing metrics
    idle_time_ns: AtomicU64,
    busy_time_ns: AtomicU64,

    run_time_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        // 3 significant figures, max value of 1 hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .expect("histogram bounds are valid");

        Self {
            tasks_admitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            tasks_discarded: AtomicU64::new(0),
            tasks_caller_ran: AtomicU64::new(0),
            tasks_drained: AtomicU64::new(0),
            workers_started: AtomicU64::new(0),
            workers_retired: AtomicU64::new(0),
            idle_time_ns: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            run_time_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub fn record_task_admitted(&self) {
        self.tasks_admitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a finished task (panicked or not) and how long it ran.
    pub fn record_task_execution(&self, duration: Duration, panicked: bool) {
        let duration_ns = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.busy_time_ns.fetch_add(duration_ns, Ordering::Relaxed);
        if panicked {
            self.tasks_panicked.fetch_add(1, Ordering::Relaxed);
        }

        // values above the histogram max saturate instead of failing
        self.run_time_histogram.write().saturating_record(duration_ns);
    }

    pub fn record_task_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_discarded(&self) {
        self.tasks_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_task_caller_ran(&self) {
        self.tasks_caller_ran.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tasks_drained(&self, n: usize) {
        self.tasks_drained.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_worker_started(&self) {
        self.workers_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_worker_retired(&self) {
        self.workers_retired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_idle_time(&self, duration: Duration) {
        let ns = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.idle_time_ns.fetch_add(ns, Ordering::Relaxed);
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.run_time_histogram.read();

        MetricsSnapshot {
            uptime_ms: self.start_time.elapsed().as_millis() as u64,
            tasks_admitted: self.tasks_admitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.tasks_panicked.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            tasks_discarded: self.tasks_discarded.load(Ordering::Relaxed),
            tasks_caller_ran: self.tasks_caller_ran.load(Ordering::Relaxed),
            tasks_drained: self.tasks_drained.load(Ordering::Relaxed),
            workers_started: self.workers_started.load(Ordering::Relaxed),
            workers_retired: self.workers_retired.load(Ordering::Relaxed),
            idle_time_ns: self.idle_time_ns.load(Ordering::Relaxed),
            busy_time_ns: self.busy_time_ns.load(Ordering::Relaxed),
            avg_run_time_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_run_time_ns: histogram.value_at_quantile(0.50),
            p99_run_time_ns: histogram.value_at_quantile(0.99),
            max_run_time_ns: histogram.max(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_ms: u64,
    pub tasks_admitted: u64,
    pub tasks_completed: u64,
    pub tasks_panicked: u64,
    pub tasks_rejected: u64,
    pub tasks_discarded: u64,
    pub tasks_caller_ran: u64,
    pub tasks_drained: u64,
    pub workers_started: u64,
    pub workers_retired: u64,
    pub idle_time_ns: u64,
    pub busy_time_ns: u64,
    pub avg_run_time_ns: u64,
    pub p50_run_time_ns: u64,
    pub p99_run_time_ns: u64,
    pub max_run_time_ns: u64,
}

impl MetricsSnapshot {
    /// Share of worker time spent running tasks (0.0 to 1.0)
    pub fn utilization(&self) -> f64 {
        let total_time = self.idle_time_ns + self.busy_time_ns;
        if total_time == 0 {
            return 0.0;
        }
        self.busy_time_ns as f64 / total_time as f64
    }

    pub fn tasks_per_second(&self) -> f64 {
        if self.uptime_ms == 0 {
            return 0.0;
        }
        self.tasks_completed as f64 * 1000.0 / self.uptime_ms as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_basic() {
        let metrics = Metrics::new();

        metrics.record_task_admitted();
        metrics.record_task_admitted();
        metrics.record_task_execution(Duration::from_micros(1), false);
        metrics.record_task_execution(Duration::from_micros(2), true);
        metrics.record_task_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_admitted, 2);
        assert_eq!(snapshot.tasks_completed, 2);
        assert_eq!(snapshot.tasks_panicked, 1);
        assert_eq!(snapshot.tasks_rejected, 1);
        assert!(snapshot.avg_run_time_ns > 0);
        assert!(snapshot.max_run_time_ns >= snapshot.p50_run_time_ns);
    }

    #[test]
    fn test_oversized_duration_saturates() {
        let metrics = Metrics::new();
        metrics.record_task_execution(Duration::from_secs(10 * 3600), false);
        assert_eq!(metrics.snapshot().tasks_completed, 1);
    }

    #[test]
    fn test_utilization() {
        let mut snapshot = MetricsSnapshot {
            idle_time_ns: 1_000_000_000,
            busy_time_ns: 1_000_000_000,
            ..Default::default()
        };

        assert_eq!(snapshot.utilization(), 0.5);

        snapshot.busy_time_ns = 3_000_000_000;
        assert_eq!(snapshot.utilization(), 0.75);
    }

    #[test]
    fn test_tasks_per_second() {
        let snapshot = MetricsSnapshot {
            uptime_ms: 2_000,
            tasks_completed: 100,
            ..Default::default()
        };
        assert_eq!(snapshot.tasks_per_second(), 50.0);
        assert_eq!(MetricsSnapshot::default().tasks_per_second(), 0.0);
    }
}
