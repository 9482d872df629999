//! Metrics export.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};
use crate::executor::PoolSnapshot;
use serde::Serialize;
use std::path::PathBuf;

/// Trait for exporting metrics to different sinks
pub trait MetricsExporter: Send + Sync {
    fn export(&self, metrics: &MetricsSnapshot, pool: &PoolSnapshot) -> Result<()>;
}

/// Writes pool and metrics snapshots as a pretty-printed JSON document.
#[derive(Debug)]
pub struct JsonExporter {
    output_path: PathBuf,
}

#[derive(Serialize)]
struct Report<'a> {
    pool: &'a PoolSnapshot,
    metrics: &'a MetricsSnapshot,
    utilization: f64,
    tasks_per_second: f64,
}

impl JsonExporter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn render(metrics: &MetricsSnapshot, pool: &PoolSnapshot) -> Result<String> {
        let report = Report {
            pool,
            metrics,
            utilization: metrics.utilization(),
            tasks_per_second: metrics.tasks_per_second(),
        };
        serde_json::to_string_pretty(&report)
            .map_err(|e| Error::telemetry(format!("JSON serialization failed: {}", e)))
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, metrics: &MetricsSnapshot, pool: &PoolSnapshot) -> Result<()> {
        let json = Self::render(metrics, pool)?;
        std::fs::write(&self.output_path, json)?;
        Ok(())
    }
}

/// Emits snapshots as a structured `tracing` event.
#[derive(Debug, Default)]
pub struct LogExporter;

impl MetricsExporter for LogExporter {
    fn export(&self, metrics: &MetricsSnapshot, pool: &PoolSnapshot) -> Result<()> {
        tracing::info!(
            state = %pool.run_state,
            pool_size = pool.pool_size,
            active = pool.active_count,
            queued = pool.queued_tasks,
            completed = metrics.tasks_completed,
            panicked = metrics.tasks_panicked,
            rejected = metrics.tasks_rejected,
            p99_run_time_us = metrics.p99_run_time_ns / 1_000,
            utilization = metrics.utilization(),
            "pool metrics"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RunState;

    fn dummy() -> (MetricsSnapshot, PoolSnapshot) {
        let metrics = MetricsSnapshot {
            uptime_ms: 10_000,
            tasks_admitted: 1000,
            tasks_completed: 1000,
            tasks_panicked: 1,
            idle_time_ns: 1_000_000_000,
            busy_time_ns: 9_000_000_000,
            ..Default::default()
        };
        let pool = PoolSnapshot {
            run_state: RunState::Running,
            pool_size: 4,
            active_count: 2,
            queued_tasks: 0,
            core_size: 4,
            max_size: 8,
            largest_pool_size: 6,
            completed_tasks: 1000,
        };
        (metrics, pool)
    }

    #[test]
    fn test_render_json() {
        let (metrics, pool) = dummy();
        let json: serde_json::Value =
            serde_json::from_str(&JsonExporter::render(&metrics, &pool).unwrap()).unwrap();

        assert_eq!(json["pool"]["largest_pool_size"], 6);
        assert_eq!(json["metrics"]["tasks_panicked"], 1);
        assert_eq!(json["utilization"], 0.9);
        assert_eq!(json["tasks_per_second"], 100.0);
    }

    #[test]
    fn test_json_exporter_writes_file() {
        let path = std::env::temp_dir().join(format!("veda_exec_metrics_{}.json", std::process::id()));
        let (metrics, pool) = dummy();

        JsonExporter::new(&path).export(&metrics, &pool).unwrap();
        assert!(path.exists());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_log_exporter() {
        let (metrics, pool) = dummy();
        assert!(LogExporter.export(&metrics, &pool).is_ok());
    }
}
