use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use veda_exec::prelude::*;
use veda_exec::telemetry::{LogExporter, MetricsExporter};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("veda_exec=debug")),
        )
        .init();

    println!("=== Bounded Thread Pool Example ===\n");

    let config = PoolConfig::builder()
        .core_size(5)
        .max_size(10)
        .keep_alive(Duration::from_secs(1))
        .bounded_queue(10)
        .thread_name_prefix("demo")
        .rejection_policy(RejectionPolicy::custom(
            |task: Task, pool: &PoolSnapshot| -> Result<()> {
                println!(
                    "{} rejected: {} workers busy, {} queued",
                    task.id(),
                    pool.active_count,
                    pool.queued_tasks
                );
                Ok(())
            },
        ))
        .build()?;
    let pool = ThreadPool::new(config)?;

    // 20 tasks against 10 workers and 10 queue slots: none should be rejected
    for i in 0..20 {
        pool.execute(move || {
            let name = thread::current().name().unwrap_or("?").to_string();
            println!("task {} running on {}", i, name);
            thread::sleep(Duration::from_millis(200));
        })?;
    }

    let snapshot = pool.snapshot();
    println!(
        "\npool size {}, queued {}, largest {}\n",
        snapshot.pool_size, snapshot.queued_tasks, snapshot.largest_pool_size
    );

    pool.shutdown();
    if !pool.await_termination(Duration::from_secs(60)) {
        let abandoned = pool.shutdown_now();
        println!("forced stop, {} tasks never ran", abandoned.len());
        if !pool.await_termination(Duration::from_secs(60)) {
            eprintln!("Pool did not terminate");
        }
    }

    let metrics = pool.metrics();
    println!(
        "completed {} tasks, p99 {} us, utilization {:.1}%",
        metrics.tasks_completed,
        metrics.p99_run_time_ns / 1_000,
        metrics.utilization() * 100.0
    );

    LogExporter.export(&metrics, &pool.snapshot())?;

    println!("\n=== Example Complete ===");
    Ok(())
}
