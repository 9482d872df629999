//! What happens to a task the pool cannot take.
//!
//! A rejection policy only runs when every worker slot is busy and the
//! queue is full. It gets the task and a snapshot of the pool and returns
//! the result `submit` hands back to the caller. Policies never touch the
//! pool itself.

use super::lifecycle::PoolSnapshot;
use super::panic_handler::PanicHandler;
use super::task::Task;
use crate::error::{Error, RejectReason, Result};
use crate::telemetry::Metrics;
use std::sync::Arc;
use std::time::Instant;

/// Caller-supplied rejection strategy.
///
/// Implemented for any `Fn(Task, &PoolSnapshot) -> Result<()>`.
pub trait RejectionHandler: Send + Sync {
    fn rejected(&self, task: Task, pool: &PoolSnapshot) -> Result<()>;
}

impl<F> RejectionHandler for F
where
    F: Fn(Task, &PoolSnapshot) -> Result<()> + Send + Sync,
{
    fn rejected(&self, task: Task, pool: &PoolSnapshot) -> Result<()> {
        self(task, pool)
    }
}

#[derive(Clone, Default)]
pub enum RejectionPolicy {
    /// Fail the submission with [`Error::Rejected`].
    #[default]
    Abort,
    /// Drop the task. The submission succeeds.
    Discard,
    /// Run the task on the submitting thread. This slows submitters down to
    /// the pace the pool can sustain.
    CallerRuns,
    Custom(Arc<dyn RejectionHandler>),
}

impl RejectionPolicy {
    pub fn custom<H>(handler: H) -> Self
    where
        H: RejectionHandler + 'static,
    {
        RejectionPolicy::Custom(Arc::new(handler))
    }

    pub fn name(&self) -> &'static str {
        match self {
            RejectionPolicy::Abort => "abort",
            RejectionPolicy::Discard => "discard",
            RejectionPolicy::CallerRuns => "caller_runs",
            RejectionPolicy::Custom(_) => "custom",
        }
    }

    pub(crate) fn reject(
        &self,
        task: Task,
        pool: &PoolSnapshot,
        panic_handler: &PanicHandler,
        metrics: &Metrics,
    ) -> Result<()> {
        metrics.record_task_rejected();
        tracing::debug!(
            task = %task.id(),
            policy = self.name(),
            reason = RejectReason::Saturated.as_label(),
            pool_size = pool.pool_size,
            queued = pool.queued_tasks,
            "task rejected"
        );

        match self {
            RejectionPolicy::Abort => Err(Error::Rejected(RejectReason::Saturated)),
            RejectionPolicy::Discard => {
                metrics.record_task_discarded();
                Ok(())
            }
            RejectionPolicy::CallerRuns => {
                // the pool may have shut down since admission was refused
                if pool.is_shutdown() {
                    return Err(Error::Rejected(RejectReason::Shutdown));
                }
                metrics.record_task_caller_ran();
                let start = Instant::now();
                let result = panic_handler.execute(task);
                metrics.record_task_execution(start.elapsed(), result.is_err());
                Ok(())
            }
            RejectionPolicy::Custom(handler) => handler.rejected(task, pool),
        }
    }
}

impl std::fmt::Debug for RejectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionPolicy::Abort => f.write_str("Abort"),
            RejectionPolicy::Discard => f.write_str("Discard"),
            RejectionPolicy::CallerRuns => f.write_str("CallerRuns"),
            RejectionPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RunState;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn snapshot(run_state: RunState) -> PoolSnapshot {
        PoolSnapshot {
            run_state,
            pool_size: 2,
            active_count: 2,
            queued_tasks: 4,
            core_size: 1,
            max_size: 2,
            largest_pool_size: 2,
            completed_tasks: 0,
        }
    }

    fn flagged() -> (Task, Arc<AtomicBool>) {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        (Task::new(move || flag.store(true, Ordering::SeqCst)), ran)
    }

    #[test]
    fn test_abort_returns_saturated() {
        let (task, ran) = flagged();
        let err = RejectionPolicy::Abort
            .reject(task, &snapshot(RunState::Running), &PanicHandler::default(), &Metrics::new())
            .unwrap_err();

        assert!(matches!(err, Error::Rejected(RejectReason::Saturated)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_discard_drops_task() {
        let metrics = Metrics::new();
        let (task, ran) = flagged();
        RejectionPolicy::Discard
            .reject(task, &snapshot(RunState::Running), &PanicHandler::default(), &metrics)
            .unwrap();

        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(metrics.snapshot().tasks_discarded, 1);
        assert_eq!(metrics.snapshot().tasks_rejected, 1);
    }

    #[test]
    fn test_caller_runs_on_current_thread() {
        let caller = std::thread::current().id();
        let same_thread = Arc::new(AtomicBool::new(false));
        let flag = same_thread.clone();
        let task = Task::new(move || {
            flag.store(std::thread::current().id() == caller, Ordering::SeqCst);
        });

        RejectionPolicy::CallerRuns
            .reject(task, &snapshot(RunState::Running), &PanicHandler::default(), &Metrics::new())
            .unwrap();

        assert!(same_thread.load(Ordering::SeqCst));
    }

    #[test]
    fn test_caller_runs_contains_panics() {
        let handler = PanicHandler::default();
        let metrics = Metrics::new();
        let result = RejectionPolicy::CallerRuns.reject(
            Task::new(|| panic!("rejected and broken")),
            &snapshot(RunState::Running),
            &handler,
            &metrics,
        );

        assert!(result.is_ok());
        assert_eq!(handler.panic_count(), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_panicked, 1);
        assert_eq!(snapshot.tasks_completed, 1);
        assert_eq!(snapshot.tasks_caller_ran, 1);
    }

    #[test]
    fn test_caller_runs_refuses_after_shutdown() {
        let (task, ran) = flagged();
        let result = RejectionPolicy::CallerRuns.reject(
            task,
            &snapshot(RunState::Shutdown),
            &PanicHandler::default(),
            &Metrics::new(),
        );

        assert!(matches!(result, Err(Error::Rejected(RejectReason::Shutdown))));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_custom_handler_sees_snapshot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let policy = RejectionPolicy::custom(move |task: Task, pool: &PoolSnapshot| -> Result<()> {
            assert_eq!(pool.queued_tasks, 4);
            counter.fetch_add(1, Ordering::SeqCst);
            drop(task);
            Ok(())
        });

        let (task, _) = flagged();
        policy
            .reject(task, &snapshot(RunState::Running), &PanicHandler::default(), &Metrics::new())
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(policy.name(), "custom");
    }
}
