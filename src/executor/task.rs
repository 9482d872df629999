//! Task representation and execution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global task ID counter
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(TASK_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A fire-and-forget unit of work.
///
/// The pool never looks inside a task; it only moves it between the
/// submitter, the queue and a worker, and runs it at most once. Tasks handed
/// back by [`ThreadPool::shutdown_now`](crate::ThreadPool::shutdown_now) or
/// given to a rejection handler can still be run by the caller.
pub struct Task {
    id: TaskId,
    func: Box<dyn FnOnce() + Send + 'static>,
    submitted_at: Instant,
}

impl Task {
    /// Wrap a closure into a task.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task {
            id: TaskId::next(),
            func: Box::new(f),
            submitted_at: Instant::now(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Time elapsed since the task was created. For a task taken off the
    /// queue this is how long it waited for a worker.
    pub fn age(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    /// Run the task on the current thread, consuming it.
    pub fn run(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::new(|| {});
        let b = Task::new(|| {});
        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
    }

    #[test]
    fn test_task_age_grows() {
        let task = Task::new(|| {});
        std::thread::sleep(Duration::from_millis(10));
        assert!(task.age() >= Duration::from_millis(10));
    }

    #[test]
    fn test_task_run() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let task = Task::new(move || flag.store(true, Ordering::SeqCst));

        task.run();
        assert!(ran.load(Ordering::SeqCst));
    }
}
