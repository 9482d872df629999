use super::task::{Task, TaskId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Callback invoked for every task that panics.
#[derive(Clone)]
pub struct PanicHook(Arc<dyn Fn(&PanicInfo) + Send + Sync>);

impl PanicHook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&PanicInfo) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn call(&self, info: &PanicInfo) {
        (self.0)(info)
    }
}

impl std::fmt::Debug for PanicHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PanicHook(..)")
    }
}

/// Runs tasks behind `catch_unwind` so a failing task never takes its worker
/// thread down with it.
#[derive(Debug, Default)]
pub struct PanicHandler {
    hook: Option<PanicHook>,
    panic_count: AtomicUsize,
}

impl PanicHandler {
    pub fn new(hook: Option<PanicHook>) -> Self {
        Self {
            hook,
            panic_count: AtomicUsize::new(0),
        }
    }

    /// Run `task`, reporting a panic through the log and the hook instead of
    /// unwinding into the caller.
    pub fn execute(&self, task: Task) -> Result<(), PanicInfo> {
        let task_id = task.id();

        match catch_unwind(AssertUnwindSafe(|| task.run())) {
            Ok(()) => Ok(()),
            Err(payload) => {
                self.panic_count.fetch_add(1, Ordering::Relaxed);

                let info = PanicInfo::from_payload(task_id, payload);
                tracing::error!(
                    task = %info.task_id,
                    thread = std::thread::current().name().unwrap_or("unnamed"),
                    "task panicked: {}",
                    info.message
                );

                if let Some(hook) = &self.hook {
                    // a panicking hook must not kill the worker either
                    if catch_unwind(AssertUnwindSafe(|| hook.call(&info))).is_err() {
                        tracing::error!(task = %info.task_id, "panic hook panicked");
                    }
                }

                Err(info)
            }
        }
    }

    pub fn panic_count(&self) -> usize {
        self.panic_count.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct PanicInfo {
    pub task_id: TaskId,
    pub message: String,
}

impl PanicInfo {
    fn from_payload(task_id: TaskId, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        Self { task_id, message }
    }
}
