// worker thread stuff
use super::pool::Shared;
use super::task::Task;
use serde::Serialize;
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub type WorkerId = usize;

thread_local! {
    static INTERRUPT: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Whether the pool running the current task has been stopped with
/// [`ThreadPool::shutdown_now`](crate::ThreadPool::shutdown_now).
///
/// Long-running tasks should poll this and return early. Always false
/// outside a worker thread.
pub fn is_interrupted() -> bool {
    INTERRUPT.with(|flag| {
        flag.borrow()
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Acquire))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Idle = 1,
    Running = 2,
    Exited = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Starting,
            1 => WorkerState::Idle,
            2 => WorkerState::Running,
            _ => WorkerState::Exited,
        }
    }
}

// shared between the worker thread and the pool registry
#[derive(Debug)]
pub(crate) struct WorkerStatus {
    pub id: WorkerId,
    state: AtomicU8,
    tasks_completed: AtomicU64,
}

impl WorkerStatus {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: AtomicU8::new(WorkerState::Starting as u8),
            tasks_completed: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            id: self.id,
            state: self.state(),
            tasks_completed: self.tasks_completed(),
        }
    }
}

/// Per-worker counters, as reported by
/// [`ThreadPool::worker_stats`](crate::ThreadPool::worker_stats).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub id: WorkerId,
    pub state: WorkerState,
    pub tasks_completed: u64,
}

pub(crate) struct Worker {
    status: Arc<WorkerStatus>,
    first_task: Option<Task>,
    shared: Arc<Shared>,
}

// removes the worker from the pool even if the loop unwinds
struct ExitGuard<'a> {
    status: &'a WorkerStatus,
    shared: &'a Shared,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.status.set_state(WorkerState::Exited);
        self.shared.deregister(self.status.id);
    }
}

impl Worker {
    pub fn new(status: Arc<WorkerStatus>, first_task: Option<Task>, shared: Arc<Shared>) -> Self {
        Self {
            status,
            first_task,
            shared,
        }
    }

    // main loop
    pub fn run(mut self) {
        INTERRUPT.with(|flag| *flag.borrow_mut() = Some(self.shared.interrupt.clone()));

        let mut next = self.first_task.take();
        tracing::debug!(worker = self.status.id, first_task = next.is_some(), "worker started");

        let _guard = ExitGuard {
            status: &self.status,
            shared: &self.shared,
        };

        loop {
            let task = match next.take() {
                Some(task) => task,
                None => match self.next_task() {
                    Some(task) => task,
                    None => break,
                },
            };
            self.execute_task(task);
        }

        tracing::debug!(
            worker = self.status.id,
            tasks_completed = self.status.tasks_completed(),
            "worker exiting"
        );
    }

    /// Wait for the next task. `None` means this worker should exit; in
    /// that case it has already been taken out of the live count.
    fn next_task(&self) -> Option<Task> {
        loop {
            if self.shared.interrupt.load(Ordering::Acquire) {
                return None;
            }

            let timed = self.shared.worker_may_time_out();
            self.status.set_state(WorkerState::Idle);

            let idle_start = Instant::now();
            let task = if timed {
                self.shared.queue.poll(self.shared.config.keep_alive)
            } else {
                self.shared.queue.take()
            };
            self.shared.metrics.record_idle_time(idle_start.elapsed());

            match task {
                Some(task) => return Some(task),
                None => {
                    if self.shared.retire_idle_worker(self.status.id, timed) {
                        return None;
                    }
                }
            }
        }
    }

    fn execute_task(&self, task: Task) {
        self.status.set_state(WorkerState::Running);
        tracing::trace!(
            worker = self.status.id,
            task = %task.id(),
            waited_us = task.age().as_micros() as u64,
            "task started"
        );

        let start = Instant::now();
        let result = self.shared.panic_handler.execute(task);

        self.status.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.shared
            .metrics
            .record_task_execution(start.elapsed(), result.is_err());
    }
}
