use super::lifecycle::{PoolSnapshot, RunState};
use super::panic_handler::PanicHandler;
use super::queue::TaskQueue;
use super::task::Task;
use super::worker::{Worker, WorkerId, WorkerState, WorkerStats, WorkerStatus};
use crate::config::PoolConfig;
use crate::error::{Error, RejectReason, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Live-worker registry and lifecycle state. Every change to either happens
/// under `Shared::state`.
#[derive(Debug)]
pub(crate) struct PoolState {
    pub run_state: RunState,
    pub workers: HashMap<WorkerId, Arc<WorkerStatus>>,
    pub largest_pool_size: usize,
}

/// Everything the pool handle and its workers share.
///
/// Lock order is `state` then the queue's internal lock. Workers block on
/// the queue without holding `state`.
#[derive(Debug)]
pub(crate) struct Shared {
    pub state: Mutex<PoolState>,
    pub termination: Condvar,
    pub queue: TaskQueue,
    pub config: PoolConfig,
    pub interrupt: Arc<AtomicBool>,
    pub panic_handler: PanicHandler,
    pub metrics: Metrics,
    // mirrors `state.workers.len()`, written only under `state`
    live_workers: AtomicUsize,
    next_worker_id: AtomicUsize,
}

impl Shared {
    fn reserve_worker(&self, state: &mut PoolState) -> Arc<WorkerStatus> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let status = Arc::new(WorkerStatus::new(id));
        state.workers.insert(id, status.clone());
        self.live_workers.store(state.workers.len(), Ordering::Release);
        state.largest_pool_size = state.largest_pool_size.max(state.workers.len());
        status
    }

    fn remove_worker(&self, state: &mut PoolState, id: WorkerId) -> bool {
        let removed = state.workers.remove(&id).is_some();
        if removed {
            self.live_workers.store(state.workers.len(), Ordering::Release);
            self.metrics.record_worker_retired();
        }
        removed
    }

    /// Whether an idle worker should wait with a timeout rather than
    /// indefinitely. Only a hint: the retirement decision itself is taken
    /// again under the state lock.
    pub(crate) fn worker_may_time_out(&self) -> bool {
        self.config.allow_core_thread_timeout
            || self.live_workers.load(Ordering::Acquire) > self.config.core_size
    }

    /// Decide whether a worker that found no task should exit, and if so
    /// remove it from the live set in the same critical section, so that
    /// concurrent idle workers never shrink the pool below its target.
    pub(crate) fn retire_idle_worker(&self, id: WorkerId, timed_out: bool) -> bool {
        let mut state = self.state.lock();
        let count = state.workers.len();

        let retire = if state.run_state.is_stopping() {
            true
        } else if state.run_state.is_shutdown() {
            self.queue.is_empty()
        } else if timed_out {
            let above_core = self.config.allow_core_thread_timeout || count > self.config.core_size;
            // the last worker stays while anything is queued
            above_core && (count > 1 || self.queue.is_empty())
        } else {
            false
        };

        if retire && self.remove_worker(&mut state, id) {
            tracing::debug!(
                worker = id,
                pool_size = state.workers.len(),
                state = %state.run_state,
                "idle worker retiring"
            );
            self.try_terminate(&mut state);
        }
        retire
    }

    /// Final bookkeeping when a worker thread leaves its loop.
    pub(crate) fn deregister(&self, id: WorkerId) {
        let mut state = self.state.lock();
        self.remove_worker(&mut state, id);
        self.try_terminate(&mut state);
    }

    fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock();
        PoolSnapshot {
            run_state: state.run_state,
            pool_size: state.workers.len(),
            active_count: state
                .workers
                .values()
                .filter(|w| w.state() == WorkerState::Running)
                .count(),
            queued_tasks: self.queue.len(),
            core_size: self.config.core_size,
            max_size: self.config.max_size,
            largest_pool_size: state.largest_pool_size,
            completed_tasks: self.metrics.tasks_completed(),
        }
    }
}

/// A thread pool with a core size, a burst ceiling and a bounded queue.
///
/// Submissions go to a new worker while fewer than `core_size` are alive,
/// then to the queue, then to a new worker up to `max_size`, and finally to
/// the configured [`RejectionPolicy`](crate::RejectionPolicy). Workers
/// above the core size exit after `keep_alive` without work.
///
/// Dropping the pool calls [`shutdown`](ThreadPool::shutdown): accepted
/// tasks still run, but nothing waits for them.
///
/// ```no_run
/// use std::time::Duration;
/// use veda_exec::{PoolConfig, ThreadPool};
///
/// let config = PoolConfig::builder()
///     .core_size(2)
///     .max_size(4)
///     .bounded_queue(16)
///     .build()?;
/// let pool = ThreadPool::new(config)?;
///
/// pool.execute(|| println!("hello from a worker"))?;
///
/// pool.shutdown();
/// assert!(pool.await_termination(Duration::from_secs(5)));
/// # Ok::<(), veda_exec::Error>(())
/// ```
pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let panic_handler = PanicHandler::new(config.on_panic.clone());
        let shared = Shared {
            state: Mutex::new(PoolState {
                run_state: RunState::Running,
                workers: HashMap::with_capacity(config.max_size.min(1024)),
                largest_pool_size: 0,
            }),
            termination: Condvar::new(),
            queue: TaskQueue::new(config.queue_capacity),
            interrupt: Arc::new(AtomicBool::new(false)),
            panic_handler,
            metrics: Metrics::new(),
            live_workers: AtomicUsize::new(0),
            next_worker_id: AtomicUsize::new(0),
            config,
        };

        tracing::debug!(
            pool = %shared.config.thread_name_prefix,
            core_size = shared.config.core_size,
            max_size = shared.config.max_size,
            queue = ?shared.queue.capacity(),
            policy = shared.config.rejection_policy.name(),
            "thread pool created"
        );

        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Run a closure on the pool.
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Task::new(f))
    }

    /// Admit a task: new core worker, else queue, else burst worker, else
    /// the rejection policy.
    pub fn submit(&self, task: Task) -> Result<()> {
        let shared = &self.shared;
        let mut state = shared.state.lock();

        if !state.run_state.is_running() {
            drop(state);
            shared.metrics.record_task_rejected();
            tracing::debug!(
                task = %task.id(),
                reason = RejectReason::Shutdown.as_label(),
                "task rejected"
            );
            return Err(Error::Rejected(RejectReason::Shutdown));
        }

        let pool_size = state.workers.len();

        if pool_size < shared.config.core_size {
            let status = shared.reserve_worker(&mut state);
            drop(state);
            return self.start_worker_with(status, task);
        }

        let task = match shared.queue.offer(task) {
            Ok(()) => {
                shared.metrics.record_task_admitted();
                // only reachable with core_size == 0
                if state.workers.is_empty() {
                    let status = shared.reserve_worker(&mut state);
                    drop(state);
                    if let Err(e) = self.start_worker(status, None) {
                        tracing::error!(error = %e, "queued task has no worker to run it");
                    }
                }
                return Ok(());
            }
            Err(task) => task,
        };

        if pool_size < shared.config.max_size {
            let status = shared.reserve_worker(&mut state);
            drop(state);
            return self.start_worker_with(status, task);
        }

        drop(state);
        let snapshot = shared.snapshot();
        shared
            .config
            .rejection_policy
            .reject(task, &snapshot, &shared.panic_handler, &shared.metrics)
    }

    fn start_worker_with(&self, status: Arc<WorkerStatus>, task: Task) -> Result<()> {
        self.start_worker(status, Some(task))?;
        self.shared.metrics.record_task_admitted();
        Ok(())
    }

    /// Spawn the thread for a worker slot already reserved in the registry.
    fn start_worker(&self, status: Arc<WorkerStatus>, first_task: Option<Task>) -> Result<()> {
        let config = &self.shared.config;
        let id = status.id;

        let mut builder = thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let worker = Worker::new(status, first_task, self.shared.clone());
        match builder.spawn(move || worker.run()) {
            Ok(_) => {
                self.shared.metrics.record_worker_started();
                Ok(())
            }
            Err(e) => {
                tracing::error!(worker = id, error = %e, "failed to spawn worker thread");
                self.shared.deregister(id);
                Err(Error::Spawn(e))
            }
        }
    }

    /// Start one idle core worker ahead of demand. Returns false if the core
    /// is already full or the pool is shut down.
    pub fn prestart_core_thread(&self) -> Result<bool> {
        let mut state = self.shared.state.lock();
        if !state.run_state.is_running() || state.workers.len() >= self.shared.config.core_size {
            return Ok(false);
        }

        let status = self.shared.reserve_worker(&mut state);
        drop(state);
        self.start_worker(status, None)?;
        Ok(true)
    }

    /// Fill the core with idle workers. Returns how many were started.
    pub fn prestart_all_core_threads(&self) -> Result<usize> {
        let mut started = 0;
        while self.prestart_core_thread()? {
            started += 1;
        }
        Ok(started)
    }

    /// Stop accepting tasks. Queued and running tasks still complete.
    /// Does not wait; see [`await_termination`](ThreadPool::await_termination).
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.run_state.advance(RunState::Shutdown) {
            tracing::info!(
                pool = %self.shared.config.thread_name_prefix,
                pool_size = state.workers.len(),
                queued = self.shared.queue.len(),
                "pool shutting down"
            );
            // wakes idle workers so they notice the new state
            self.shared.queue.close();
        }
        self.shared.try_terminate(&mut state);
    }

    /// Stop accepting tasks, discard the queue and interrupt running tasks.
    ///
    /// Returns the tasks that never started, oldest first. Running tasks
    /// only stop early if they check [`is_interrupted`](crate::is_interrupted).
    pub fn shutdown_now(&self) -> Vec<Task> {
        let mut state = self.shared.state.lock();
        if !state.run_state.advance(RunState::Stop) {
            return Vec::new();
        }

        self.shared.interrupt.store(true, Ordering::Release);
        let drained = self.shared.queue.close_and_drain();
        self.shared.metrics.record_tasks_drained(drained.len());

        tracing::warn!(
            pool = %self.shared.config.thread_name_prefix,
            pool_size = state.workers.len(),
            drained = drained.len(),
            "pool stopping"
        );

        self.shared.try_terminate(&mut state);
        drained
    }

    /// Block until the pool has terminated or `timeout` elapses. Returns
    /// whether termination was observed.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.shared.wait_terminated_for(timeout)
    }

    pub fn await_termination_forever(&self) {
        self.shared.wait_terminated(None);
    }

    pub fn run_state(&self) -> RunState {
        self.shared.state.lock().run_state
    }

    pub fn is_shutdown(&self) -> bool {
        self.run_state().is_shutdown()
    }

    /// Shut down but not yet terminated.
    pub fn is_terminating(&self) -> bool {
        let state = self.run_state();
        state.is_shutdown() && !state.is_terminated()
    }

    pub fn is_terminated(&self) -> bool {
        self.run_state().is_terminated()
    }

    /// Number of live workers.
    pub fn pool_size(&self) -> usize {
        self.shared.state.lock().workers.len()
    }

    /// Number of workers currently running a task.
    pub fn active_count(&self) -> usize {
        self.shared.snapshot().active_count
    }

    pub fn queued_tasks(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn largest_pool_size(&self) -> usize {
        self.shared.state.lock().largest_pool_size
    }

    /// Tasks run to completion (or panic), by workers or by submitters under
    /// [`RejectionPolicy::CallerRuns`](crate::RejectionPolicy::CallerRuns).
    pub fn completed_task_count(&self) -> u64 {
        self.shared.metrics.tasks_completed()
    }

    pub fn panic_count(&self) -> usize {
        self.shared.panic_handler.panic_count()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.shared.snapshot()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        let state = self.shared.state.lock();
        let mut stats: Vec<_> = state.workers.values().map(|w| w.stats()).collect();
        stats.sort_by_key(|s| s.id);
        stats
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.shared.config.thread_name_prefix)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
