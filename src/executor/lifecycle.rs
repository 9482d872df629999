//! Pool lifecycle and termination.
//!
//! A pool moves strictly forward through
//! `Running -> Shutdown -> Tidying -> Terminated`, or jumps to `Stop` from
//! either of the first two states. All transitions happen under the pool's
//! state lock; reaching `Terminated` wakes every thread blocked in
//! [`ThreadPool::await_termination`](crate::ThreadPool::await_termination).

use super::pool::{PoolState, Shared};
use parking_lot::MutexGuard;
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RunState {
    /// Accepting and running tasks.
    Running = 0,
    /// No new tasks; queued and running tasks are still processed.
    Shutdown = 1,
    /// No new tasks, queue drained, running tasks interrupted.
    Stop = 2,
    /// All workers gone, about to terminate.
    Tidying = 3,
    /// Final state.
    Terminated = 4,
}

impl RunState {
    pub fn is_running(self) -> bool {
        self == RunState::Running
    }

    /// True once `shutdown` or `shutdown_now` has been called.
    pub fn is_shutdown(self) -> bool {
        self >= RunState::Shutdown
    }

    pub fn is_stopping(self) -> bool {
        self >= RunState::Stop
    }

    pub fn is_terminated(self) -> bool {
        self == RunState::Terminated
    }

    /// Move forward to `target`. Returns false if the state is already at or
    /// past it.
    pub(crate) fn advance(&mut self, target: RunState) -> bool {
        if *self < target {
            *self = target;
            true
        } else {
            false
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunState::Running => "running",
            RunState::Shutdown => "shutdown",
            RunState::Stop => "stop",
            RunState::Tidying => "tidying",
            RunState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

/// Read-only view of pool state, handed to rejection handlers and exposed
/// through [`ThreadPool::snapshot`](crate::ThreadPool::snapshot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub run_state: RunState,
    pub pool_size: usize,
    pub active_count: usize,
    pub queued_tasks: usize,
    pub core_size: usize,
    pub max_size: usize,
    pub largest_pool_size: usize,
    pub completed_tasks: u64,
}

impl PoolSnapshot {
    pub fn is_shutdown(&self) -> bool {
        self.run_state.is_shutdown()
    }
}

impl Shared {
    /// Move to `Tidying` and then `Terminated` if nothing is left to run.
    /// Must be called after every change that might make that true: a worker
    /// leaving, `shutdown`, `shutdown_now`.
    pub(crate) fn try_terminate(&self, state: &mut MutexGuard<'_, PoolState>) -> bool {
        let drained = match state.run_state {
            RunState::Running | RunState::Tidying | RunState::Terminated => return false,
            RunState::Shutdown => state.workers.is_empty() && self.queue.is_empty(),
            RunState::Stop => state.workers.is_empty(),
        };
        if !drained {
            return false;
        }

        state.run_state.advance(RunState::Tidying);
        tracing::debug!(pool = %self.config.thread_name_prefix, "pool tidying");

        state.run_state.advance(RunState::Terminated);
        tracing::info!(
            pool = %self.config.thread_name_prefix,
            completed = self.metrics.tasks_completed(),
            "pool terminated"
        );

        self.termination.notify_all();
        true
    }

    /// Block until the pool is terminated or the deadline passes. `None`
    /// waits forever.
    pub(crate) fn wait_terminated(&self, deadline: Option<Instant>) -> bool {
        let mut state = self.state.lock();
        while !state.run_state.is_terminated() {
            match deadline {
                Some(deadline) => {
                    if self.termination.wait_until(&mut state, deadline).timed_out() {
                        return state.run_state.is_terminated();
                    }
                }
                None => self.termination.wait(&mut state),
            }
        }
        true
    }

    pub(crate) fn wait_terminated_for(&self, timeout: Duration) -> bool {
        self.wait_terminated(Instant::now().checked_add(timeout))
    }
}
