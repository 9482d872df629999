//! VEDA executor - a bounded, dynamically sized thread pool.
//!
//! A [`ThreadPool`] keeps between zero and `max_size` worker threads. New
//! work goes to a fresh worker until `core_size` are alive, then waits in a
//! bounded FIFO queue, then bursts to extra workers up to `max_size`, and
//! only then is handed to a [`RejectionPolicy`]. Workers above the core size
//! retire after `keep_alive` without work.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use veda_exec::prelude::*;
//!
//! let config = PoolConfig::builder()
//!     .core_size(4)
//!     .max_size(8)
//!     .bounded_queue(64)
//!     .rejection_policy(RejectionPolicy::CallerRuns)
//!     .build()?;
//! let pool = ThreadPool::new(config)?;
//!
//! for i in 0..100 {
//!     pool.execute(move || println!("task {}", i))?;
//! }
//!
//! pool.shutdown();
//! if !pool.await_termination(Duration::from_secs(30)) {
//!     let abandoned = pool.shutdown_now();
//!     eprintln!("{} tasks never ran", abandoned.len());
//! }
//! # Ok::<(), veda_exec::Error>(())
//! ```
//!
//! # Shutdown
//!
//! - [`ThreadPool::shutdown`] stops admission and lets queued work drain.
//! - [`ThreadPool::shutdown_now`] also empties the queue, returning the
//!   unstarted tasks, and raises [`is_interrupted`] for running ones.
//! - [`ThreadPool::await_termination`] blocks until the last worker is gone.

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;

pub use config::{PoolConfig, PoolConfigBuilder, QueueCapacity};
pub use error::{Error, RejectReason, Result};
pub use executor::{
    is_interrupted, PanicInfo, PoolSnapshot, RejectionHandler, RejectionPolicy, RunState, Task,
    TaskId, ThreadPool, WorkerState, WorkerStats,
};
