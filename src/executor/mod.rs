//! Task execution infrastructure.
//!
//! The task queue, worker loop, thread pool with its admission rules,
//! rejection policies and the lifecycle that takes a pool from running to
//! terminated.

pub mod lifecycle;
pub mod panic_handler;
pub mod pool;
pub mod queue;
pub mod rejection;
pub mod task;
pub mod worker;

pub use lifecycle::{PoolSnapshot, RunState};
pub use panic_handler::{PanicHandler, PanicHook, PanicInfo};
pub use pool::ThreadPool;
pub use queue::TaskQueue;
pub use rejection::{RejectionHandler, RejectionPolicy};
pub use task::{Task, TaskId};
pub use worker::{is_interrupted, WorkerId, WorkerState, WorkerStats};
