pub use crate::config::{PoolConfig, PoolConfigBuilder, QueueCapacity};
pub use crate::error::{Error, RejectReason, Result};
pub use crate::executor::{
    is_interrupted, PoolSnapshot, RejectionPolicy, RunState, Task, ThreadPool,
};
pub use crate::telemetry::MetricsSnapshot;
