use crate::error::{Error, Result};
use crate::executor::{PanicHook, PanicInfo, RejectionPolicy};
use std::time::Duration;

/// How many tasks may wait for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    /// At most `n` waiting tasks. `Bounded(0)` disables queuing entirely:
    /// every submission gets a worker or is rejected.
    Bounded(usize),
    /// No limit. The pool then never grows past its core size.
    Unbounded,
}

impl QueueCapacity {
    pub(crate) fn has_room(&self, len: usize) -> bool {
        match self {
            QueueCapacity::Bounded(cap) => len < *cap,
            QueueCapacity::Unbounded => true,
        }
    }
}

impl Default for QueueCapacity {
    fn default() -> Self {
        QueueCapacity::Bounded(1024)
    }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub core_size: usize,
    pub max_size: usize,
    pub keep_alive: Duration,
    pub queue_capacity: QueueCapacity,
    pub rejection_policy: RejectionPolicy,
    pub allow_core_thread_timeout: bool,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
    pub on_panic: Option<PanicHook>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            core_size: cpus,
            max_size: cpus * 2,
            keep_alive: Duration::from_secs(60),
            queue_capacity: QueueCapacity::default(),
            rejection_policy: RejectionPolicy::default(),
            allow_core_thread_timeout: false,
            thread_name_prefix: "veda-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
            on_panic: None,
        }
    }
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Shorthand for a pool with the given bounds and defaults elsewhere.
    pub fn with_sizes(core_size: usize, max_size: usize) -> Self {
        Self {
            core_size,
            max_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::config("max_size must be > 0"));
        }
        if self.core_size > self.max_size {
            return Err(Error::config(format!(
                "core_size ({}) must not exceed max_size ({})",
                self.core_size, self.max_size
            )));
        }
        if self.allow_core_thread_timeout && self.keep_alive.is_zero() {
            return Err(Error::config("keep_alive must be > 0 when core threads may time out"));
        }
        if self.thread_name_prefix.as_bytes().contains(&0) {
            return Err(Error::config("thread_name_prefix must not contain null bytes"));
        }
        if self.stack_size == Some(0) {
            return Err(Error::config("stack_size must be > 0"));
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    pub fn core_size(mut self, n: usize) -> Self {
        self.config.core_size = n;
        self
    }

    pub fn max_size(mut self, n: usize) -> Self {
        self.config.max_size = n;
        self
    }

    pub fn keep_alive(mut self, keep_alive: Duration) -> Self {
        self.config.keep_alive = keep_alive;
        self
    }

    pub fn queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Convenience for `queue_capacity(QueueCapacity::Bounded(n))`.
    pub fn bounded_queue(self, n: usize) -> Self {
        self.queue_capacity(QueueCapacity::Bounded(n))
    }

    pub fn unbounded_queue(self) -> Self {
        self.queue_capacity(QueueCapacity::Unbounded)
    }

    pub fn rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.config.rejection_policy = policy;
        self
    }

    pub fn allow_core_thread_timeout(mut self, allow: bool) -> Self {
        self.config.allow_core_thread_timeout = allow;
        self
    }

    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Called with the details of every task that panics on a worker or in
    /// a caller-runs rejection.
    pub fn on_panic<F>(mut self, hook: F) -> Self
    where
        F: Fn(&PanicInfo) + Send + Sync + 'static,
    {
        self.config.on_panic = Some(PanicHook::new(hook));
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
