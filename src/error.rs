pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("task rejected: {0}")]
    Rejected(RejectReason),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Error::Telemetry(msg.into())
    }

    /// True for admission failures the submitter may retry or shed.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejected(_))
    }
}

/// Why a submission was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The pool no longer accepts work.
    Shutdown,
    /// Every worker slot is taken and the queue is full.
    Saturated,
}

impl RejectReason {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RejectReason::Shutdown => "pool_shutdown",
            RejectReason::Saturated => "pool_saturated",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Shutdown => f.write_str("pool is shut down"),
            RejectReason::Saturated => f.write_str("pool and queue are at capacity"),
        }
    }
}
