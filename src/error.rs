pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to spawn execution thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("main loop already started")]
    AlreadyStarted,

    #[error("main loop has already stopped")]
    Terminated,

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn task_failed<S: Into<String>>(msg: S) -> Self {
        Error::TaskFailed(msg.into())
    }

    /// True for the two execution-failure variants.
    pub fn is_task_failure(&self) -> bool {
        matches!(self, Error::TaskPanicked(_) | Error::TaskFailed(_))
    }
}
