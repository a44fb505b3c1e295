pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("work pool exhausted ({capacity} units in use)")]
    PoolExhausted { capacity: usize },

    #[error("handle belongs to a different arena")]
    ForeignHandle,

    #[error("executor error: {0}")]
    Executor(String),

    #[error("work unit panicked: {0}")]
    WorkerPanic(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }
}
