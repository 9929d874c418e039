use std::{io, path::PathBuf};

pub type Result<T> = std::result::Result<T, TpoolError>;

#[derive(Debug, thiserror::Error)]
pub enum TpoolError {
    #[error("thread pool is shut down")]
    PoolStopped,

    #[error("task failed: {0}")]
    TaskFailure(String),

    #[error("task was dropped before it ran")]
    HandleAbandoned,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("rayon error: {0}")]
    Rayon(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("cannot decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TpoolError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        TpoolError::Config(msg.into())
    }
}
