//! Error type for the viewer binary.

use thiserror::Error;

use crate::mux::MuxError;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error("feed closed by {0}")]
    FeedClosed(String),
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
