use thiserror::Error;

use crate::api::ApiError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Video info lookup failed: {0}")]
    VideoInfo(String),
}

/// Failure of a host save action
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Save cancelled")]
    Cancelled,

    #[error("Invalid save target: {0}")]
    InvalidTarget(String),
}
