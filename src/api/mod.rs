mod client;
pub mod content_disposition;
mod models;
mod poll;

pub use client::{ApiClient, ApiError, RequestOptions, Result};
pub use models::{
    ApiConfig, CleanupResponse, DownloadRequest, HealthResponse, ProgressResponse,
    ProgressSnapshot, ProgressStatus, StartDownloadResponse, VideoInfoResponse, DEFAULT_BASE_URL,
    DEFAULT_POLL_INTERVAL,
};
pub use poll::{PollCancel, PollOptions, PollState};
