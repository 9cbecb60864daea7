//! Poll-until-terminal loop over `GET /progress/{id}`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::client::{ApiClient, ApiError, Result};
use super::models::{
    ApiConfig, ProgressResponse, ProgressSnapshot, ProgressStatus, DEFAULT_POLL_INTERVAL,
};
use crate::domain::DownloadHandle;

/// Stops a running poll loop from another task.
#[derive(Debug, Clone, Default)]
pub struct PollCancel {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl PollCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// `None` polls until the backend reports a terminal status
    pub max_attempts: Option<u32>,
    pub cancel: Option<PollCancel>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            cancel: None,
        }
    }
}

impl PollOptions {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_attempts: config.max_poll_attempts,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: PollCancel) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[derive(Debug)]
pub enum PollState {
    Polling { attempt: u32 },
    Done(ProgressSnapshot),
    Failed(ApiError),
}

/// Interval wait that returns early when cancelled.
struct Ticker {
    interval: Duration,
    cancel: Option<PollCancel>,
}

impl Ticker {
    /// `false` if cancelled before the interval elapsed
    async fn wait(&self) -> bool {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(self.interval).await;
            return true;
        };

        // register before checking the flag so a concurrent cancel is not missed
        let notified = cancel.inner.notify.notified();
        if cancel.is_cancelled() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.interval) => true,
            _ = notified => false,
        }
    }
}

impl ApiClient {
    /// Poll progress for `handle` until the job completes or fails.
    ///
    /// `on_progress` sees every snapshot, terminal ones included. The first
    /// check is immediate, later ones are `options.interval` apart. Resolves
    /// with the `completed` snapshot.
    pub async fn poll_download_progress<F>(
        &self,
        handle: &DownloadHandle,
        mut on_progress: F,
        options: PollOptions,
    ) -> Result<ProgressSnapshot>
    where
        F: FnMut(&ProgressSnapshot),
    {
        let ticker = Ticker {
            interval: options.interval,
            cancel: options.cancel.clone(),
        };
        let mut state = PollState::Polling { attempt: 0 };

        loop {
            state = match state {
                PollState::Polling { attempt } => {
                    if options.cancel.as_ref().is_some_and(PollCancel::is_cancelled) {
                        PollState::Failed(ApiError::Cancelled)
                    } else if options.max_attempts.is_some_and(|max| attempt >= max) {
                        PollState::Failed(ApiError::AttemptsExhausted(attempt))
                    } else if attempt > 0 && !ticker.wait().await {
                        PollState::Failed(ApiError::Cancelled)
                    } else {
                        let response = self.get_download_progress(handle).await;
                        next_state(handle, attempt + 1, response, &mut on_progress)
                    }
                }
                PollState::Done(snapshot) => {
                    info!(%handle, "Download completed");
                    return Ok(snapshot);
                }
                PollState::Failed(e) => {
                    warn!(%handle, error = %e, "Progress polling stopped");
                    return Err(e);
                }
            };
        }
    }
}

fn next_state<F>(
    handle: &DownloadHandle,
    attempt: u32,
    response: Result<ProgressResponse>,
    on_progress: &mut F,
) -> PollState
where
    F: FnMut(&ProgressSnapshot),
{
    let response = match response {
        Ok(response) => response,
        Err(e) => return PollState::Failed(e),
    };

    if !response.success {
        let message = response
            .error
            .unwrap_or_else(|| "Failed to get progress".to_string());
        return PollState::Failed(ApiError::LogicalFailure(message));
    }

    let Some(snapshot) = response.progress else {
        return PollState::Failed(ApiError::InvalidResponse(
            "progress missing from response".to_string(),
        ));
    };

    debug!(
        %handle,
        attempt,
        status = %snapshot.status,
        percent = snapshot.percent,
        "Progress"
    );
    on_progress(&snapshot);

    match snapshot.status {
        ProgressStatus::Completed => PollState::Done(snapshot),
        ProgressStatus::Error => {
            let message = snapshot
                .error
                .unwrap_or_else(|| "Download failed".to_string());
            PollState::Failed(ApiError::ProgressFailed(message))
        }
        _ => PollState::Polling { attempt },
    }
}
