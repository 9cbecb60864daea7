use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::domain::DownloadHandle;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Body of the POST endpoints that take a source URL
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadRequest {
    pub url: String,
}

/// Response from the /video-info endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct VideoInfoResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response from POST /download
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StartDownloadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<DownloadHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StartDownloadResponse {
    /// Handle of the accepted job, or the failure the backend reported
    pub fn into_handle(self) -> super::Result<DownloadHandle> {
        if !self.success {
            return Err(super::ApiError::LogicalFailure(
                self.error
                    .unwrap_or_else(|| "Failed to start download".to_string()),
            ));
        }
        self.download_id.ok_or_else(|| {
            super::ApiError::InvalidResponse("download_id missing from response".to_string())
        })
    }
}

/// Response from GET /progress/{id}
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ProgressResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Job status as reported by the backend.
///
/// `started` and `finished` are emitted by the backend between the
/// documented states; neither is terminal.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    #[default]
    Queued,
    Started,
    Downloading,
    Finished,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl ProgressStatus {
    /// `completed` and `error` end a polling loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Error)
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProgressStatus::Queued => "queued",
            ProgressStatus::Started => "started",
            ProgressStatus::Downloading => "downloading",
            ProgressStatus::Finished => "finished",
            ProgressStatus::Completed => "completed",
            ProgressStatus::Error => "error",
            ProgressStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One polled state of a download job
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ProgressSnapshot {
    pub status: ProgressStatus,
    /// Completion in percent, 0 to 100
    #[serde(default, alias = "progress")]
    pub percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response from GET /health, or the local stand-in when the check fails
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HealthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_downloads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Response from POST /cleanup
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CleanupResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_up: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_downloads: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
}

/// Configuration for the API client
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub poll_interval: Duration,
    pub max_poll_attempts: Option<u32>,
    pub request_timeout: Option<Duration>,
}

impl ApiConfig {
    pub const ENV_API_URL: &'static str = "YTDL_API_URL";
    pub const ENV_POLL_INTERVAL_MS: &'static str = "YTDL_POLL_INTERVAL_MS";
    pub const ENV_REQUEST_TIMEOUT_SECS: &'static str = "YTDL_REQUEST_TIMEOUT_SECS";

    pub fn with_base_url(base_url: &str) -> super::Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Default::default()
        })
    }

    pub fn set_base_url(&mut self, base_url: &str) -> super::Result<()> {
        self.base_url = parse_base_url(base_url)?;
        Ok(())
    }

    /// Defaults overridden by the `YTDL_*` environment variables.
    pub fn from_env() -> super::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> super::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(Self::ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = parse_base_url(url.trim())?;
        }
        if let Some(ms) = lookup(Self::ENV_POLL_INTERVAL_MS) {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                super::ApiError::InvalidConfig(format!(
                    "{} must be a number of milliseconds, got {:?}",
                    Self::ENV_POLL_INTERVAL_MS,
                    ms
                ))
            })?;
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = lookup(Self::ENV_REQUEST_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                super::ApiError::InvalidConfig(format!(
                    "{} must be a number of seconds, got {:?}",
                    Self::ENV_REQUEST_TIMEOUT_SECS,
                    secs
                ))
            })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: None,
            request_timeout: None,
        }
    }
}

fn parse_base_url(raw: &str) -> super::Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| super::ApiError::InvalidConfig(format!("invalid base URL {:?}: {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(super::ApiError::InvalidConfig(format!(
            "base URL {:?} cannot carry a path",
            raw
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_snapshot_accepts_backend_keys() {
        let snapshot: ProgressSnapshot = serde_json::from_value(json!({
            "status": "downloading",
            "progress": 42.5,
            "speed": "1.2MiB/s",
            "eta": "00:10",
            "temp_dir": "/tmp/yt_download_x"
        }))
        .unwrap();

        assert_eq!(snapshot.status, ProgressStatus::Downloading);
        assert_eq!(snapshot.percent, 42.5);
        assert_eq!(snapshot.speed.as_deref(), Some("1.2MiB/s"));
        assert_eq!(snapshot.extra["temp_dir"], json!("/tmp/yt_download_x"));
    }

    #[test]
    fn test_unknown_status_is_not_terminal() {
        let snapshot: ProgressSnapshot =
            serde_json::from_value(json!({"status": "postprocessing", "percent": 99})).unwrap();
        assert_eq!(snapshot.status, ProgressStatus::Unknown);
        assert!(!snapshot.status.is_terminal());
        assert!(ProgressStatus::Completed.is_terminal());
        assert!(ProgressStatus::Error.is_terminal());
        assert!(!ProgressStatus::Finished.is_terminal());
    }

    #[test]
    fn test_into_handle_reports_logical_failure() {
        let response: StartDownloadResponse =
            serde_json::from_value(json!({"success": false, "error": "URL is required"})).unwrap();
        let err = response.into_handle().unwrap_err();
        assert!(matches!(err, crate::api::ApiError::LogicalFailure(_)));
        assert_eq!(err.to_string(), "URL is required");

        let response: StartDownloadResponse =
            serde_json::from_value(json!({"success": true})).unwrap();
        assert!(matches!(
            response.into_handle(),
            Err(crate::api::ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.base_url.as_str(), "http://localhost:5000/api");
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert!(config.max_poll_attempts.is_none());
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ApiConfig::from_lookup(|key| match key {
            "YTDL_API_URL" => Some("https://example.com/backend/api".to_string()),
            "YTDL_POLL_INTERVAL_MS" => Some("250".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.base_url.as_str(), "https://example.com/backend/api");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let bad_url = ApiConfig::from_lookup(|key| {
            (key == "YTDL_API_URL").then(|| "not a url".to_string())
        });
        assert!(matches!(bad_url, Err(crate::api::ApiError::InvalidConfig(_))));

        let bad_interval = ApiConfig::from_lookup(|key| {
            (key == "YTDL_POLL_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert!(matches!(
            bad_interval,
            Err(crate::api::ApiError::InvalidConfig(_))
        ));
    }
}
