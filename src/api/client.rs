use bytes::BytesMut;
use futures::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use super::content_disposition::{filename_or_default, DEFAULT_FILENAME};
use super::models::{
    ApiConfig, CleanupResponse, DownloadRequest, ErrorBody, HealthResponse, ProgressResponse,
    StartDownloadResponse, VideoInfoResponse,
};
use crate::domain::{ArtifactSink, DownloadHandle, DownloadedArtifact, FetchedFile, SaveError};
use crate::utils::sanitize_filename;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Non-success status; the message is the server's `error` field when present
    #[error("{message}")]
    Request { status: u16, message: String },

    /// The response parsed but carried `success: false`
    #[error("{0}")]
    LogicalFailure(String),

    /// The backend reported `status: "error"` for the job
    #[error("{0}")]
    ProgressFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Polling cancelled")]
    Cancelled,

    #[error("No terminal status after {0} progress checks")]
    AttemptsExhausted(u32),

    #[error("Failed to save file: {0}")]
    Save(#[from] SaveError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Per-request options merged over the client defaults
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<String>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn post_json<T: Serialize>(body: &T) -> Result<Self> {
        let body = serde_json::to_string(body)
            .map_err(|e| ApiError::InvalidRequest(format!("JSON encode error: {}", e)))?;
        Ok(Self {
            method: Method::POST,
            body: Some(body),
            ..Default::default()
        })
    }
}

#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// `base_url` followed by the given path segments, each percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::InvalidConfig(format!(
                    "base URL {} cannot carry a path",
                    self.config.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// One round trip to `segments` under the base URL.
    ///
    /// Sends `Content-Type: application/json` unless the options override it,
    /// and decodes a 2xx body as `T`. Failures are logged, then returned.
    pub async fn make_request<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        options: RequestOptions,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let result = self.send_json(&url, options).await;
        if let Err(e) = &result {
            error!(url = %url, error = %e, "API request failed");
        }
        result
    }

    async fn send_json<T: DeserializeOwned>(&self, url: &Url, options: RequestOptions) -> Result<T> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(options.headers);

        debug!(method = %options.method, url = %url, "Sending API request");

        let mut request = self
            .http
            .request(options.method, url.clone())
            .headers(headers);
        if let Some(body) = options.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        serde_json::from_slice(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("JSON decode error: {}", e)))
    }

    /// Metadata for `url` before downloading it
    pub async fn get_video_info(&self, url: &str) -> Result<VideoInfoResponse> {
        let body = DownloadRequest {
            url: url.to_string(),
        };
        self.make_request(&["video-info"], RequestOptions::post_json(&body)?)
            .await
    }

    /// Enqueue a download job; the envelope carries the job's handle
    pub async fn start_download(&self, url: &str) -> Result<StartDownloadResponse> {
        let body = DownloadRequest {
            url: url.to_string(),
        };
        let response: StartDownloadResponse = self
            .make_request(&["download"], RequestOptions::post_json(&body)?)
            .await?;

        if let Some(handle) = &response.download_id {
            info!(%handle, "Download job accepted");
        }
        Ok(response)
    }

    pub async fn get_download_progress(&self, handle: &DownloadHandle) -> Result<ProgressResponse> {
        self.make_request(&["progress", handle.as_str()], RequestOptions::default())
            .await
    }

    /// Liveness probe. Never fails: errors come back as `success: false`.
    pub async fn check_health(&self) -> HealthResponse {
        match self
            .make_request(&["health"], RequestOptions::default())
            .await
        {
            Ok(health) => health,
            Err(e) => HealthResponse::failed(e.to_string()),
        }
    }

    /// Ask the backend to forget finished jobs older than its retention window
    pub async fn cleanup(&self) -> Result<CleanupResponse> {
        let options = RequestOptions {
            method: Method::POST,
            ..Default::default()
        };
        self.make_request(&["cleanup"], options).await
    }

    /// Where the artifact for `handle` can be fetched
    pub fn download_url(&self, handle: &DownloadHandle) -> Result<Url> {
        self.endpoint(&["download", handle.as_str()])
    }

    /// Retrieve the artifact produced by a completed job
    pub async fn fetch_artifact(&self, handle: &DownloadHandle) -> Result<DownloadedArtifact> {
        let url = self.download_url(handle)?;
        let result = self.receive_artifact(&url).await;
        if let Err(e) = &result {
            error!(url = %url, error = %e, "Download failed");
        }
        result
    }

    async fn receive_artifact(&self, url: &Url) -> Result<DownloadedArtifact> {
        debug!(url = %url, "Fetching artifact");

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(error_from_body(status, &body));
        }

        let headers = response.headers();
        let disposition = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok());
        let filename = sanitize_filename(&filename_or_default(disposition));
        let filename = if filename.is_empty() {
            DEFAULT_FILENAME.to_string()
        } else {
            filename
        };
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let data = response
            .bytes_stream()
            .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                buf.extend_from_slice(&chunk);
                Ok(buf)
            })
            .await?
            .freeze();

        debug!(url = %url, %filename, bytes = data.len(), "Artifact received");

        Ok(DownloadedArtifact {
            filename,
            content_type,
            data,
        })
    }

    /// Retrieve the artifact for `handle` and hand it to `sink`
    pub async fn fetch_file<S: ArtifactSink>(
        &self,
        handle: &DownloadHandle,
        sink: &S,
    ) -> Result<FetchedFile> {
        let artifact = self.fetch_artifact(handle).await?;
        let filename = artifact.filename.clone();

        let location = sink.save(artifact).await.map_err(|e| {
            error!(%handle, %filename, error = %e, "Saving artifact failed");
            ApiError::Save(e)
        })?;

        info!(%handle, %filename, location = %location.display(), "Artifact saved");

        Ok(FetchedFile {
            success: true,
            filename,
            location,
        })
    }
}

fn error_from_body(status: StatusCode, body: &[u8]) -> ApiError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| format!("HTTP error, status={}", status.as_u16()));

    ApiError::Request {
        status: status.as_u16(),
        message,
    }
}
