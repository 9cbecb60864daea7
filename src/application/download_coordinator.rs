use tracing::info;

use crate::{
    api::{ApiClient, PollOptions, VideoInfoResponse},
    domain::{AppError, ArtifactSink, DownloadEvent, FetchedFile},
};

/// Runs one URL through info lookup, job submission, polling and retrieval
#[derive(Clone)]
pub struct DownloadCoordinator<S> {
    api_client: ApiClient,
    sink: S,
    poll_options: PollOptions,
}

impl<S: ArtifactSink> DownloadCoordinator<S> {
    pub fn new(api_client: ApiClient, sink: S) -> Self {
        let poll_options = PollOptions::from_config(api_client.config());
        Self {
            api_client,
            sink,
            poll_options,
        }
    }

    pub fn with_poll_options(mut self, poll_options: PollOptions) -> Self {
        self.poll_options = poll_options;
        self
    }

    pub async fn prepare_download(&self, url: &str) -> Result<VideoInfoResponse, AppError> {
        let info = self.api_client.get_video_info(url).await?;
        if !info.success {
            return Err(AppError::VideoInfo(
                info.error
                    .unwrap_or_else(|| "backend returned no details".to_string()),
            ));
        }
        Ok(info)
    }

    pub async fn run<F>(&self, url: &str, mut on_event: F) -> Result<FetchedFile, AppError>
    where
        F: FnMut(DownloadEvent),
    {
        let info = self.prepare_download(url).await?;
        info!(
            title = info.title.as_deref().unwrap_or("Unknown"),
            "Video info received"
        );
        on_event(DownloadEvent::InfoReceived(info));

        let handle = self.api_client.start_download(url).await?.into_handle()?;
        on_event(DownloadEvent::Started(handle.clone()));

        self.api_client
            .poll_download_progress(
                &handle,
                |snapshot| on_event(DownloadEvent::Progress(snapshot.clone())),
                self.poll_options.clone(),
            )
            .await?;

        let fetched = self.api_client.fetch_file(&handle, &self.sink).await?;
        on_event(DownloadEvent::Saved(fetched.clone()));

        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiConfig, ApiError, ProgressStatus};
    use crate::application::DirectorySink;
    use mockito::Matcher;
    use serde_json::json;
    use std::time::Duration;

    fn coordinator(
        server: &mockito::ServerGuard,
        dir: &std::path::Path,
    ) -> DownloadCoordinator<DirectorySink> {
        let mut config = ApiConfig::with_base_url(&server.url()).unwrap();
        config.poll_interval = Duration::from_millis(10);
        let client = ApiClient::new(config).unwrap();
        DownloadCoordinator::new(client, DirectorySink::new(dir))
    }

    #[tokio::test]
    async fn test_run_downloads_and_saves() {
        let mut server = mockito::Server::new_async().await;
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

        server
            .mock("POST", "/video-info")
            .match_body(Matcher::Json(json!({ "url": url })))
            .with_status(200)
            .with_body(r#"{"success": true, "title": "Never Gonna Give You Up"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/download")
            .match_body(Matcher::Json(json!({ "url": url })))
            .with_status(200)
            .with_body(r#"{"success": true, "download_id": "job-7", "message": "Download started"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/progress/job-7")
            .with_status(200)
            .with_body(r#"{"success": true, "progress": {"status": "downloading", "progress": 40}}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/progress/job-7")
            .with_status(200)
            .with_body(r#"{"success": true, "progress": {"status": "completed", "progress": 100}}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("GET", "/download/job-7")
            .with_status(200)
            .with_header("content-disposition", r#"attachment; filename="job-7.mp3""#)
            .with_body(b"mp3-bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut events = Vec::new();
        let fetched = coordinator(&server, dir.path())
            .run(url, |event| events.push(event))
            .await
            .unwrap();

        assert!(fetched.success);
        assert_eq!(fetched.filename, "job-7.mp3");
        assert_eq!(fetched.location, dir.path().join("job-7.mp3"));
        assert_eq!(std::fs::read(&fetched.location).unwrap(), b"mp3-bytes");

        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], DownloadEvent::InfoReceived(info) if info.title.as_deref() == Some("Never Gonna Give You Up")));
        assert!(matches!(&events[1], DownloadEvent::Started(h) if h.as_str() == "job-7"));
        assert!(matches!(&events[2], DownloadEvent::Progress(s) if s.status == ProgressStatus::Downloading));
        assert!(matches!(&events[3], DownloadEvent::Progress(s) if s.status == ProgressStatus::Completed));
        assert!(matches!(&events[4], DownloadEvent::Saved(f) if f.filename == "job-7.mp3"));
    }

    #[tokio::test]
    async fn test_run_stops_on_info_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/video-info")
            .with_status(200)
            .with_body(r#"{"success": false, "error": "Private video"}"#)
            .create_async()
            .await;
        let start = server
            .mock("POST", "/download")
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = coordinator(&server, dir.path())
            .run("https://youtu.be/private", |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::VideoInfo(ref msg) if msg == "Private video"));
        start.assert_async().await;
    }

    #[tokio::test]
    async fn test_run_propagates_progress_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/video-info")
            .with_status(200)
            .with_body(r#"{"success": true, "title": "x"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/download")
            .with_status(200)
            .with_body(r#"{"success": true, "download_id": "job-8"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/progress/job-8")
            .with_status(200)
            .with_body(r#"{"success": true, "progress": {"status": "error", "error": "disk full"}}"#)
            .create_async()
            .await;
        let fetch = server
            .mock("GET", "/download/job-8")
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = coordinator(&server, dir.path())
            .run("https://youtu.be/x", |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Api(ApiError::ProgressFailed(_))));
        assert_eq!(err.to_string(), "disk full");
        fetch.assert_async().await;
    }
}
