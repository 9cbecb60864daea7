//! Client for the YouTube audio downloader backend.
//!
//! [`api::ApiClient`] wraps the backend's HTTP API: video metadata, job
//! submission, progress polling and artifact retrieval.
//! [`application::DownloadCoordinator`] runs the whole flow for one URL and
//! hands the resulting file to an [`domain::ArtifactSink`].

pub mod api;
pub mod application;
pub mod domain;
pub mod utils;
