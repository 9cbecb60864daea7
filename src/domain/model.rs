use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::api::{ProgressSnapshot, VideoInfoResponse};

/// Backend-issued identifier of one download job.
///
/// Opaque to the client: it is only ever passed back to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DownloadHandle(String);

impl DownloadHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DownloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DownloadHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DownloadHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Retrieved file, held only until a sink takes it
#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Result of fetching and saving an artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchedFile {
    pub success: bool,
    pub filename: String,
    pub location: PathBuf,
}

/// Progress reported by the download coordinator
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    InfoReceived(VideoInfoResponse),
    Started(DownloadHandle),
    Progress(ProgressSnapshot),
    Saved(FetchedFile),
}
