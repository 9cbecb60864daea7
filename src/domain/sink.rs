use std::future::Future;
use std::path::PathBuf;

use super::{DownloadedArtifact, SaveError};

/// Host save mechanism: takes ownership of a retrieved artifact and
/// reports where it ended up.
///
/// Implementations must release any temporary resource they allocate,
/// whether or not the save succeeds.
pub trait ArtifactSink {
    fn save(
        &self,
        artifact: DownloadedArtifact,
    ) -> impl Future<Output = Result<PathBuf, SaveError>> + Send;
}
