pub mod error;
pub mod model;
pub mod sink;

pub use error::{AppError, SaveError};
pub use model::{DownloadEvent, DownloadHandle, DownloadedArtifact, FetchedFile};
pub use sink::ArtifactSink;
