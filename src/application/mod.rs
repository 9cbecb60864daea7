mod download_coordinator;
mod sink;

pub use download_coordinator::DownloadCoordinator;
pub use sink::{DialogSink, DirectorySink, HostSink};
