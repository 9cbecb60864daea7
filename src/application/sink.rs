use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::{ArtifactSink, DownloadedArtifact, SaveError};
use crate::utils::unique_path;

/// Saves artifacts into a directory, never overwriting an existing file
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    async fn save(&self, artifact: DownloadedArtifact) -> Result<PathBuf, SaveError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir)?;
            let target = unique_path(&dir, &artifact.filename);
            persist(&target, &artifact.data, false)
        })
        .await
        .map_err(|e| SaveError::Io(std::io::Error::other(e)))?
    }
}

/// Asks for the destination with a native save dialog
#[derive(Debug, Clone, Default)]
pub struct DialogSink;

impl ArtifactSink for DialogSink {
    async fn save(&self, artifact: DownloadedArtifact) -> Result<PathBuf, SaveError> {
        let target = rfd::AsyncFileDialog::new()
            .set_file_name(&artifact.filename)
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
            .ok_or(SaveError::Cancelled)?;

        // the dialog already confirmed any overwrite
        tokio::task::spawn_blocking(move || persist(&target, &artifact.data, true))
            .await
            .map_err(|e| SaveError::Io(std::io::Error::other(e)))?
    }
}

/// Either sink, picked at runtime
#[derive(Debug, Clone)]
pub enum HostSink {
    Directory(DirectorySink),
    Dialog(DialogSink),
}

impl ArtifactSink for HostSink {
    async fn save(&self, artifact: DownloadedArtifact) -> Result<PathBuf, SaveError> {
        match self {
            HostSink::Directory(sink) => sink.save(artifact).await,
            HostSink::Dialog(sink) => sink.save(artifact).await,
        }
    }
}

/// Writes `data` to a temporary file next to `target`, then renames it into
/// place. The temporary file is removed on every failure path.
fn persist(target: &Path, data: &[u8], overwrite: bool) -> Result<PathBuf, SaveError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(SaveError::InvalidTarget(target.display().to_string()));
        }
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".ytdl-")
        .suffix(".part")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    debug!(tmp = %tmp.path().display(), target = %target.display(), "Persisting artifact");

    if overwrite {
        tmp.persist(target).map_err(|e| SaveError::Io(e.error))?;
    } else {
        tmp.persist_noclobber(target)
            .map_err(|e| SaveError::Io(e.error))?;
    }

    Ok(target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn artifact(name: &str, data: &'static [u8]) -> DownloadedArtifact {
        DownloadedArtifact {
            filename: name.to_string(),
            content_type: Some("audio/mpeg".to_string()),
            data: Bytes::from_static(data),
        }
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".part"))
            .collect()
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("music"));

        let path = sink.save(artifact("song.mp3", b"abc")).await.unwrap();

        assert_eq!(path, dir.path().join("music").join("song.mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        assert!(leftovers(&dir.path().join("music")).is_empty());
    }

    #[tokio::test]
    async fn test_directory_sink_keeps_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("song.mp3"), b"old").unwrap();
        let sink = DirectorySink::new(dir.path());

        let path = sink.save(artifact("song.mp3", b"new")).await.unwrap();

        assert_eq!(path, dir.path().join("song (1).mp3"));
        assert_eq!(std::fs::read(dir.path().join("song.mp3")).unwrap(), b"old");
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_persist_failure_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("song.mp3");
        std::fs::write(&target, b"old").unwrap();

        let err = persist(&target, b"new", false).unwrap_err();

        assert!(matches!(err, SaveError::Io(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"old");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_persist_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("song.mp3");
        std::fs::write(&target, b"old").unwrap();

        persist(&target, b"new", true).unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"new");
        assert!(leftovers(dir.path()).is_empty());
    }
}
