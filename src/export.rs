//! Handing a finished clip to the user
//!
//! A clip is exposed under a fresh object URL for exactly as long as it
//! takes the sink to save it, like a browser download link.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::source::ObjectUrlStore;

/// Bytes of a trimmed clip and the name to save them under
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Somewhere exported clips end up
pub trait DownloadSink: Send + Sync {
    /// Save `bytes` as `file_name`, returning where they landed
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Saves downloads into one directory, replacing same-named files
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Publish `artifact` under an object URL, save it through `sink`, then revoke the URL
pub fn deliver_artifact(
    artifact: ExportArtifact,
    store: &ObjectUrlStore,
    sink: &dyn DownloadSink,
) -> Result<PathBuf> {
    let url = store.create(artifact.bytes.into());
    let saved = store
        .fetch(&url)
        .and_then(|bytes| sink.save(&artifact.file_name, &bytes));
    store.revoke(&url);

    let path = saved?;
    tracing::info!(path = %path.display(), "Exported clip");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deliver_writes_file_and_revokes_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectUrlStore::new();
        let sink = DirectorySink::new(dir.path().join("downloads"));

        let artifact = ExportArtifact {
            file_name: "output.mp3".to_string(),
            bytes: vec![1, 2, 3],
        };
        let path = deliver_artifact(artifact, &store, &sink).unwrap();

        assert_eq!(path, dir.path().join("downloads").join("output.mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
        assert!(store.is_empty());
    }

    #[test]
    fn test_deliver_replaces_existing_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = ObjectUrlStore::new();
        let sink = DirectorySink::new(dir.path());
        for bytes in [vec![1u8; 10], vec![2u8; 3]] {
            let artifact = ExportArtifact {
                file_name: "output.mp3".to_string(),
                bytes,
            };
            deliver_artifact(artifact, &store, &sink).unwrap();
        }
        assert_eq!(std::fs::read(dir.path().join("output.mp3")).unwrap(), vec![2u8; 3]);
    }

    #[test]
    fn test_failed_save_still_revokes() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let store = ObjectUrlStore::new();
        let sink = DirectorySink::new(blocker.path());
        let artifact = ExportArtifact {
            file_name: "output.mp3".to_string(),
            bytes: vec![0],
        };
        assert!(deliver_artifact(artifact, &store, &sink).is_err());
        assert!(store.is_empty());
    }
}
