use std::io::ErrorKind;
use std::path::Path;

use crate::extractors::ExtractionResult;

/// Exclusive owner of one request's audio file.
///
/// The file is deleted by [`Artifact::discard`]; if the owner is dropped
/// without discarding (early return, panic), `Drop` deletes it instead.
#[derive(Debug)]
pub struct Artifact {
    result: ExtractionResult,
    removed: bool,
}

impl Artifact {
    pub fn new(result: ExtractionResult) -> Self {
        Self { result, removed: false }
    }

    pub fn result(&self) -> &ExtractionResult {
        &self.result
    }

    pub fn path(&self) -> &Path {
        &self.result.path
    }

    /// Delete the file. Returns `false` if it could not be removed, in which
    /// case `Drop` makes one more attempt.
    pub async fn discard(mut self) -> bool {
        self.try_remove().await
    }

    async fn try_remove(&mut self) -> bool {
        let removed = match tokio::fs::remove_file(&self.result.path).await {
            Ok(()) => {
                tracing::debug!("Deleted artifact {}", self.result.path.display());
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                tracing::error!("Failed to delete artifact {}: {}", self.result.path.display(), e);
                false
            }
        };
        self.removed = removed;
        removed
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.result.path) {
            Ok(()) => tracing::warn!("Artifact {} deleted on drop", self.result.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::error!("Failed to delete artifact {}: {}", self.result.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact_in(dir: &Path) -> Artifact {
        let path = dir.join("req.mp3");
        fs_err::write(&path, b"mp3").unwrap();
        Artifact::new(ExtractionResult {
            path,
            title: "t".into(),
            size_bytes: 3,
        })
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path());
        let path = artifact.path().to_path_buf();

        assert!(artifact.discard().await);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path());
        let path = artifact.path().to_path_buf();

        drop(artifact);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_discard_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact_in(dir.path());
        fs_err::remove_file(artifact.path()).unwrap();

        assert!(artifact.discard().await);
    }

    #[tokio::test]
    async fn test_failed_discard_leaves_cleanup_to_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("req.mp3");
        // A non-empty directory cannot be removed as a file
        fs_err::create_dir_all(path.join("busy")).unwrap();

        let mut artifact = Artifact::new(ExtractionResult {
            path: path.clone(),
            title: "t".into(),
            size_bytes: 3,
        });
        assert!(!artifact.try_remove().await);
        assert!(!artifact.removed);

        fs_err::remove_dir_all(&path).unwrap();
        fs_err::write(&path, b"mp3").unwrap();

        drop(artifact);
        assert!(!path.exists());
    }
}
