//! # Ephemeral Scratch Storage
//!
//! Each request's audio payload is materialized as a uniquely named file in a
//! scratch directory for the duration of that request only. Removal is
//! guaranteed on every exit path — success, recognition failure, or a panic
//! mid-request — by tying deletion to the guard's `Drop`.
//!
//! ## Invariants:
//! - File names are request-scoped UUIDs, so concurrent requests never collide
//! - A scratch file exists only between "payload validated" and "pipeline
//!   finished" for its owning request
//! - A failed delete is logged but never alters the response already being
//!   produced

use crate::error::AppError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A directory used as write-once/read-once/delete-once scratch space.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    /// Create a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AppError::Storage(format!("failed to create scratch dir: {}", e)))?;
        Ok(Self { dir })
    }

    /// Write the payload to a uniquely named scratch file.
    ///
    /// The returned [`StoredAudio`] guard deletes the file when dropped, so
    /// callers keep it alive exactly as long as the file is needed.
    pub async fn store(&self, bytes: &[u8]) -> Result<StoredAudio, AppError> {
        let path = self.dir.join(format!("{}.wav", Uuid::new_v4().simple()));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("failed to write scratch file: {}", e)))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored scratch audio");
        Ok(StoredAudio { path })
    }
}

/// Scoped guard for one stored audio file.
///
/// Dropping the guard removes the file best-effort. An already-missing file
/// is fine (delete is idempotent); any other failure is recorded in the log
/// and deliberately not propagated — cleanup must never mask the primary
/// result of the request.
#[derive(Debug)]
pub struct StoredAudio {
    path: PathBuf,
}

impl StoredAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoredAudio {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch audio file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_writes_and_drop_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::new(dir.path()).unwrap();

        let stored = store.store(b"audio bytes").await.unwrap();
        let path = stored.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"audio bytes");

        drop(stored);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::new(dir.path()).unwrap();

        let stored = store.store(b"x").await.unwrap();
        // Simulate something else removing the file first; the drop must not panic
        std::fs::remove_file(stored.path()).unwrap();
        drop(stored);
    }

    #[tokio::test]
    async fn test_concurrent_stores_get_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::new(dir.path()).unwrap();

        let mut guards = Vec::new();
        for _ in 0..20 {
            guards.push(store.store(b"x").await.unwrap());
        }

        let mut paths: Vec<_> = guards.iter().map(|g| g.path().to_path_buf()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 20);
    }

    #[test]
    fn test_new_rejects_unwritable_dir() {
        let result = ScratchStore::new("/proc/definitely/not/writable");
        assert!(result.is_err());
    }
}
