use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{stored_file_name, FileStore, StorageError};
use crate::models::StoredFile;

/// Stores uploads as plain files under one directory, created on demand.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(
        &self,
        user_id: i64,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let filename = stored_file_name(user_id, original_name, bytes, chrono::Local::now());
        let path = self.root.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(user_id, path = %path.display(), size = bytes.len(), "Upload stored");

        Ok(StoredFile {
            filename,
            filepath: path.display().to_string(),
            size: bytes.len() as u64,
        })
    }
}

/// In-memory store for tests: names files like the real store but writes
/// nothing, or fails every call.
pub struct MockFileStore {
    fail: bool,
    calls: AtomicUsize,
}

impl MockFileStore {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn store(
        &self,
        user_id: i64,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(StorageError::Unavailable("mock store is read-only".into()));
        }
        let filename = stored_file_name(user_id, original_name, bytes, chrono::Local::now());
        Ok(StoredFile {
            filepath: format!("/mock/{filename}"),
            filename,
            size: bytes.len() as u64,
        })
    }
}
