use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("stored file not found: {0}")]
    NotFound(String),

    #[error("file storage failure: {0}")]
    Backend(String),
}

/// Read access to chat upload storage, keyed by the storage key recorded on
/// the cloud file. `download_chat_files` pulls bytes through this seam.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn download(&self, storage_key: &str) -> Result<Vec<u8>, FileStorageError>;
}

#[derive(Default)]
pub struct MemoryFileStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, storage_key: impl Into<String>, content: Vec<u8>) {
        let mut files = self.files.lock().expect("file storage mutex poisoned");
        files.insert(storage_key.into(), content);
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn download(&self, storage_key: &str) -> Result<Vec<u8>, FileStorageError> {
        let files = self
            .files
            .lock()
            .map_err(|_| FileStorageError::Backend("file storage mutex poisoned".to_string()))?;
        files
            .get(storage_key)
            .cloned()
            .ok_or_else(|| FileStorageError::NotFound(storage_key.to_string()))
    }
}
