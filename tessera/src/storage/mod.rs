// Blob storage: ids and metadata only, content stays with the collaborator

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TesseraError};

/// Table name under which stored files are reported.
pub const STORAGE: &str = "_storage";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(String);

impl StorageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub storage_id: StorageId,
    /// Base64 of the SHA-256 digest of the content
    pub sha256: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn store(&self, bytes: Vec<u8>, content_type: Option<String>) -> Result<StorageId>;

    async fn get_metadata(&self, id: &StorageId) -> Result<Option<FileMetadata>>;

    async fn delete(&self, id: &StorageId) -> Result<()>;

    /// Whether `raw` is a storage id this backend issued.
    fn normalize_id(&self, raw: &str) -> Option<StorageId>;
}

#[derive(Debug, Default)]
struct Blobs {
    files: HashMap<String, (FileMetadata, Vec<u8>)>,
    issued: Vec<String>,
}

/// In-process blob storage.
#[derive(Debug, Default)]
pub struct MemoryBlobStorage {
    blobs: RwLock<Blobs>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn store(&self, bytes: Vec<u8>, content_type: Option<String>) -> Result<StorageId> {
        let id = StorageId(nanoid::nanoid!());
        let metadata = FileMetadata {
            storage_id: id.clone(),
            sha256: STANDARD.encode(Sha256::digest(&bytes)),
            size: bytes.len() as u64,
            content_type,
        };
        log::debug!("Stored blob {id} ({} bytes)", metadata.size);

        let mut blobs = self.blobs.write();
        blobs.issued.push(id.0.clone());
        blobs.files.insert(id.0.clone(), (metadata, bytes));
        Ok(id)
    }

    async fn get_metadata(&self, id: &StorageId) -> Result<Option<FileMetadata>> {
        Ok(self.blobs.read().files.get(id.as_str()).map(|(meta, _)| meta.clone()))
    }

    async fn delete(&self, id: &StorageId) -> Result<()> {
        let removed = self.blobs.write().files.remove(id.as_str());
        match removed {
            Some(_) => {
                log::debug!("Deleted blob {id}");
                Ok(())
            }
            None => Err(TesseraError::NotFound {
                table: STORAGE.to_string(),
                id: id.to_string(),
            }),
        }
    }

    fn normalize_id(&self, raw: &str) -> Option<StorageId> {
        let blobs = self.blobs.read();
        blobs
            .issued
            .iter()
            .any(|issued| issued == raw)
            .then(|| StorageId(raw.to_string()))
    }
}

/// Read-only storage handle available to queries.
#[derive(Clone)]
pub struct StorageReader {
    backend: Arc<dyn BlobStorage>,
}

impl StorageReader {
    pub fn new(backend: Arc<dyn BlobStorage>) -> Self {
        StorageReader { backend }
    }

    pub async fn get_metadata(&self, id: &StorageId) -> Result<Option<FileMetadata>> {
        self.backend.get_metadata(id).await
    }

    pub fn normalize_id(&self, raw: &str) -> Option<StorageId> {
        self.backend.normalize_id(raw)
    }
}

/// Storage handle for mutations and actions.
#[derive(Clone)]
pub struct StorageWriter {
    reader: StorageReader,
}

impl StorageWriter {
    pub fn new(backend: Arc<dyn BlobStorage>) -> Self {
        StorageWriter {
            reader: StorageReader::new(backend),
        }
    }

    pub async fn store(&self, bytes: Vec<u8>, content_type: Option<String>) -> Result<StorageId> {
        self.reader.backend.store(bytes, content_type).await
    }

    pub async fn delete(&self, id: &StorageId) -> Result<()> {
        self.reader.backend.delete(id).await
    }
}

impl std::ops::Deref for StorageWriter {
    type Target = StorageReader;

    fn deref(&self) -> &StorageReader {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_metadata() {
        let storage = StorageWriter::new(Arc::new(MemoryBlobStorage::new()));
        let id = storage
            .store(b"hello".to_vec(), Some("text/plain".into()))
            .await
            .unwrap();

        let meta = storage.get_metadata(&id).await.unwrap().unwrap();
        assert_eq!(meta.size, 5);
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
        assert_eq!(meta.sha256, "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=");
        assert_eq!(storage.normalize_id(id.as_str()), Some(id.clone()));
    }

    #[tokio::test]
    async fn test_delete_keeps_id_normalizable() {
        let storage = StorageWriter::new(Arc::new(MemoryBlobStorage::new()));
        let id = storage.store(vec![1, 2, 3], None).await.unwrap();

        storage.delete(&id).await.unwrap();
        assert_eq!(storage.get_metadata(&id).await.unwrap(), None);
        assert!(storage.delete(&id).await.unwrap_err().is_not_found());
        assert!(storage.normalize_id(id.as_str()).is_some());
        assert!(storage.normalize_id("unknown").is_none());
    }
}
