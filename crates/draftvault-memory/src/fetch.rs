use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use draftvault_core::{FetchedObject, ObjectFetcher, SourceRef, StoreError};

#[derive(Debug, Clone)]
struct StoredObject {
    name: String,
    /// Reported size; may exceed `bytes.len()` to simulate oversized objects
    /// without allocating them.
    size: u64,
    bytes: Vec<u8>,
    delay: Option<Duration>,
}

/// In-memory object fetcher over a synthetic file/folder tree.
///
/// Files are keyed by `SourceRef::id`; folders map to their direct children.
/// Optional per-file delays let tests exercise producer scheduling.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    files: DashMap<String, StoredObject>,
    folders: DashMap<String, Vec<SourceRef>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under `id` with the given payload.
    pub fn add_file(&self, id: &str, name: &str, bytes: Vec<u8>) {
        let size = bytes.len() as u64;
        self.add_file_inner(id, name, size, bytes, None);
    }

    /// Register a file whose reported size differs from its payload.
    pub fn add_file_with_size(&self, id: &str, name: &str, size: u64, bytes: Vec<u8>) {
        self.add_file_inner(id, name, size, bytes, None);
    }

    /// Register a file whose fetch blocks for `delay` first.
    pub fn add_file_with_delay(&self, id: &str, name: &str, bytes: Vec<u8>, delay: Duration) {
        let size = bytes.len() as u64;
        self.add_file_inner(id, name, size, bytes, Some(delay));
    }

    fn add_file_inner(
        &self,
        id: &str,
        name: &str,
        size: u64,
        bytes: Vec<u8>,
        delay: Option<Duration>,
    ) {
        self.files.insert(
            id.to_string(),
            StoredObject {
                name: name.to_string(),
                size,
                bytes,
                delay,
            },
        );
    }

    /// Register a folder's direct children.
    pub fn add_folder(&self, id: &str, children: Vec<SourceRef>) {
        self.folders.insert(id.to_string(), children);
    }
}

#[async_trait]
impl ObjectFetcher for MemoryFetcher {
    async fn fetch(&self, source: &SourceRef) -> Result<FetchedObject, StoreError> {
        let stored = self
            .files
            .get(&source.id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(source.path.clone()))?;

        if let Some(delay) = stored.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(FetchedObject {
            name: stored.name,
            size: stored.size,
            bytes: stored.bytes,
        })
    }

    async fn list_children(&self, folder: &SourceRef) -> Result<Vec<SourceRef>, StoreError> {
        self.folders
            .get(&folder.id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::NotFound(folder.path.clone()))
    }
}
