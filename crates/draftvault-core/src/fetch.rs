use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Vendor-opaque handle to one source object (file or folder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Provider-specific identifier.
    pub id: String,
    /// Display path within the selection; becomes the archive entry path.
    pub path: String,
    pub name: String,
    pub folder: bool,
}

/// One fetched source object.
#[derive(Debug, Clone)]
pub struct FetchedObject {
    pub name: String,
    pub size: u64,
    pub bytes: Vec<u8>,
}

/// Per-object retrieval from the vendor backend.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Fetch one object's bytes. `StoreError::NotFound` maps to an archive
    /// exclusion, not a job failure.
    async fn fetch(&self, source: &SourceRef) -> Result<FetchedObject, StoreError>;

    /// List the direct children of a folder.
    async fn list_children(&self, folder: &SourceRef) -> Result<Vec<SourceRef>, StoreError>;
}
