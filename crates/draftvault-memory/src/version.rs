use async_trait::async_trait;
use dashmap::DashMap;
use draftvault_core::{StorageKind, StoreError, VersionMarker, VersionStore};

/// In-memory version-marker store: (file_id, kind) -> VersionMarker.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    markers: DashMap<(String, StorageKind), VersionMarker>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a marker, as the vendor backend would after a successful write.
    pub fn set(&self, marker: VersionMarker) {
        self.markers
            .insert((marker.file_id.clone(), marker.storage_kind), marker);
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn last_version(
        &self,
        file_id: &str,
        kind: StorageKind,
    ) -> Result<Option<VersionMarker>, StoreError> {
        Ok(self
            .markers
            .get(&(file_id.to_string(), kind))
            .map(|entry| entry.clone()))
    }
}
