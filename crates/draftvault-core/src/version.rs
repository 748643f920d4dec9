use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Vendor families fronted by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    SharePoint,
    OneDrive,
    GoogleDrive,
    S3,
    WebDav,
}

impl StorageKind {
    /// Whether this vendor family surfaces a version/change id on its files.
    ///
    /// WebDAV-style mounts never do, so a missing version marker there is
    /// expected evidence rather than a signal worth investigating.
    pub fn exposes_version_ids(self) -> bool {
        !matches!(self, Self::WebDav)
    }
}

/// Last externally-observed version of a file.
///
/// Written only by the vendor backend after a successful save; read-only to
/// conflict detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMarker {
    pub file_id: String,
    pub storage_kind: StorageKind,
    /// `None` when the vendor never reported a version id for this file.
    pub version_id: Option<String>,
}

/// Read access to per-file version markers.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Last recorded version marker for a file, if any.
    async fn last_version(
        &self,
        file_id: &str,
        kind: StorageKind,
    ) -> Result<Option<VersionMarker>, StoreError>;
}
