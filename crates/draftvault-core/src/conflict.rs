use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::version::StorageKind;

/// Why a save was diverted into a conflict copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    VersionsConflicted,
    UnsharedOrDeleted,
    NoEditingRights,
    SessionNotFound,
    ViewOnlySession,
}

impl ConflictReason {
    /// `SessionNotFound` and `ViewOnlySession` both mean the editing session
    /// was already gone when the save arrived.
    pub fn implies_expired_session(self) -> bool {
        matches!(self, Self::SessionNotFound | Self::ViewOnlySession)
    }
}

/// Handle to the file a failed save originally targeted.
#[derive(Debug, Clone)]
pub struct OriginalFile {
    pub file_id: String,
    pub name: String,
    pub parent_id: String,
    pub storage_kind: StorageKind,
}

/// Opaque reference to replacement content already staged by the caller.
/// Resolved by the vendor backend; the kernel never reads it.
#[derive(Debug, Clone)]
pub struct ContentRef(pub String);

/// Result of persisting a conflict copy beside its original.
#[derive(Debug, Clone)]
pub struct PersistedCopy {
    pub new_file_id: String,
    /// False when the vendor had to place the copy elsewhere (e.g. the
    /// original's folder was deleted out from under us).
    pub same_folder: bool,
}

/// Vendor-delegated write of a conflict copy. The kernel computes the name
/// and orchestrates sessions and notifications; the actual write belongs to
/// the backend.
#[async_trait]
pub trait CopyWriter: Send + Sync {
    async fn persist_copy(
        &self,
        original: &OriginalFile,
        new_name: &str,
        content: &ContentRef,
    ) -> Result<PersistedCopy, StoreError>;
}

/// Immutable record of one resolved conflict. Consumed by notification and
/// audit sinks; never persisted by the kernel itself.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictOutcome {
    pub original_file_id: String,
    pub new_file_id: String,
    pub old_name: String,
    pub new_name: String,
    pub reason: ConflictReason,
    /// Identity of the other editor whose write caused the divergence.
    pub modifier_name: Option<String>,
    pub session_expired: bool,
    pub same_folder: bool,
}
