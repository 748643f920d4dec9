use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::conflict::ConflictReason;
use crate::error::StoreError;
use crate::version::StorageKind;

/// One structured audit record, written for forensic reconstruction.
/// Absence or failure of an audit write must never affect control flow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Emitted by every branch of conflict detection.
    ConflictProbe {
        actor: String,
        file_id: String,
        storage_kind: StorageKind,
        conflicted: bool,
        at: DateTime<Utc>,
    },
    /// Emitted once per resolved conflict.
    ConflictResolved {
        actor: String,
        original_file_id: String,
        new_file_id: String,
        old_name: String,
        new_name: String,
        reason: ConflictReason,
        session_expired: bool,
        at: DateTime<Utc>,
    },
}

/// Save-failure notification delivered to the end user.
#[derive(Debug, Clone, Serialize)]
pub struct SaveFailedNotice {
    pub user_id: String,
    pub old_name: String,
    pub new_name: String,
    pub reason: ConflictReason,
    pub same_folder: bool,
    /// The other editor who caused the conflict, when known.
    pub other_editor: Option<String>,
}

/// Best-effort user notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn save_failed(&self, notice: SaveFailedNotice) -> Result<(), StoreError>;
}

/// Best-effort audit sink.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError>;
}

/// Per-user "recent files" bookkeeping.
#[async_trait]
pub trait RecentFiles: Send + Sync {
    /// Mark a recent-files entry as no longer reachable by its owner.
    async fn mark_inaccessible(&self, user_id: &str, file_id: &str) -> Result<(), StoreError>;
}
