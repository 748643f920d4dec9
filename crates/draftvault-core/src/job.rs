use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Default time-to-live for a zip job record (~1 day).
pub const DEFAULT_JOB_TTL_SECS: u64 = 86_400;

/// Lifecycle of an archive job. `Pending` transitions to a terminal state
/// exactly once; stores reject any write after that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZipJobStatus {
    Pending,
    Success,
    Error,
}

impl ZipJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// Why a source object was omitted from an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcludeReason {
    TooLarge,
    NotFound,
}

/// Identity of a zip job: one job per user, parent folder, and request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZipJobKey {
    pub user_id: String,
    pub parent_id: String,
    pub request_id: String,
}

impl ZipJobKey {
    /// Flat id used to key blob-store uploads.
    pub fn job_id(&self) -> String {
        format!("{}/{}/{}", self.user_id, self.parent_id, self.request_id)
    }
}

/// Durable status record for one archive job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZipJob {
    pub key: ZipJobKey,
    pub status: ZipJobStatus,
    pub uploaded_part_count: u32,
    pub uploaded_byte_offset: u64,
    /// Paths omitted from the archive, grouped by reason.
    #[serde(default)]
    pub excluded: HashMap<ExcludeReason, Vec<String>>,
    /// Localized message set when the job ends in `Error`.
    pub error_message: Option<String>,
    pub ttl_secs: u64,
    pub created_at: DateTime<Utc>,
}

impl ZipJob {
    pub fn new(key: ZipJobKey) -> Self {
        Self {
            key,
            status: ZipJobStatus::Pending,
            uploaded_part_count: 0,
            uploaded_byte_offset: 0,
            excluded: HashMap::new(),
            error_message: None,
            ttl_secs: DEFAULT_JOB_TTL_SECS,
            created_at: Utc::now(),
        }
    }
}

/// Durable store for zip job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: ZipJob) -> Result<(), StoreError>;

    async fn get(&self, key: &ZipJobKey) -> Result<Option<ZipJob>, StoreError>;

    /// Move the job to a new status. Returns `StoreError::TerminalJob` if the
    /// job is already `Success` or `Error`.
    async fn set_status(
        &self,
        key: &ZipJobKey,
        status: ZipJobStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError>;

    /// Record one omitted path under the given reason.
    async fn append_excluded(
        &self,
        key: &ZipJobKey,
        reason: ExcludeReason,
        path: &str,
    ) -> Result<(), StoreError>;

    /// Mirror upload progress for pollers.
    async fn record_progress(
        &self,
        key: &ZipJobKey,
        part_count: u32,
        byte_offset: u64,
    ) -> Result<(), StoreError>;
}
