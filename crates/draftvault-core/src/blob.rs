use async_trait::async_trait;

use crate::error::StoreError;

/// Object storage with multipart/chunked upload.
///
/// Parts are numbered sequentially starting at 1 and uploaded in order by a
/// single flusher; implementations may assume no two parts of the same job
/// are uploaded concurrently.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload one chunk of the job's archive.
    async fn put_part(
        &self,
        job_id: &str,
        part_number: u32,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError>;

    /// Finalize the multipart upload, making the object visible.
    async fn complete(&self, job_id: &str) -> Result<(), StoreError>;

    /// Discard all uploaded parts without finalizing.
    async fn abort(&self, job_id: &str) -> Result<(), StoreError>;
}
