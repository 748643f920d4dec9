use async_trait::async_trait;
use dashmap::DashMap;
use draftvault_core::{BlobStore, StoreError};
use tracing::debug;

/// In-memory multipart blob store.
///
/// Parts accumulate per job until `complete` concatenates them in part-number
/// order; `abort` discards them. Completed objects stay readable for
/// assertions.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    parts: DashMap<String, Vec<(u32, Vec<u8>)>>,
    completed: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finalized object bytes, if the job's upload was completed.
    pub fn completed_object(&self, job_id: &str) -> Option<Vec<u8>> {
        self.completed.get(job_id).map(|entry| entry.clone())
    }

    /// Number of parts uploaded so far (pending or completed).
    pub fn part_count(&self, job_id: &str) -> usize {
        self.parts.get(job_id).map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_part(
        &self,
        job_id: &str,
        part_number: u32,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        debug!(
            "Stored part {} for job {} ({} bytes)",
            part_number,
            job_id,
            bytes.len()
        );
        self.parts
            .entry(job_id.to_string())
            .or_default()
            .push((part_number, bytes));
        Ok(())
    }

    async fn complete(&self, job_id: &str) -> Result<(), StoreError> {
        let (_, mut parts) = self
            .parts
            .remove(job_id)
            .ok_or_else(|| StoreError::NotFound(format!("no parts for job {}", job_id)))?;
        parts.sort_by_key(|(number, _)| *number);

        let mut object = Vec::new();
        for (_, bytes) in parts {
            object.extend_from_slice(&bytes);
        }
        debug!("Completed upload for job {} ({} bytes)", job_id, object.len());
        self.completed.insert(job_id.to_string(), object);
        Ok(())
    }

    async fn abort(&self, job_id: &str) -> Result<(), StoreError> {
        self.parts.remove(job_id);
        debug!("Aborted upload for job {}", job_id);
        Ok(())
    }
}
