use async_trait::async_trait;
use dashmap::DashMap;
use draftvault_core::{ExcludeReason, JobStore, StoreError, ZipJob, ZipJobKey, ZipJobStatus};
use tracing::debug;

/// In-memory zip-job store enforcing the single terminal transition.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: DashMap<ZipJobKey, ZipJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: ZipJob) -> Result<(), StoreError> {
        debug!("Created zip job {}", job.key.job_id());
        self.jobs.insert(job.key.clone(), job);
        Ok(())
    }

    async fn get(&self, key: &ZipJobKey) -> Result<Option<ZipJob>, StoreError> {
        Ok(self.jobs.get(key).map(|entry| entry.clone()))
    }

    async fn set_status(
        &self,
        key: &ZipJobKey,
        status: ZipJobStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .jobs
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.job_id()))?;
        if entry.status.is_terminal() {
            return Err(StoreError::TerminalJob(key.job_id()));
        }
        entry.status = status;
        entry.error_message = error_message;
        debug!("Zip job {} -> {:?}", key.job_id(), status);
        Ok(())
    }

    async fn append_excluded(
        &self,
        key: &ZipJobKey,
        reason: ExcludeReason,
        path: &str,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .jobs
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.job_id()))?;
        entry
            .excluded
            .entry(reason)
            .or_default()
            .push(path.to_string());
        debug!("Zip job {} excluded {} ({:?})", key.job_id(), path, reason);
        Ok(())
    }

    async fn record_progress(
        &self,
        key: &ZipJobKey,
        part_count: u32,
        byte_offset: u64,
    ) -> Result<(), StoreError> {
        let mut entry = self
            .jobs
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.job_id()))?;
        entry.uploaded_part_count = part_count;
        entry.uploaded_byte_offset = byte_offset;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ZipJobKey {
        ZipJobKey {
            user_id: "u1".to_string(),
            parent_id: "root".to_string(),
            request_id: "r1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_terminal_transition_happens_once() {
        let store = MemoryJobStore::new();
        store.create(ZipJob::new(key())).await.unwrap();

        store
            .set_status(&key(), ZipJobStatus::Success, None)
            .await
            .unwrap();

        let again = store
            .set_status(&key(), ZipJobStatus::Error, Some("late".to_string()))
            .await;
        assert!(matches!(again, Err(StoreError::TerminalJob(_))));

        let job = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(job.status, ZipJobStatus::Success);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn test_exclusions_group_by_reason() {
        let store = MemoryJobStore::new();
        store.create(ZipJob::new(key())).await.unwrap();

        store
            .append_excluded(&key(), ExcludeReason::TooLarge, "huge.dwg")
            .await
            .unwrap();
        store
            .append_excluded(&key(), ExcludeReason::NotFound, "gone.dwg")
            .await
            .unwrap();

        let job = store.get(&key()).await.unwrap().unwrap();
        assert_eq!(job.excluded[&ExcludeReason::TooLarge], vec!["huge.dwg"]);
        assert_eq!(job.excluded[&ExcludeReason::NotFound], vec!["gone.dwg"]);
    }
}
