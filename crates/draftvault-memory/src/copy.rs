use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use draftvault_core::{ContentRef, CopyWriter, OriginalFile, PersistedCopy, StoreError};

/// Recorded conflict-copy write.
#[derive(Debug, Clone)]
pub struct CopyRecord {
    pub original_file_id: String,
    pub new_file_id: String,
    pub new_name: String,
}

/// In-memory `CopyWriter` that fabricates ids and records every write.
#[derive(Debug, Default)]
pub struct MemoryCopyWriter {
    counter: AtomicU64,
    fail: AtomicBool,
    records: Mutex<Vec<CopyRecord>>,
}

impl MemoryCopyWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `persist_copy` call fail, as a vendor outage would.
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<CopyRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl CopyWriter for MemoryCopyWriter {
    async fn persist_copy(
        &self,
        original: &OriginalFile,
        new_name: &str,
        _content: &ContentRef,
    ) -> Result<PersistedCopy, StoreError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("copy write rejected".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let new_file_id = format!("{}-copy-{}", original.file_id, n);
        self.records.lock().unwrap().push(CopyRecord {
            original_file_id: original.file_id.clone(),
            new_file_id: new_file_id.clone(),
            new_name: new_name.to_string(),
        });

        Ok(PersistedCopy {
            new_file_id,
            same_folder: true,
        })
    }
}
