use std::sync::Mutex;

use async_trait::async_trait;
use draftvault_core::{AuditEvent, AuditSink, Notifier, RecentFiles, SaveFailedNotice, StoreError};

/// Notifier that captures notices for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<SaveFailedNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<SaveFailedNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn save_failed(&self, notice: SaveFailedNotice) -> Result<(), StoreError> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Audit sink that captures events for assertions.
#[derive(Debug, Default)]
pub struct RecordingAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, event: AuditEvent) -> Result<(), StoreError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Recent-files sink that captures invalidated entries.
#[derive(Debug, Default)]
pub struct RecordingRecents {
    inaccessible: Mutex<Vec<(String, String)>>,
}

impl RecordingRecents {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(user_id, file_id)` pairs marked inaccessible so far.
    pub fn inaccessible(&self) -> Vec<(String, String)> {
        self.inaccessible.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecentFiles for RecordingRecents {
    async fn mark_inaccessible(&self, user_id: &str, file_id: &str) -> Result<(), StoreError> {
        self.inaccessible
            .lock()
            .unwrap()
            .push((user_id.to_string(), file_id.to_string()));
        Ok(())
    }
}
