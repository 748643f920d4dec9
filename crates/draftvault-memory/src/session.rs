use async_trait::async_trait;
use dashmap::DashMap;
use draftvault_core::{EditSession, SessionMode, SessionStore, StoreError};
use tracing::debug;

/// In-memory edit-session store: (file_id, session_id) -> EditSession.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: DashMap<(String, String), EditSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(file_id: &str, session_id: &str) -> (String, String) {
        (file_id.to_string(), session_id.to_string())
    }

    /// Number of sessions currently held (test helper).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(
        &self,
        file_id: &str,
        session_id: &str,
    ) -> Result<Option<EditSession>, StoreError> {
        Ok(self
            .sessions
            .get(&Self::key(file_id, session_id))
            .map(|entry| entry.clone()))
    }

    async fn create(&self, session: EditSession) -> Result<(), StoreError> {
        let key = Self::key(&session.file_id, &session.session_id);
        debug!(
            "Created session {} on file {} (mode {:?})",
            session.session_id, session.file_id, session.mode
        );
        self.sessions.insert(key, session);
        Ok(())
    }

    async fn transfer(
        &self,
        file_id: &str,
        session_id: &str,
        new_file_id: &str,
    ) -> Result<(), StoreError> {
        let (_, mut session) = self
            .sessions
            .remove(&Self::key(file_id, session_id))
            .ok_or_else(|| {
                StoreError::SessionMissing(format!("{}/{}", file_id, session_id))
            })?;
        session.file_id = new_file_id.to_string();
        debug!(
            "Transferred session {} from file {} to {}",
            session_id, file_id, new_file_id
        );
        self.sessions
            .insert(Self::key(new_file_id, session_id), session);
        Ok(())
    }

    async fn downgrade(&self, file_id: &str, session_id: &str) -> Result<(), StoreError> {
        let mut entry = self
            .sessions
            .get_mut(&Self::key(file_id, session_id))
            .ok_or_else(|| {
                StoreError::SessionMissing(format!("{}/{}", file_id, session_id))
            })?;
        entry.mode = Some(SessionMode::View);
        debug!("Downgraded session {} on file {} to view", session_id, file_id);
        Ok(())
    }

    async fn delete(&self, file_id: &str, session_id: &str) -> Result<(), StoreError> {
        if self.sessions.remove(&Self::key(file_id, session_id)).is_some() {
            debug!("Deleted session {} on file {}", session_id, file_id);
        }
        Ok(())
    }
}
