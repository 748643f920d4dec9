use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Mode of a collaborative edit session.
///
/// During conflict handling a session's mode only ever moves `Edit -> View`,
/// never the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Edit,
    View,
}

/// Kind of client driving a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Web,
    Desktop,
    Mobile,
    EmbeddedEditor,
    EmbeddedViewer,
}

impl ClientKind {
    /// The native embedded editor set manages its own sessions; conflict
    /// handling must not create or transfer sessions on its behalf.
    pub fn is_native_embedded(self) -> bool {
        matches!(self, Self::EmbeddedEditor | Self::EmbeddedViewer)
    }
}

/// A server-tracked lock representing a client actively editing a file.
///
/// One session exists per `(file_id, session_id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditSession {
    pub file_id: String,
    pub session_id: String,
    /// `None` when the session was created before mode tracking existed.
    pub mode: Option<SessionMode>,
    pub ttl_secs: u64,
}

/// Ownership of edit sessions. Conflict resolution only requests transitions;
/// it never mutates session records directly.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(
        &self,
        file_id: &str,
        session_id: &str,
    ) -> Result<Option<EditSession>, StoreError>;

    async fn create(&self, session: EditSession) -> Result<(), StoreError>;

    /// Move a session wholesale to a new file id. Identity and mode are
    /// preserved.
    async fn transfer(
        &self,
        file_id: &str,
        session_id: &str,
        new_file_id: &str,
    ) -> Result<(), StoreError>;

    /// Force the session's mode to `View` in place.
    async fn downgrade(&self, file_id: &str, session_id: &str) -> Result<(), StoreError>;

    async fn delete(&self, file_id: &str, session_id: &str) -> Result<(), StoreError>;
}
