use thiserror::Error;

/// Errors surfaced by collaborator stores and backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced object does not exist or is not readable by the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport or storage-level I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A write was attempted against a job already in a terminal state.
    #[error("job is already terminal: {0}")]
    TerminalJob(String),

    /// No edit session is registered under the given identity.
    #[error("no session registered: {0}")]
    SessionMissing(String),

    /// Vendor backend rejected the operation.
    #[error("backend error: {0}")]
    Backend(String),
}
