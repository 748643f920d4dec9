//! Core traits and types for draftvault storage backends.
//!
//! This crate defines the vendor-independent abstractions shared between the
//! conflict-resolution and archive-assembly kernels and the per-vendor
//! backend crates:
//! - `VersionStore`: per-file last-known version markers
//! - `SessionStore`: collaborative edit-lock sessions
//! - `BlobStore`: multipart/chunked upload to object storage
//! - `JobStore`: durable status records for archive jobs
//! - `ObjectFetcher`: per-object byte retrieval and folder listing
//! - `Notifier` / `AuditSink` / `RecentFiles`: best-effort side-effect sinks
//! - `CopyWriter`: vendor-delegated persistence of conflict copies

mod blob;
mod conflict;
mod error;
mod events;
mod fetch;
mod job;
mod session;
mod version;

pub use blob::BlobStore;
pub use conflict::{
    ConflictOutcome, ConflictReason, ContentRef, CopyWriter, OriginalFile, PersistedCopy,
};
pub use error::StoreError;
pub use events::{AuditEvent, AuditSink, Notifier, RecentFiles, SaveFailedNotice};
pub use fetch::{FetchedObject, ObjectFetcher, SourceRef};
pub use job::{ExcludeReason, JobStore, ZipJob, ZipJobKey, ZipJobStatus, DEFAULT_JOB_TTL_SECS};
pub use session::{ClientKind, EditSession, SessionMode, SessionStore};
pub use version::{StorageKind, VersionMarker, VersionStore};
