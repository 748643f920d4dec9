//! In-memory implementations of every draftvault collaborator trait.
//!
//! Backed by `DashMap`, suitable for integration tests and single-process
//! deployments where the platform's durable stores are not wired up.

mod blob;
mod copy;
mod fetch;
mod job;
mod session;
mod sideeffects;
mod version;

pub use blob::MemoryBlobStore;
pub use copy::MemoryCopyWriter;
pub use fetch::MemoryFetcher;
pub use job::MemoryJobStore;
pub use session::MemorySessionStore;
pub use sideeffects::{RecordingAudit, RecordingNotifier, RecordingRecents};
pub use version::MemoryVersionStore;
