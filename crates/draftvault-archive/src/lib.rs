//! Streaming zip assembly drained to blob storage.
//!
//! A bulk-download request is admitted as a [`draftvault_core::ZipJob`] and
//! returns immediately; everything else runs detached from the request path:
//!
//! - producer tasks fetch source objects and send complete entries to the
//!   writer task (worker-pool bounded, deadline bounded),
//! - a single writer task owns the `zip::ZipWriter` and serializes entries
//!   into a shared in-memory buffer, so at most one entry is ever in flight,
//! - a single flusher uploads the buffer incrementally as multipart parts,
//!   shrinking its chunk threshold when producers are slow so the upload
//!   never stalls indefinitely.
//!
//! Per-object failures become exclusions on the job record; only archive
//! write failures and the size ceiling are fatal.

mod config;
mod flush;
mod pipeline;
mod writer;

pub use config::{ArchiveConfig, SIZE_LIMIT_MESSAGE};
pub use pipeline::ArchivePipeline;
