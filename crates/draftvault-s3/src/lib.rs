//! S3-compatible `BlobStore` backend.
//!
//! Archive jobs stream their zip bytes here as a multipart upload; the
//! upload is created lazily on the first part and finalized or aborted
//! when the job settles.

mod blob;

pub use blob::{S3BlobStore, S3Config};
