use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use dashmap::DashMap;
use draftvault_core::{BlobStore, StoreError};
use tracing::{debug, instrument, warn};

/// Maximum retries for transient errors (429 / 5xx).
const MAX_RETRIES: u32 = 5;
/// Base delay for exponential backoff.
const BASE_DELAY_MS: u64 = 200;

/// Bucket and key layout for archive uploads.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    /// Prefix prepended to every object key; empty for bucket root.
    pub key_prefix: String,
}

impl S3Config {
    fn object_key(&self, job_id: &str) -> String {
        if self.key_prefix.is_empty() {
            format!("{}.zip", job_id)
        } else {
            format!("{}/{}.zip", self.key_prefix.trim_end_matches('/'), job_id)
        }
    }
}

/// Per-job multipart upload state. The flusher is the only writer for a
/// job, so parts for one upload never arrive concurrently.
struct UploadState {
    upload_id: String,
    parts: Vec<CompletedPart>,
}

/// S3 (or S3-compatible) multipart blob store.
///
/// The multipart upload is created lazily when the first part arrives, so
/// a job that fails before producing any bytes leaves nothing behind.
pub struct S3BlobStore {
    client: S3Client,
    config: S3Config,
    uploads: DashMap<String, UploadState>,
}

impl S3BlobStore {
    pub fn new(client: S3Client, config: S3Config) -> Self {
        Self {
            client,
            config,
            uploads: DashMap::new(),
        }
    }

    /// Build a store from the ambient AWS environment (credentials chain,
    /// region, endpoint overrides).
    pub async fn from_env(config: S3Config) -> Self {
        let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(S3Client::new(&shared), config)
    }

    /// Sleep with exponential backoff + jitter.
    async fn backoff_sleep(attempt: u32) {
        let base = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
        let jitter = Duration::from_millis(rand_jitter());
        tokio::time::sleep(base + jitter).await;
    }

    /// Check if an S3 error is retryable (429 or 5xx).
    fn is_retryable_s3_error(err: &aws_sdk_s3::error::SdkError<impl std::fmt::Debug>) -> bool {
        use aws_sdk_s3::error::SdkError;
        match err {
            SdkError::ServiceError(e) => {
                let status = e.raw().status().as_u16();
                status == 429 || (500..=504).contains(&status)
            }
            SdkError::ResponseError(e) => {
                let status = e.raw().status().as_u16();
                status == 429 || (500..=504).contains(&status)
            }
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
            _ => false,
        }
    }

    /// Create the multipart upload for a job if it does not exist yet and
    /// return its upload id.
    async fn ensure_upload(&self, job_id: &str, key: &str) -> Result<String, StoreError> {
        if let Some(state) = self.uploads.get(job_id) {
            return Ok(state.upload_id.clone());
        }

        for attempt in 0..=MAX_RETRIES {
            let result = self
                .client
                .create_multipart_upload()
                .bucket(&self.config.bucket)
                .key(key)
                .send()
                .await;

            match result {
                Ok(output) => {
                    let upload_id = output.upload_id().unwrap_or_default().to_string();
                    if upload_id.is_empty() {
                        return Err(StoreError::Backend(
                            "multipart upload created without an upload id".to_string(),
                        ));
                    }
                    debug!("Created multipart upload {} for job {}", upload_id, job_id);
                    self.uploads.insert(
                        job_id.to_string(),
                        UploadState {
                            upload_id: upload_id.clone(),
                            parts: Vec::new(),
                        },
                    );
                    return Ok(upload_id);
                }
                Err(e) => {
                    if Self::is_retryable_s3_error(&e) && attempt < MAX_RETRIES {
                        warn!(attempt, key, "create_multipart_upload retryable error, retrying");
                        Self::backoff_sleep(attempt).await;
                        continue;
                    }
                    return Err(StoreError::Backend(format!(
                        "create_multipart_upload error: {}",
                        e
                    )));
                }
            }
        }
        unreachable!()
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        bytes: &[u8],
    ) -> Result<String, StoreError> {
        for attempt in 0..=MAX_RETRIES {
            let result = self
                .client
                .upload_part()
                .bucket(&self.config.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number as i32)
                .body(ByteStream::from(bytes.to_vec()))
                .send()
                .await;

            match result {
                Ok(output) => {
                    return Ok(output.e_tag().unwrap_or("").to_string());
                }
                Err(e) => {
                    // Re-sending the same part number overwrites it, so
                    // transient failures are safe to retry.
                    if Self::is_retryable_s3_error(&e) && attempt < MAX_RETRIES {
                        warn!(attempt, key, part_number, "upload_part retryable error, retrying");
                        Self::backoff_sleep(attempt).await;
                        continue;
                    }
                    return Err(StoreError::Backend(format!(
                        "upload_part {} error: {}",
                        part_number, e
                    )));
                }
            }
        }
        unreachable!()
    }
}

/// Simple jitter: random-ish value 0..50ms using timestamp nanos.
fn rand_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 50)
        .unwrap_or(0)
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self, bytes), level = "debug", fields(bytes = bytes.len()))]
    async fn put_part(
        &self,
        job_id: &str,
        part_number: u32,
        bytes: Vec<u8>,
    ) -> Result<(), StoreError> {
        let key = self.config.object_key(job_id);
        let upload_id = self.ensure_upload(job_id, &key).await?;
        let etag = self
            .upload_part(&key, &upload_id, part_number, &bytes)
            .await?;

        if let Some(mut state) = self.uploads.get_mut(job_id) {
            state.parts.push(
                CompletedPart::builder()
                    .part_number(part_number as i32)
                    .e_tag(etag)
                    .build(),
            );
        }
        debug!(
            "Uploaded part {} of job {} ({} bytes)",
            part_number,
            job_id,
            bytes.len()
        );
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn complete(&self, job_id: &str) -> Result<(), StoreError> {
        let (_, state) = self
            .uploads
            .remove(job_id)
            .ok_or_else(|| StoreError::NotFound(format!("no upload for job {}", job_id)))?;
        let key = self.config.object_key(job_id);

        let mut parts = state.parts;
        parts.sort_by_key(|p| p.part_number());
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        for attempt in 0..=MAX_RETRIES {
            let result = self
                .client
                .complete_multipart_upload()
                .bucket(&self.config.bucket)
                .key(&key)
                .upload_id(&state.upload_id)
                .multipart_upload(completed.clone())
                .send()
                .await;

            match result {
                Ok(_) => {
                    debug!("Completed multipart upload for job {}", job_id);
                    return Ok(());
                }
                Err(e) => {
                    if Self::is_retryable_s3_error(&e) && attempt < MAX_RETRIES {
                        warn!(attempt, key, "complete_multipart_upload retryable error, retrying");
                        Self::backoff_sleep(attempt).await;
                        continue;
                    }
                    return Err(StoreError::Backend(format!(
                        "complete_multipart_upload error: {}",
                        e
                    )));
                }
            }
        }
        unreachable!()
    }

    #[instrument(skip(self), level = "debug")]
    async fn abort(&self, job_id: &str) -> Result<(), StoreError> {
        let Some((_, state)) = self.uploads.remove(job_id) else {
            // Nothing was ever uploaded; nothing to clean up.
            return Ok(());
        };
        let key = self.config.object_key(job_id);

        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.config.bucket)
            .key(&key)
            .upload_id(&state.upload_id)
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!("Aborted multipart upload for job {}", job_id);
                Ok(())
            }
            Err(e) => Err(StoreError::Backend(format!(
                "abort_multipart_upload error: {}",
                e
            ))),
        }
    }
}
