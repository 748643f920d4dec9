use std::sync::Arc;
use std::time::Instant;

use draftvault_core::{BlobStore, JobStore, ZipJobKey};
use tokio::sync::oneshot;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::ArchiveConfig;
use crate::writer::SharedBuffer;

/// Consecutive skipped ticks before the threshold shrinks.
const SKIPS_BEFORE_SHRINK: u32 = 5;
const SKIPS_BEFORE_STARVED: u32 = 10;

/// Uploads the archive buffer incrementally as multipart parts.
///
/// The adaptive threshold state (`threshold`, `skip_count`) is owned here and
/// mutated by nothing else; ticks observed while an upload is in flight are
/// skipped rather than queued, so flushes never overlap.
pub(crate) struct Flusher {
    buffer: SharedBuffer,
    blob: Arc<dyn BlobStore>,
    jobs: Arc<dyn JobStore>,
    key: ZipJobKey,
    job_id: String,
    config: ArchiveConfig,
    threshold: u64,
    skip_count: u32,
    part_count: u32,
    byte_offset: u64,
}

impl Flusher {
    pub fn new(
        buffer: SharedBuffer,
        blob: Arc<dyn BlobStore>,
        jobs: Arc<dyn JobStore>,
        key: ZipJobKey,
        config: ArchiveConfig,
    ) -> Self {
        let job_id = key.job_id();
        let threshold = config.chunk_threshold;
        Self {
            buffer,
            blob,
            jobs,
            key,
            job_id,
            config,
            threshold,
            skip_count: 0,
            part_count: 0,
            byte_offset: 0,
        }
    }

    pub fn part_count(&self) -> u32 {
        self.part_count
    }

    pub fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// Tick until `stop` fires. Returns the flusher (for the terminal flush)
    /// and the fatal upload error, if one occurred.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) -> (Self, Option<String>) {
        let start = Instant::now() + self.config.flush_warmup;
        let mut ticks = interval_at(start.into(), self.config.flush_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticks.tick() => {
                    if let Err(msg) = self.maybe_flush().await {
                        return (self, Some(msg));
                    }
                }
            }
        }
        (self, None)
    }

    /// One tick: upload if enough finalized bytes accumulated, otherwise
    /// count a skip and shrink the threshold so slow producers still make
    /// upload progress.
    ///
    /// Only bytes below the writer's watermark are eligible: anything past
    /// it may still be back-patched by the zip writer.
    async fn maybe_flush(&mut self) -> Result<(), String> {
        let len = self.buffer.watermark();
        let unflushed = len - self.byte_offset;

        if unflushed > self.threshold {
            self.flush_to(len).await?;
            self.skip_count = 0;
            self.threshold = self.config.chunk_threshold;
        } else {
            self.skip_count += 1;
            if self.skip_count >= SKIPS_BEFORE_STARVED {
                self.threshold = self.config.starved_threshold;
            } else if self.skip_count >= SKIPS_BEFORE_SHRINK {
                self.threshold = self.config.shrunk_threshold;
            }
        }
        Ok(())
    }

    /// Upload whatever finalized bytes remain past the flushed offset as the
    /// terminal part(s). Called once, after the writer finished and moved
    /// the watermark to the end of the archive.
    pub async fn final_flush(&mut self) -> Result<(), String> {
        let len = self.buffer.watermark();
        if len > self.byte_offset {
            self.flush_to(len).await?;
        }
        Ok(())
    }

    async fn flush_to(&mut self, len: u64) -> Result<(), String> {
        // Exactly the snapshot range; the writer may append concurrently.
        let bytes = self.buffer.slice(self.byte_offset, len);

        // Respect the provider's maximum part size.
        for chunk in bytes.chunks(self.config.max_part_bytes as usize) {
            let part_number = self.part_count + 1;
            self.blob
                .put_part(&self.job_id, part_number, chunk.to_vec())
                .await
                .map_err(|e| format!("part {} upload failed: {}", part_number, e))?;
            self.part_count = part_number;
        }
        debug!(
            "Flushed bytes {}..{} of job {} ({} parts so far)",
            self.byte_offset, len, self.job_id, self.part_count
        );
        self.byte_offset = len;

        if let Err(e) = self
            .jobs
            .record_progress(&self.key, self.part_count, self.byte_offset)
            .await
        {
            warn!("Progress update failed for job {}: {}", self.job_id, e);
        }
        Ok(())
    }
}
