use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use draftvault_core::{
    BlobStore, ExcludeReason, JobStore, ObjectFetcher, SourceRef, StoreError, ZipJob, ZipJobKey,
    ZipJobStatus,
};
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::config::ArchiveConfig;
use crate::flush::Flusher;
use crate::writer::{run_writer, ArchiveEntry, SharedBuffer};

/// Entry channel depth; producers block here when the writer lags.
const ENTRY_CHANNEL_DEPTH: usize = 64;

/// Assembles a zip archive from many source objects and drains it to blob
/// storage as a multipart upload.
///
/// `start` admits the job and returns; producers, the writer task, and the
/// flusher then run detached. The job record is only ever driven by one
/// pipeline invocation, so all its updates are single-writer.
#[derive(Clone)]
pub struct ArchivePipeline {
    fetcher: Arc<dyn ObjectFetcher>,
    blob: Arc<dyn BlobStore>,
    jobs: Arc<dyn JobStore>,
    config: ArchiveConfig,
}

impl ArchivePipeline {
    pub fn new(
        fetcher: Arc<dyn ObjectFetcher>,
        blob: Arc<dyn BlobStore>,
        jobs: Arc<dyn JobStore>,
        config: ArchiveConfig,
    ) -> Self {
        Self {
            fetcher,
            blob,
            jobs,
            config,
        }
    }

    /// Admit a zip job and return its id immediately. `filter` narrows
    /// folder walks by case-insensitive substring on entry names; an empty
    /// filter admits everything. Explicitly selected files bypass it.
    #[instrument(skip(self, objects), level = "debug", fields(objects = objects.len()))]
    pub async fn start(
        &self,
        key: ZipJobKey,
        objects: Vec<SourceRef>,
        recursive: bool,
        filter: &str,
    ) -> Result<String, StoreError> {
        self.jobs.create(ZipJob::new(key.clone())).await?;
        let job_id = key.job_id();
        debug!("Admitted zip job {} with {} objects", job_id, objects.len());

        let pipeline = self.clone();
        let filter = filter.to_lowercase();
        tokio::spawn(async move {
            pipeline.run(key, objects, recursive, filter).await;
        });

        Ok(job_id)
    }

    /// Record one omitted path on a job. Exposed for producers and for
    /// callers that pre-filter objects before starting a job.
    pub async fn exclude_object(
        &self,
        key: &ZipJobKey,
        path: &str,
        reason: ExcludeReason,
    ) -> Result<(), StoreError> {
        self.jobs.append_excluded(key, reason, path).await
    }

    async fn run(self, key: ZipJobKey, objects: Vec<SourceRef>, recursive: bool, filter: String) {
        let job_id = key.job_id();
        let buffer = SharedBuffer::new();

        let (tx, rx) = mpsc::channel::<ArchiveEntry>(ENTRY_CHANNEL_DEPTH);
        let writer = tokio::spawn(run_writer(
            rx,
            buffer.clone(),
            self.config.max_archive_bytes,
        ));

        let (stop_flusher, stopped) = oneshot::channel();
        let flusher = Flusher::new(
            buffer.clone(),
            self.blob.clone(),
            self.jobs.clone(),
            key.clone(),
            self.config.clone(),
        );
        let flusher_handle = tokio::spawn(flusher.run(stopped));

        // One producer per top-level object; the pool admits at most
        // min(worker_cap, task count) at once, the rest queue on the
        // semaphore instead of being rejected.
        let permits = Arc::new(Semaphore::new(self.config.worker_count(objects.len())));
        let mut producers = JoinSet::new();
        for source in objects {
            let pipeline = self.clone();
            let key = key.clone();
            let tx = tx.clone();
            let permits = permits.clone();
            let filter = filter.clone();
            producers.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                pipeline.produce(&key, source, recursive, &filter, &tx).await;
            });
        }
        drop(tx);

        let mut fatal: Option<String> = None;

        // Hard wall-clock bound on producer work. Expiry cancels what is
        // still running; entries already handed to the writer survive whole.
        let all_done = tokio::time::timeout(self.config.deadline, async {
            while producers.join_next().await.is_some() {}
        })
        .await;
        if all_done.is_err() {
            warn!(
                "Zip job {} hit the {:?} deadline; cancelling remaining producers",
                job_id, self.config.deadline
            );
            producers.abort_all();
            while producers.join_next().await.is_some() {}
        }

        // All senders are gone: the writer drains the channel and writes the
        // central directory.
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(msg)) => fatal = Some(msg),
            Err(e) => fatal = Some(format!("archive writer task failed: {}", e)),
        }

        // Stop the flusher, then drain the residue as the terminal part(s).
        let _ = stop_flusher.send(());
        let flusher = match flusher_handle.await {
            Ok((flusher, flush_fatal)) => {
                if fatal.is_none() {
                    fatal = flush_fatal;
                }
                Some(flusher)
            }
            Err(e) => {
                fatal = Some(format!("flusher task failed: {}", e));
                None
            }
        };
        if fatal.is_none() {
            if let Some(mut flusher) = flusher {
                if let Err(msg) = flusher.final_flush().await {
                    fatal = Some(msg);
                }
            }
        }

        self.finish(&key, &job_id, fatal).await;
    }

    async fn finish(&self, key: &ZipJobKey, job_id: &str, fatal: Option<String>) {
        match fatal {
            None => {
                if let Err(e) = self.blob.complete(job_id).await {
                    warn!("Upload finalization failed for job {}: {}", job_id, e);
                    self.set_status(
                        key,
                        ZipJobStatus::Error,
                        Some(format!("upload finalization failed: {}", e)),
                    )
                    .await;
                } else {
                    debug!("Zip job {} succeeded", job_id);
                    self.set_status(key, ZipJobStatus::Success, None).await;
                }
            }
            Some(message) => {
                warn!("Zip job {} failed: {}", job_id, message);
                self.set_status(key, ZipJobStatus::Error, Some(message)).await;
                if let Err(e) = self.blob.abort(job_id).await {
                    warn!("Upload abort failed for job {}: {}", job_id, e);
                }
            }
        }
    }

    async fn set_status(&self, key: &ZipJobKey, status: ZipJobStatus, message: Option<String>) {
        if let Err(e) = self.jobs.set_status(key, status, message).await {
            warn!("Status update failed for job {}: {}", key.job_id(), e);
        }
    }

    async fn produce(
        &self,
        key: &ZipJobKey,
        source: SourceRef,
        recursive: bool,
        filter: &str,
        tx: &mpsc::Sender<ArchiveEntry>,
    ) {
        if source.folder {
            // A non-recursive selection still includes the folder's direct
            // file children, just no descent.
            let max_depth = if recursive { self.config.max_depth } else { 1 };
            self.walk_folder(key, &source, 1, max_depth, filter, tx).await;
        } else {
            self.produce_file(key, &source, tx).await;
        }
    }

    fn walk_folder<'a>(
        &'a self,
        key: &'a ZipJobKey,
        folder: &'a SourceRef,
        depth: u32,
        max_depth: u32,
        filter: &'a str,
        tx: &'a mpsc::Sender<ArchiveEntry>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if depth > max_depth {
                warn!(
                    "Folder {} is deeper than the {} level limit; branch abandoned",
                    folder.path, max_depth
                );
                return;
            }

            let children = match self.fetcher.list_children(folder).await {
                Ok(children) => children,
                Err(e) => {
                    warn!("Listing failed for folder {}: {}", folder.path, e);
                    self.exclude(key, &folder.path, ExcludeReason::NotFound).await;
                    return;
                }
            };

            for child in children {
                if child.folder {
                    self.walk_folder(key, &child, depth + 1, max_depth, filter, tx)
                        .await;
                } else if filter.is_empty() || child.name.to_lowercase().contains(filter) {
                    self.produce_file(key, &child, tx).await;
                }
            }
        })
    }

    async fn produce_file(
        &self,
        key: &ZipJobKey,
        source: &SourceRef,
        tx: &mpsc::Sender<ArchiveEntry>,
    ) {
        match self.fetcher.fetch(source).await {
            Ok(object) => {
                if object.size > self.config.max_object_bytes {
                    debug!(
                        "Object {} is {} bytes, over the {} ceiling; excluded",
                        source.path, object.size, self.config.max_object_bytes
                    );
                    self.exclude(key, &source.path, ExcludeReason::TooLarge).await;
                    return;
                }
                let entry = ArchiveEntry {
                    path: source.path.clone(),
                    bytes: object.bytes,
                };
                if tx.send(entry).await.is_err() {
                    // Writer already failed and hung up; the job outcome is
                    // decided elsewhere.
                    debug!("Writer closed; dropping entry {}", source.path);
                }
            }
            Err(StoreError::NotFound(_)) => {
                self.exclude(key, &source.path, ExcludeReason::NotFound).await;
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", source.path, e);
                self.exclude(key, &source.path, ExcludeReason::NotFound).await;
            }
        }
    }

    async fn exclude(&self, key: &ZipJobKey, path: &str, reason: ExcludeReason) {
        if let Err(e) = self.jobs.append_excluded(key, reason, path).await {
            warn!("Exclusion update failed for {}: {}", path, e);
        }
    }
}
