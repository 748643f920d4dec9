use std::time::Duration;

/// User-facing message for the archive size ceiling (the only fatal
/// condition surfaced with localized wording).
pub const SIZE_LIMIT_MESSAGE: &str = "maximum size limit reached";

/// Pipeline tuning. Defaults match production; tests shrink the timings.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Source objects above this are excluded as `TooLarge`, not fetched
    /// into the archive.
    pub max_object_bytes: u64,
    /// Hard ceiling on the in-memory archive buffer; crossing it is the
    /// fatal "maximum size limit reached" condition.
    pub max_archive_bytes: u64,
    /// Unflushed bytes required before a tick uploads a part.
    pub chunk_threshold: u64,
    /// Threshold after 5 consecutive skipped ticks.
    pub shrunk_threshold: u64,
    /// Threshold after 10 consecutive skipped ticks.
    pub starved_threshold: u64,
    /// Provider's maximum part size; larger slices are split into
    /// sequential sub-parts.
    pub max_part_bytes: u64,
    /// Delay before the first flush tick.
    pub flush_warmup: Duration,
    /// Fixed period between flush ticks.
    pub flush_interval: Duration,
    /// Wall-clock bound on all producer work, measured from pipeline start.
    pub deadline: Duration,
    /// Folder recursion bound; deeper branches are abandoned.
    pub max_depth: u32,
    /// Upper bound on concurrently running producers.
    pub worker_cap: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            max_object_bytes: 800 * 1024 * 1024,
            max_archive_bytes: 2 * 1024 * 1024 * 1024,
            chunk_threshold: 100 * 1024,
            shrunk_threshold: 50 * 1024,
            starved_threshold: 20 * 1024,
            max_part_bytes: 50 * 1024 * 1024,
            flush_warmup: Duration::from_millis(200),
            flush_interval: Duration::from_millis(2_500),
            deadline: Duration::from_secs(600),
            max_depth: 20,
            worker_cap: 2 * cpus,
        }
    }
}

impl ArchiveConfig {
    /// Producer pool size for a job of `task_count` top-level objects.
    pub fn worker_count(&self, task_count: usize) -> usize {
        self.worker_cap.min(task_count).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_is_bounded_by_tasks() {
        let config = ArchiveConfig {
            worker_cap: 8,
            ..ArchiveConfig::default()
        };
        assert_eq!(config.worker_count(3), 3);
        assert_eq!(config.worker_count(100), 8);
        assert_eq!(config.worker_count(0), 1);
    }
}
