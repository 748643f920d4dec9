use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use draftvault_archive::{ArchiveConfig, ArchivePipeline, SIZE_LIMIT_MESSAGE};
use draftvault_core::{ExcludeReason, JobStore, SourceRef, ZipJob, ZipJobKey, ZipJobStatus};
use draftvault_memory::{MemoryBlobStore, MemoryFetcher, MemoryJobStore};
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};

fn key() -> ZipJobKey {
    ZipJobKey {
        user_id: "alice".to_string(),
        parent_id: "root".to_string(),
        request_id: "req-1".to_string(),
    }
}

fn file_ref(id: &str, path: &str) -> SourceRef {
    SourceRef {
        id: id.to_string(),
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        folder: false,
    }
}

fn folder_ref(id: &str, path: &str) -> SourceRef {
    SourceRef {
        id: id.to_string(),
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        folder: true,
    }
}

/// Fast timings so tests exercise the flusher without waiting seconds.
fn test_config() -> ArchiveConfig {
    ArchiveConfig {
        flush_warmup: Duration::from_millis(5),
        flush_interval: Duration::from_millis(10),
        ..ArchiveConfig::default()
    }
}

struct Harness {
    pipeline: ArchivePipeline,
    fetcher: Arc<MemoryFetcher>,
    blob: Arc<MemoryBlobStore>,
    jobs: Arc<MemoryJobStore>,
}

fn harness(config: ArchiveConfig) -> Harness {
    let fetcher = Arc::new(MemoryFetcher::new());
    let blob = Arc::new(MemoryBlobStore::new());
    let jobs = Arc::new(MemoryJobStore::new());
    let pipeline = ArchivePipeline::new(fetcher.clone(), blob.clone(), jobs.clone(), config);
    Harness {
        pipeline,
        fetcher,
        blob,
        jobs,
    }
}

async fn await_terminal(jobs: &MemoryJobStore, key: &ZipJobKey) -> ZipJob {
    for _ in 0..500 {
        if let Some(job) = jobs.get(key).await.unwrap() {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached a terminal state");
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<String> = (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

/// `(crc32, compressed_size, uncompressed_size)` of the zip local file
/// header starting at `offset`.
fn local_header_fields(bytes: &[u8], offset: usize) -> (u32, u32, u32) {
    let field = |at: usize| u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap());
    assert_eq!(field(offset), 0x0403_4b50, "not a local file header");
    (field(offset + 14), field(offset + 18), field(offset + 22))
}

fn entry_bytes(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut out = Vec::new();
    entry.read_to_end(&mut out).unwrap();
    out
}

#[tokio::test]
async fn test_small_job_uploads_exactly_one_terminal_part() {
    let h = harness(test_config());
    h.fetcher.add_file("a", "plan.dwg", b"plan bytes".to_vec());
    h.fetcher.add_file("b", "site.dwg", b"site bytes".to_vec());

    let job_id = h
        .pipeline
        .start(
            key(),
            vec![file_ref("a", "plan.dwg"), file_ref("b", "site.dwg")],
            false,
            "",
        )
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);
    // The payload never crossed the chunk threshold: only the terminal
    // flush uploaded, as a single part.
    assert_eq!(job.uploaded_part_count, 1);

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(job.uploaded_byte_offset, object.len() as u64);
    assert_eq!(entry_names(&object), vec!["plan.dwg", "site.dwg"]);
    assert_eq!(entry_bytes(&object, "plan.dwg"), b"plan bytes");
}

#[tokio::test]
async fn test_oversized_object_is_excluded_not_fatal() {
    let h = harness(test_config());
    h.fetcher.add_file("a", "a.dwg", b"aaaa".to_vec());
    // Reported size over the 800 MiB ceiling; payload irrelevant.
    h.fetcher
        .add_file_with_size("big", "big.dwg", 900 * 1024 * 1024, Vec::new());
    h.fetcher.add_file("c", "c.dwg", b"cccc".to_vec());

    let job_id = h
        .pipeline
        .start(
            key(),
            vec![
                file_ref("a", "a.dwg"),
                file_ref("big", "big.dwg"),
                file_ref("c", "c.dwg"),
            ],
            false,
            "",
        )
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);
    assert_eq!(job.excluded[&ExcludeReason::TooLarge], vec!["big.dwg"]);
    assert!(!job.excluded.contains_key(&ExcludeReason::NotFound));

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(entry_names(&object), vec!["a.dwg", "c.dwg"]);
}

#[tokio::test]
async fn test_missing_object_is_excluded_not_fatal() {
    let h = harness(test_config());
    h.fetcher.add_file("a", "a.dwg", b"aaaa".to_vec());

    let job_id = h
        .pipeline
        .start(
            key(),
            vec![file_ref("a", "a.dwg"), file_ref("gone", "gone.dwg")],
            false,
            "",
        )
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);
    assert_eq!(job.excluded[&ExcludeReason::NotFound], vec!["gone.dwg"]);

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(entry_names(&object), vec!["a.dwg"]);
}

#[tokio::test]
async fn test_concurrent_producers_never_corrupt_entries() {
    // Randomized producer timing; every entry must come out whole no matter
    // how the scheduler interleaves the fetches.
    for seed in [7u64, 1984, 0xD2AF] {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let h = harness(test_config());

        let count = 8usize;
        let mut objects = Vec::new();
        for i in 0..count {
            let path = format!("part-{}.bin", i);
            let body = vec![i as u8; 4096 + i * 17];
            let delay = Duration::from_millis(rng.gen_range(0..50));
            h.fetcher
                .add_file_with_delay(&format!("id-{}", i), &path, body, delay);
            objects.push(file_ref(&format!("id-{}", i), &path));
        }

        let job_id = h.pipeline.start(key(), objects, false, "").await.unwrap();
        let job = await_terminal(&h.jobs, &key()).await;
        assert_eq!(job.status, ZipJobStatus::Success);

        let object = h.blob.completed_object(&job_id).unwrap();
        for i in 0..count {
            let body = entry_bytes(&object, &format!("part-{}.bin", i));
            assert_eq!(body, vec![i as u8; 4096 + i * 17], "seed {} entry {}", seed, i);
        }
    }
}

#[tokio::test]
async fn test_deadline_preserves_completed_entries() {
    let config = ArchiveConfig {
        deadline: Duration::from_millis(300),
        ..test_config()
    };
    let h = harness(config);
    h.fetcher.add_file("a", "a.dwg", b"fast one".to_vec());
    h.fetcher.add_file("b", "b.dwg", b"fast two".to_vec());
    h.fetcher
        .add_file_with_delay("slow", "slow.dwg", b"never lands".to_vec(), Duration::from_secs(10));

    let job_id = h
        .pipeline
        .start(
            key(),
            vec![
                file_ref("a", "a.dwg"),
                file_ref("b", "b.dwg"),
                file_ref("slow", "slow.dwg"),
            ],
            false,
            "",
        )
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    // Partial success: what finished before cancellation is kept.
    assert_eq!(job.status, ZipJobStatus::Success);

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(entry_names(&object), vec!["a.dwg", "b.dwg"]);
    assert_eq!(entry_bytes(&object, "a.dwg"), b"fast one");
    assert_eq!(entry_bytes(&object, "b.dwg"), b"fast two");
}

#[tokio::test]
async fn test_sibling_name_collisions_get_suffixes() {
    let h = harness(test_config());
    h.fetcher.add_file("x1", "docs/plan.dwg", b"first".to_vec());
    h.fetcher.add_file("x2", "docs/plan.dwg", b"second".to_vec());
    h.fetcher.add_folder(
        "docs",
        vec![
            SourceRef {
                id: "x1".to_string(),
                path: "docs/plan.dwg".to_string(),
                name: "plan.dwg".to_string(),
                folder: false,
            },
            SourceRef {
                id: "x2".to_string(),
                path: "docs/plan.dwg".to_string(),
                name: "plan.dwg".to_string(),
                folder: false,
            },
        ],
    );

    let job_id = h
        .pipeline
        .start(key(), vec![folder_ref("docs", "docs")], true, "")
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(
        entry_names(&object),
        vec!["docs/plan (1).dwg", "docs/plan.dwg"]
    );
}

#[tokio::test]
async fn test_walk_abandons_branches_past_depth_limit() {
    let config = ArchiveConfig {
        max_depth: 2,
        ..test_config()
    };
    let h = harness(config);
    h.fetcher.add_file("top", "root/top.dwg", b"top".to_vec());
    h.fetcher.add_file("deep", "root/l2/l3/deep.dwg", b"deep".to_vec());
    h.fetcher.add_folder(
        "root",
        vec![
            file_ref("top", "root/top.dwg"),
            folder_ref("l2", "root/l2"),
        ],
    );
    h.fetcher
        .add_folder("l2", vec![folder_ref("l3", "root/l2/l3")]);
    h.fetcher
        .add_folder("l3", vec![file_ref("deep", "root/l2/l3/deep.dwg")]);

    let job_id = h
        .pipeline
        .start(key(), vec![folder_ref("root", "root")], true, "")
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    // Abandoned branch is a diagnostic, not a failure or an exclusion.
    assert_eq!(job.status, ZipJobStatus::Success);

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(entry_names(&object), vec!["root/top.dwg"]);
}

#[tokio::test]
async fn test_filter_narrows_folder_walks() {
    let h = harness(test_config());
    h.fetcher.add_file("a", "docs/tower.dwg", b"dwg".to_vec());
    h.fetcher.add_file("b", "docs/notes.txt", b"txt".to_vec());
    h.fetcher.add_folder(
        "docs",
        vec![
            file_ref("a", "docs/tower.dwg"),
            file_ref("b", "docs/notes.txt"),
        ],
    );

    let job_id = h
        .pipeline
        .start(key(), vec![folder_ref("docs", "docs")], true, "DWG")
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(entry_names(&object), vec!["docs/tower.dwg"]);
}

#[tokio::test]
async fn test_non_recursive_folder_takes_direct_children_only() {
    let h = harness(test_config());
    h.fetcher.add_file("a", "docs/a.dwg", b"a".to_vec());
    h.fetcher.add_file("b", "docs/sub/b.dwg", b"b".to_vec());
    h.fetcher.add_folder(
        "docs",
        vec![
            file_ref("a", "docs/a.dwg"),
            folder_ref("sub", "docs/sub"),
        ],
    );
    h.fetcher
        .add_folder("sub", vec![file_ref("b", "docs/sub/b.dwg")]);

    let job_id = h
        .pipeline
        .start(key(), vec![folder_ref("docs", "docs")], false, "")
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);

    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(entry_names(&object), vec!["docs/a.dwg"]);
}

#[tokio::test]
async fn test_size_ceiling_fails_job_without_finalizing() {
    let config = ArchiveConfig {
        max_archive_bytes: 64,
        ..test_config()
    };
    let h = harness(config);
    h.fetcher.add_file("a", "a.dwg", vec![0u8; 4096]);

    let job_id = h
        .pipeline
        .start(key(), vec![file_ref("a", "a.dwg")], false, "")
        .await
        .unwrap();

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Error);
    assert_eq!(job.error_message.as_deref(), Some(SIZE_LIMIT_MESSAGE));
    // Upload was aborted, never finalized.
    assert!(h.blob.completed_object(&job_id).is_none());
}

/// Three staggered files: the first entry becomes flushable as soon as the
/// second entry starts, well before the third producer finishes, so the
/// ticking flusher uploads at least one part ahead of the terminal flush.
async fn staggered_job(h: &Harness) -> String {
    h.fetcher
        .add_file_with_delay("a", "a.bin", vec![1u8; 150 * 1024], Duration::from_millis(20));
    h.fetcher
        .add_file_with_delay("b", "b.bin", vec![2u8; 150 * 1024], Duration::from_millis(100));
    h.fetcher
        .add_file_with_delay("c", "c.bin", vec![3u8; 1024], Duration::from_millis(220));

    h.pipeline
        .start(
            key(),
            vec![
                file_ref("a", "a.bin"),
                file_ref("b", "b.bin"),
                file_ref("c", "c.bin"),
            ],
            false,
            "",
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_slow_producers_still_flush_incrementally() {
    let h = harness(test_config());
    let job_id = staggered_job(&h).await;

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);
    assert!(
        job.uploaded_part_count >= 2,
        "expected incremental parts, got {}",
        job.uploaded_part_count
    );

    // Reassembled parts still form a valid archive.
    let object = h.blob.completed_object(&job_id).unwrap();
    assert_eq!(entry_names(&object), vec!["a.bin", "b.bin", "c.bin"]);
    assert_eq!(entry_bytes(&object, "b.bin"), vec![2u8; 150 * 1024]);
}

#[tokio::test]
async fn test_flushed_parts_match_central_directory() {
    let h = harness(test_config());
    let job_id = staggered_job(&h).await;

    let job = await_terminal(&h.jobs, &key()).await;
    assert_eq!(job.status, ZipJobStatus::Success);
    assert!(
        job.uploaded_part_count >= 2,
        "expected an intermediate flush, got {} part(s)",
        job.uploaded_part_count
    );

    // The first entry's local header sits in the part uploaded before the
    // archive was finished; its crc32 and sizes must agree with the central
    // directory, not hold the zeroed placeholders the writer later patches.
    let object = h.blob.completed_object(&job_id).unwrap();
    let (crc, compressed, uncompressed) = local_header_fields(&object, 0);

    let mut archive = zip::ZipArchive::new(Cursor::new(object.clone())).unwrap();
    let first = archive.by_name("a.bin").unwrap();
    assert_eq!(crc, first.crc32());
    assert_eq!(u64::from(compressed), first.compressed_size());
    assert_eq!(u64::from(uncompressed), first.size());
}
