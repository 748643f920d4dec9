use std::collections::HashMap;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::SIZE_LIMIT_MESSAGE;

/// One complete archive entry, produced by a fetch task.
#[derive(Debug)]
pub(crate) struct ArchiveEntry {
    /// Path within the archive, `/`-separated.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Growable in-memory archive buffer, shared between the writer task (which
/// appends through a cursor) and the flusher (which reads finalized bytes).
///
/// The zip writer back-patches an entry's local header (crc32/sizes) when
/// the next entry starts or at finish, by seeking into already-written
/// bytes. `watermark` marks the offset below which no such patch can still
/// land; the flusher must never upload past it.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
    watermark: Arc<AtomicU64>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.lock().len() as u64
    }

    /// Offset below which bytes are final. Advanced only by the writer task.
    pub fn watermark(&self) -> u64 {
        self.watermark.load(Ordering::Acquire)
    }

    pub fn set_watermark(&self, offset: u64) {
        self.watermark.store(offset, Ordering::Release);
    }

    /// Copy of exactly `start..end` (clamped to the buffer length).
    pub fn slice(&self, start: u64, end: u64) -> Vec<u8> {
        let buf = self.lock();
        let end = (end as usize).min(buf.len());
        buf.get(start as usize..end).unwrap_or(&[]).to_vec()
    }

    // A panic mid-write leaves the Vec itself intact, so a poisoned lock is
    // recoverable rather than a reason to report an empty buffer.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `Write + Seek` view over a `SharedBuffer`, owned exclusively by the
/// writer task. The zip writer seeks backwards to patch entry headers, so
/// the cursor tracks its own position independent of the buffer length.
pub(crate) struct BufferCursor {
    buf: SharedBuffer,
    pos: u64,
}

impl BufferCursor {
    pub fn new(buf: SharedBuffer) -> Self {
        Self { buf, pos: 0 }
    }
}

impl Write for BufferCursor {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut guard = self.buf.lock();
        let pos = self.pos as usize;
        if pos > guard.len() {
            guard.resize(pos, 0);
        }
        let overlap = (guard.len() - pos).min(data.len());
        guard[pos..pos + overlap].copy_from_slice(&data[..overlap]);
        guard.extend_from_slice(&data[overlap..]);
        self.pos += data.len() as u64;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for BufferCursor {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        let len = self.buf.len() as i64;
        let target = match from {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => len + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(io::Error::other("seek before start of archive buffer"));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Resolve sibling name collisions with a numeric suffix before the
/// extension, counted per directory level and never across levels.
pub(crate) fn unique_entry_path(
    levels: &mut HashMap<String, HashMap<String, u32>>,
    path: &str,
) -> String {
    let (dir, name) = match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    };

    let seen = levels.entry(dir.to_string()).or_default();
    let count = seen.entry(name.to_string()).or_insert(0);
    *count += 1;
    if *count == 1 {
        return path.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let fresh = format!("{} ({}){}", stem, *count - 1, ext);
    if dir.is_empty() {
        fresh
    } else {
        format!("{}/{}", dir, fresh)
    }
}

/// Single owner of the zip writer: receives complete entries and serializes
/// begin-entry/payload/close-entry as one unit, so concurrent producers can
/// never interleave partial entries.
///
/// Returns the localized fatal message if the archive could not be written;
/// on success the finished archive (central directory included) is in the
/// buffer.
pub(crate) async fn run_writer(
    mut rx: mpsc::Receiver<ArchiveEntry>,
    buffer: SharedBuffer,
    max_archive_bytes: u64,
) -> Result<(), String> {
    let mut zip = ZipWriter::new(BufferCursor::new(buffer.clone()));
    let mut levels: HashMap<String, HashMap<String, u32>> = HashMap::new();
    let mut fatal: Option<String> = None;
    let mut entries = 0u64;

    while let Some(entry) = rx.recv().await {
        if fatal.is_some() {
            // Already failed; drain so producers are not blocked on send.
            continue;
        }

        let header_start = buffer.len();
        let path = unique_entry_path(&mut levels, &entry.path);
        if let Err(msg) = write_entry(&mut zip, &path, &entry.bytes) {
            warn!("Archive entry {} failed: {}", path, msg);
            fatal = Some(msg);
            continue;
        }
        // Starting this entry back-patched the previous entry's local
        // header; everything before this entry's header is now immutable.
        buffer.set_watermark(header_start);
        entries += 1;

        if buffer.len() > max_archive_bytes {
            warn!(
                "Archive buffer exceeded {} bytes after {} entries",
                max_archive_bytes, entries
            );
            fatal = Some(SIZE_LIMIT_MESSAGE.to_string());
        }
    }

    if let Some(msg) = fatal {
        return Err(msg);
    }

    zip.finish()
        .map_err(|e| format!("archive finalization failed: {}", e))?;
    buffer.set_watermark(buffer.len());
    debug!("Archive finished with {} entries", entries);
    Ok(())
}

fn write_entry(
    zip: &mut ZipWriter<BufferCursor>,
    path: &str,
    bytes: &[u8],
) -> Result<(), String> {
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file(path, options)
        .map_err(|e| format!("archive write failed: {}", e))?;
    zip.write_all(bytes)
        .map_err(|e| format!("archive write failed: {}", e))?;
    Ok(())
}
