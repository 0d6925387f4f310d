//! Write-ahead log core.
//!
//! The `Wal` owns the active segment and its buffered writer, assigns
//! log sequence numbers, rotates segments when they reach the size cap,
//! and retires displaced segments to the archival directory. A paired
//! housekeeper thread periodically flushes, fsyncs, and checkpoints.
//!
//! # Thread Safety
//!
//! All mutable log state sits behind a single exclusive lock, so the
//! public API is safe to share across threads. A successful `append`
//! means the record is staged in the write buffer; durability comes from
//! `sync` with fsync enabled, or from the next housekeeper tick.

mod housekeeper;
mod recovery;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::warn;

use crate::options::Options;
use crate::record::{self, LogRecord};
use crate::segment::{
    archive_segment, create_dir_if_missing, create_segment_file, list_segment_files,
    max_segment_index, oldest_segment_file, open_segment_for_append, segment_file_path,
};
use crate::{Error, Result};

use housekeeper::Housekeeper;

/// Buffer capacity for the active segment writer (64KB).
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// A segmented write-ahead log.
///
/// Opaque byte payloads are appended in LSN order, persisted across
/// bounded-size segment files, and replayed from the most recent
/// checkpoint after a restart.
pub struct Wal {
    shared: Arc<WalShared>,
    housekeeper: Housekeeper,
}

/// State shared between the public handle and the housekeeper thread.
pub(crate) struct WalShared {
    log_dir: PathBuf,
    archive_dir: PathBuf,
    options: Options,
    inner: Mutex<WalInner>,
}

/// Mutable log state, guarded by the log lock.
struct WalInner {
    /// Buffered writer over the active segment; `None` once closed.
    writer: Option<BufWriter<File>>,
    /// Index of the active segment.
    active_index: u32,
    /// Last assigned log sequence number.
    last_lsn: u64,
    /// LSN of the most recent checkpoint record.
    last_checkpoint_lsn: u64,
}

impl Wal {
    /// Open a log in the given directory with default options.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(dir, Options::default())
    }

    /// Open a log with custom options.
    ///
    /// Creates the directory if absent and a first segment if the
    /// directory holds none, then opens the highest-indexed segment for
    /// append and recovers the LSN counters from it. A corrupt record in
    /// the active segment aborts the open.
    pub fn open_with_options(dir: impl AsRef<Path>, options: Options) -> Result<Self> {
        options.validate()?;

        let log_dir = dir.as_ref().to_path_buf();
        create_dir_if_missing(&log_dir)?;
        let archive_dir = options.archive_path(&log_dir);

        let files = list_segment_files(&log_dir)?;
        if files.is_empty() {
            drop(create_segment_file(&log_dir, 0)?);
        }
        let active_index = max_segment_index(&files)?;

        let records = recovery::read_segment(&segment_file_path(&log_dir, active_index))?;
        let last_lsn = records.last().map(|r| r.lsn).unwrap_or(0);
        let last_checkpoint_lsn = records
            .iter()
            .rev()
            .find(|r| r.is_checkpoint())
            .map(|r| r.lsn)
            .unwrap_or(0);

        let file = open_segment_for_append(&log_dir, active_index)?;
        let writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let shared = Arc::new(WalShared {
            log_dir,
            archive_dir,
            options,
            inner: Mutex::new(WalInner {
                writer: Some(writer),
                active_index,
                last_lsn,
                last_checkpoint_lsn,
            }),
        });

        let housekeeper = Housekeeper::start(Arc::clone(&shared));

        Ok(Self {
            shared,
            housekeeper,
        })
    }

    /// Append a payload to the log.
    ///
    /// Returns the assigned LSN. On success the record is staged in the
    /// write buffer; it becomes durable on the next sync with fsync
    /// enabled. On error the LSN counter is not rolled back, so the
    /// record may or may not have been persisted.
    pub fn append(&self, data: &[u8]) -> Result<u64> {
        let mut inner = self.shared.inner.lock();
        if inner.writer.is_none() {
            return Err(Error::WalClosed);
        }

        let lsn = inner.last_lsn + 1;
        inner.last_lsn = lsn;

        let record = LogRecord::data(lsn, Bytes::copy_from_slice(data));
        self.shared.write_record(&mut inner, &record)?;

        Ok(lsn)
    }

    /// Flush the write buffer, fsync when configured, and optionally
    /// emit a checkpoint record.
    ///
    /// Checkpoints are only emitted when fsync is enabled and records
    /// have been appended since the previous checkpoint.
    pub fn sync(&self, checkpoint: bool) -> Result<()> {
        self.shared.sync(checkpoint)
    }

    /// Close the log: stop the housekeeper, perform a final checkpointed
    /// sync, and close the active segment.
    ///
    /// Subsequent operations fail with [`Error::WalClosed`]. Closing an
    /// already-closed log is a no-op.
    pub fn close(&self) -> Result<()> {
        self.housekeeper.stop();

        let mut inner = self.shared.inner.lock();
        if inner.writer.is_none() {
            return Ok(());
        }

        self.shared.sync_inner(&mut inner, true)?;

        // Push the close-time checkpoint through to the OS before the
        // segment handle is dropped.
        if let Some(mut writer) = inner.writer.take() {
            use std::io::Write;
            writer.flush()?;
            if self.shared.options.trigger_fsync {
                writer.get_ref().sync_data()?;
            }
        }

        Ok(())
    }

    /// Read every record in the active segment (diagnostic).
    pub fn read_current_segment(&self) -> Result<Vec<LogRecord>> {
        let mut inner = self.shared.inner.lock();
        self.shared.sync_inner(&mut inner, false)?;
        recovery::read_segment(&self.shared.active_path(&inner))
    }

    /// Last assigned log sequence number.
    pub fn last_lsn(&self) -> u64 {
        self.shared.inner.lock().last_lsn
    }

    /// LSN of the most recent checkpoint record.
    pub fn last_checkpoint_lsn(&self) -> u64 {
        self.shared.inner.lock().last_checkpoint_lsn
    }

    /// Path of the segment currently open for append.
    pub fn active_segment_path(&self) -> PathBuf {
        let inner = self.shared.inner.lock();
        self.shared.active_path(&inner)
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "error closing wal during drop");
        }
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Wal")
            .field("log_dir", &self.shared.log_dir)
            .field("active_index", &inner.active_index)
            .field("last_lsn", &inner.last_lsn)
            .field("last_checkpoint_lsn", &inner.last_checkpoint_lsn)
            .field("closed", &inner.writer.is_none())
            .finish()
    }
}

impl WalShared {
    fn sync(&self, checkpoint: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        self.sync_inner(&mut inner, checkpoint)
    }

    fn sync_inner(&self, inner: &mut WalInner, checkpoint: bool) -> Result<()> {
        use std::io::Write;

        let writer = inner.writer.as_mut().ok_or(Error::WalClosed)?;
        writer.flush()?;

        if self.options.trigger_fsync {
            writer.get_ref().sync_data()?;
        }

        // A checkpoint is redundant until something follows the last one.
        if checkpoint && self.options.trigger_fsync && inner.last_checkpoint_lsn < inner.last_lsn
        {
            self.write_checkpoint(inner)?;
        }

        Ok(())
    }

    /// Emit a checkpoint record; consumes an LSN like any other record.
    fn write_checkpoint(&self, inner: &mut WalInner) -> Result<()> {
        let lsn = inner.last_lsn + 1;
        inner.last_lsn = lsn;
        inner.last_checkpoint_lsn = lsn;

        self.write_record(inner, &LogRecord::checkpoint(lsn))
    }

    /// Stage a framed record into the write buffer, rotating first if it
    /// would push the active segment past the size cap.
    fn write_record(&self, inner: &mut WalInner, record: &LogRecord) -> Result<()> {
        self.rotate_if_needed(inner, record.framed_len() as u64)?;

        let writer = inner.writer.as_mut().ok_or(Error::WalClosed)?;
        record::write_framed(writer, record)?;

        Ok(())
    }

    fn rotate_if_needed(&self, inner: &mut WalInner, framed_len: u64) -> Result<()> {
        let writer = inner.writer.as_mut().ok_or(Error::WalClosed)?;
        let on_disk = writer.get_ref().metadata()?.len();
        let buffered = writer.buffer().len() as u64;

        if on_disk + buffered + framed_len >= self.options.max_file_size {
            self.rotate(inner)?;
        }

        Ok(())
    }

    /// Close the active segment and open a fresh one at the next index,
    /// retiring the oldest segments beyond the retention budget.
    fn rotate(&self, inner: &mut WalInner) -> Result<()> {
        self.sync_inner(inner, false)?;

        let next_index = inner.active_index + 1;
        self.enforce_retention()?;

        let file = create_segment_file(&self.log_dir, next_index)?;
        let writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        // The previous segment closes when its writer is replaced.
        inner.writer = Some(writer);
        inner.active_index = next_index;

        Ok(())
    }

    /// Archive oldest segments until the active directory has room for
    /// one more file within the retention budget.
    fn enforce_retention(&self) -> Result<()> {
        let mut files = list_segment_files(&self.log_dir)?;

        while files.len() >= self.options.max_segments {
            let oldest = match oldest_segment_file(&files)? {
                Some(path) => path,
                None => break,
            };
            archive_segment(&oldest, &self.archive_dir)?;
            files.retain(|p| p != &oldest);
        }

        Ok(())
    }

    fn active_path(&self, inner: &WalInner) -> PathBuf {
        segment_file_path(&self.log_dir, inner.active_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionsBuilder;
    use crate::record::RecordType;
    use crate::segment::HEADER_SIZE;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Options with a quiet housekeeper so tests stay deterministic.
    fn quiet_options() -> OptionsBuilder {
        OptionsBuilder::new().sync_interval(Duration::from_secs(3600))
    }

    #[test]
    fn test_fresh_open_creates_segment_zero() {
        let dir = tempdir().unwrap();
        let wal = Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();

        let path = dir.path().join("wal-segment-0.wal");
        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), HEADER_SIZE as u64);
        assert_eq!(wal.active_segment_path(), path);
        assert_eq!(wal.last_lsn(), 0);

        wal.close().unwrap();
    }

    #[test]
    fn test_append_assigns_monotonic_lsns() {
        let dir = tempdir().unwrap();
        let wal = Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();

        for i in 1..=10u64 {
            let lsn = wal.append(format!("payload {}", i).as_bytes()).unwrap();
            assert_eq!(lsn, i);
        }
        assert_eq!(wal.last_lsn(), 10);

        wal.close().unwrap();
    }

    #[test]
    fn test_append_after_close_fails() {
        let dir = tempdir().unwrap();
        let wal = Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();

        wal.close().unwrap();
        let err = wal.append(b"late").unwrap_err();
        assert!(matches!(err, Error::WalClosed));
    }

    #[test]
    fn test_read_current_segment_sees_staged_records() {
        let dir = tempdir().unwrap();
        let wal = Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();

        wal.append(b"alpha").unwrap();
        wal.append(b"beta").unwrap();

        let records = wal.read_current_segment().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0].data[..], b"alpha");
        assert_eq!(&records[1].data[..], b"beta");
        assert!(records.iter().all(|r| r.record_type() == RecordType::Data));

        wal.close().unwrap();
    }

    #[test]
    fn test_rotation_advances_segment_index() {
        let dir = tempdir().unwrap();
        let options = quiet_options()
            .max_file_size(128)
            .max_segments(100)
            .trigger_fsync(false)
            .build()
            .unwrap();
        let wal = Wal::open_with_options(dir.path(), options).unwrap();

        for _ in 0..10 {
            wal.append(&[b'x'; 40]).unwrap();
        }
        wal.close().unwrap();

        let files = list_segment_files(dir.path()).unwrap();
        assert!(files.len() > 1);

        // Each segment must stay under the cap.
        for file in &files {
            assert!(std::fs::metadata(file).unwrap().len() <= 128);
        }
    }

    #[test]
    fn test_retention_archives_oldest() {
        let dir = tempdir().unwrap();
        let options = quiet_options()
            .max_file_size(128)
            .max_segments(2)
            .trigger_fsync(false)
            .build()
            .unwrap();
        let wal = Wal::open_with_options(dir.path(), options).unwrap();

        for _ in 0..10 {
            wal.append(&[b'y'; 40]).unwrap();
        }
        wal.close().unwrap();

        let active = list_segment_files(dir.path()).unwrap();
        assert!(active.len() <= 2);

        let archived = list_segment_files(&dir.path().join("archival")).unwrap();
        assert!(!archived.is_empty());
    }

    #[test]
    fn test_sync_checkpoint_is_idempotent() {
        let dir = tempdir().unwrap();
        let wal = Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();

        wal.append(b"one").unwrap();
        wal.sync(true).unwrap();
        wal.sync(true).unwrap();
        wal.sync(true).unwrap();

        let checkpoints = wal
            .read_current_segment()
            .unwrap()
            .into_iter()
            .filter(|r| r.is_checkpoint())
            .count();
        assert_eq!(checkpoints, 1);

        wal.close().unwrap();
    }

    #[test]
    fn test_no_checkpoint_without_fsync() {
        let dir = tempdir().unwrap();
        let options = quiet_options().trigger_fsync(false).build().unwrap();
        let wal = Wal::open_with_options(dir.path(), options).unwrap();

        wal.append(b"one").unwrap();
        wal.sync(true).unwrap();
        wal.close().unwrap();

        let records = recovery::read_segment(&dir.path().join("wal-segment-0.wal")).unwrap();
        assert!(records.iter().all(|r| !r.is_checkpoint()));
    }

    #[test]
    fn test_reopen_recovers_lsn_counter() {
        let dir = tempdir().unwrap();

        {
            let wal =
                Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();
            for _ in 0..3 {
                wal.append(b"record").unwrap();
            }
            // Close emits a checkpoint, consuming lsn 4.
            wal.close().unwrap();
        }

        let wal = Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();
        assert_eq!(wal.last_lsn(), 4);
        assert_eq!(wal.last_checkpoint_lsn(), 4);

        let lsn = wal.append(b"after reopen").unwrap();
        assert_eq!(lsn, 5);

        wal.close().unwrap();
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let dir = tempdir().unwrap();
        let wal = Wal::open_with_options(dir.path(), quiet_options().build().unwrap()).unwrap();

        wal.append(b"").unwrap();
        let records = wal.read_current_segment().unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].data.is_empty());
        assert_eq!(records[0].record_type(), RecordType::Data);

        wal.close().unwrap();
    }
}
