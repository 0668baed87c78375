use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, warn};

use crate::cell::CellVersion;
use crate::error::{poisoned, StoreError, StoreResult};

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

/// Flush strategy for segment appends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// `fsync` after every append.
    EveryWrite,
    /// Flush to the OS page cache only.
    #[default]
    OsDefault,
}

/// Append-only log of cell versions for one namespace.
///
/// On-disk format, repeated:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized CellVersion)]
/// ```
///
/// A failed append truncates the file back to where it started, so a
/// segment only ever contains whole frames plus, after a crash, at most one
/// torn frame at the tail. If that truncation itself fails the segment
/// refuses further appends until it is reopened.
pub(crate) struct SegmentLog {
    path: PathBuf,
    writer: Mutex<SegmentWriter>,
    sync_mode: SyncMode,
}

/// Destination of encoded frames. A plain `File` outside of tests.
trait FrameSink {
    fn write_frame(&mut self, frame: &[u8], sync_mode: SyncMode) -> io::Result<()>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl FrameSink for File {
    fn write_frame(&mut self, frame: &[u8], sync_mode: SyncMode) -> io::Result<()> {
        self.write_all(frame)?;
        self.flush()?;
        if sync_mode == SyncMode::EveryWrite {
            self.sync_data()?;
        }
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

struct SegmentWriter<S = File> {
    sink: S,
    /// Length of the valid prefix of the file.
    offset: u64,
    /// A partial frame could not be removed from the tail.
    failed: bool,
}

impl<S: FrameSink> SegmentWriter<S> {
    fn new(sink: S, offset: u64) -> Self {
        Self {
            sink,
            offset,
            failed: false,
        }
    }

    fn push(&mut self, frame: &[u8], sync_mode: SyncMode, path: &Path) -> StoreResult<u64> {
        if self.failed {
            return Err(StoreError::Unavailable(format!(
                "{}: segment holds a partial frame and must be reopened",
                path.display()
            )));
        }

        let entry_offset = self.offset;
        if let Err(e) = self.sink.write_frame(frame, sync_mode) {
            if let Err(rollback) = self.sink.truncate(entry_offset) {
                self.failed = true;
                error!(
                    path = %path.display(),
                    offset = entry_offset,
                    error = %rollback,
                    "failed to roll back partial append; segment closed for writes"
                );
            }
            return Err(e.into());
        }

        self.offset += frame.len() as u64;
        Ok(entry_offset)
    }
}

/// Exclusive append access to a segment.
///
/// Holding one serializes writers of the namespace without touching the
/// in-memory index, so readers keep going while a frame is written.
pub(crate) struct SegmentAppender<'a> {
    log: &'a SegmentLog,
    writer: MutexGuard<'a, SegmentWriter>,
}

impl SegmentAppender<'_> {
    /// Append one version. Returns the byte offset of its frame.
    pub(crate) fn append(&mut self, version: &CellVersion) -> StoreResult<u64> {
        let frame = encode_frame(version)?;
        let offset = self
            .writer
            .push(&frame, self.log.sync_mode, &self.log.path)?;
        debug!(offset, len = frame.len(), "segment append");
        Ok(offset)
    }
}

impl SegmentLog {
    /// Open (or create) a segment, replay it, and return the recovered
    /// versions in insertion order, each with the offset of its frame.
    ///
    /// A torn frame at the tail is cut off. A frame that is complete but
    /// fails its CRC or does not decode is reported as `CorruptSegment`:
    /// skipping it would punch a hole in a cell's version history.
    pub(crate) fn open(
        path: &Path,
        sync_mode: SyncMode,
    ) -> StoreResult<(Self, Vec<(u64, CellVersion)>)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (versions, valid_len) = Self::replay(path)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "discarding torn tail of segment"
            );
            file.set_len(valid_len)?;
        }

        debug!(path = %path.display(), recovered = versions.len(), "segment opened");
        Ok((
            Self {
                path: path.to_path_buf(),
                writer: Mutex::new(SegmentWriter::new(file, valid_len)),
                sync_mode,
            },
            versions,
        ))
    }

    /// Take the append lock.
    pub(crate) fn appender(&self) -> StoreResult<SegmentAppender<'_>> {
        Ok(SegmentAppender {
            log: self,
            writer: self.writer.lock().map_err(poisoned)?,
        })
    }

    fn replay(path: &Path) -> StoreResult<(Vec<(u64, CellVersion)>, u64)> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut versions = Vec::new();
        let mut offset: u64 = 0;

        let corrupt = |offset: u64, reason: String| StoreError::CorruptSegment {
            path: path.to_path_buf(),
            offset,
            reason,
        };

        while offset + HEADER_SIZE <= file_len {
            let mut header = [0u8; HEADER_SIZE as usize];
            reader.read_exact(&mut header)?;

            let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

            if length == 0 {
                return Err(corrupt(offset, "zero-length frame".into()));
            }
            if offset + HEADER_SIZE + length as u64 > file_len {
                // Torn write from a crash; the caller truncates it.
                break;
            }

            let mut payload = vec![0u8; length as usize];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let actual_crc = crc32fast::hash(&payload);
            if actual_crc != expected_crc {
                return Err(corrupt(
                    offset,
                    format!("CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"),
                ));
            }

            let version: CellVersion = bincode::deserialize(&payload)
                .map_err(|e| corrupt(offset, format!("undecodable record: {e}")))?;
            versions.push((offset, version));

            offset += HEADER_SIZE + length as u64;
        }

        Ok((versions, offset))
    }
}

fn encode_frame(version: &CellVersion) -> StoreResult<Vec<u8>> {
    let payload =
        bincode::serialize(version).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len()).map_err(|_| {
        StoreError::Serialization(format!("record of {} bytes is too large", payload.len()))
    })?;

    let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

impl std::fmt::Debug for SegmentLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentLog")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, SeekFrom};

    use chrono::Utc;

    use cellar_types::{AddedId, ColumnKey, RefKey, RowKey};

    use super::*;

    fn version(added_id: u64, ref_key: u64, body: &[u8]) -> CellVersion {
        CellVersion {
            added_id: AddedId::new(added_id),
            row_key: RowKey::new("R1").unwrap(),
            column_key: ColumnKey::new("BASIC_INFO").unwrap(),
            ref_key: RefKey::from_u64(ref_key).unwrap(),
            body: body.to_vec(),
            created_at: Utc::now(),
        }
    }

    fn append(log: &SegmentLog, v: &CellVersion) -> u64 {
        log.appender().unwrap().append(v).unwrap()
    }

    fn recover(path: &Path) -> Vec<CellVersion> {
        let (_, recovered) = SegmentLog::open(path, SyncMode::OsDefault).unwrap();
        recovered.into_iter().map(|(_, v)| v).collect()
    }

    #[test]
    fn append_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cells");

        let (log, recovered) = SegmentLog::open(&path, SyncMode::OsDefault).unwrap();
        assert!(recovered.is_empty());

        let v1 = version(1, 1, b"{\"a\":1}");
        let v2 = version(2, 2, b"{\"a\":2}");
        assert_eq!(append(&log, &v1), 0);
        let second = append(&log, &v2);
        assert!(second > 0);
        drop(log);

        let (_log, recovered) = SegmentLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(recovered, vec![(0, v1), (second, v2)]);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cells");

        let (log, _) = SegmentLog::open(&path, SyncMode::OsDefault).unwrap();
        let v1 = version(1, 1, b"one");
        let good_len = append(&log, &v1) + encode_frame(&v1).unwrap().len() as u64;
        append(&log, &version(2, 2, b"two"));
        drop(log);
        let total = fs::metadata(&path).unwrap().len();

        // Simulate a crash halfway through the second frame.
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(total - 3)
            .unwrap();

        let (log, recovered) = SegmentLog::open(&path, SyncMode::OsDefault).unwrap();
        assert_eq!(recovered, vec![(0, v1.clone())]);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

        // New appends land right after the last whole frame.
        let v2 = version(2, 2, b"again");
        assert_eq!(append(&log, &v2), good_len);
        drop(log);
        assert_eq!(recover(&path), vec![v1, v2]);
    }

    #[test]
    fn crc_mismatch_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cells");

        let (log, _) = SegmentLog::open(&path, SyncMode::OsDefault).unwrap();
        append(&log, &version(1, 1, b"one"));
        append(&log, &version(2, 2, b"two"));
        drop(log);

        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE)).unwrap();
            file.write_all(&buf).unwrap();
        }

        let err = SegmentLog::open(&path, SyncMode::OsDefault).unwrap_err();
        assert!(matches!(err, StoreError::CorruptSegment { offset: 0, .. }));
    }

    #[test]
    fn sync_every_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cells");
        let (log, _) = SegmentLog::open(&path, SyncMode::EveryWrite).unwrap();
        append(&log, &version(1, 1, b"durable"));
        drop(log);
        let (_, recovered) = SegmentLog::open(&path, SyncMode::EveryWrite).unwrap();
        assert_eq!(recovered.len(), 1);
    }

    /// Writes at most `write_limit` bytes of a frame, then fails.
    struct Faulty {
        file: File,
        write_limit: Option<usize>,
        truncate_fails: bool,
    }

    impl FrameSink for Faulty {
        fn write_frame(&mut self, frame: &[u8], _sync_mode: SyncMode) -> io::Result<()> {
            match self.write_limit {
                Some(limit) if frame.len() > limit => {
                    self.file.write_all(&frame[..limit])?;
                    Err(io::Error::other("disk full"))
                }
                _ => self.file.write_all(frame),
            }
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            if self.truncate_fails {
                Err(io::Error::other("read-only file system"))
            } else {
                self.file.set_len(len)
            }
        }
    }

    /// A segment holding one good frame, plus a faulty writer positioned
    /// after it.
    fn faulty_writer(path: &Path, truncate_fails: bool) -> (CellVersion, SegmentWriter<Faulty>) {
        let (log, _) = SegmentLog::open(path, SyncMode::OsDefault).unwrap();
        let v1 = version(1, 1, b"one");
        append(&log, &v1);
        drop(log);

        let file = OpenOptions::new().append(true).open(path).unwrap();
        let len = fs::metadata(path).unwrap().len();
        let sink = Faulty {
            file,
            write_limit: Some(5),
            truncate_fails,
        };
        (v1, SegmentWriter::new(sink, len))
    }

    #[test]
    fn partial_append_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cells");
        let (v1, mut writer) = faulty_writer(&path, false);
        let good_len = writer.offset;

        let v2 = version(2, 2, b"two");
        let frame = encode_frame(&v2).unwrap();
        let err = writer.push(&frame, SyncMode::OsDefault, &path).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
        assert_eq!(writer.offset, good_len);

        // The writer stays usable and the next frame lands where the
        // failed one started.
        writer.sink.write_limit = None;
        assert_eq!(writer.push(&frame, SyncMode::OsDefault, &path).unwrap(), good_len);
        drop(writer);
        assert_eq!(recover(&path), vec![v1, v2]);
    }

    #[test]
    fn failed_rollback_closes_segment_for_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.cells");
        let (v1, mut writer) = faulty_writer(&path, true);
        let good_len = writer.offset;

        let frame = encode_frame(&version(2, 2, b"two")).unwrap();
        assert!(writer.push(&frame, SyncMode::OsDefault, &path).is_err());
        assert!(writer.failed);

        // Even a healthy write is refused: it would land after the garbage.
        writer.sink.write_limit = None;
        let err = writer.push(&frame, SyncMode::OsDefault, &path).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len + 5);
        drop(writer);

        // Reopening cuts the partial frame off.
        assert_eq!(recover(&path), vec![v1]);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    }
}
