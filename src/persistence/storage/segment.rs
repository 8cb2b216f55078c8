use crate::persistence::storage::io::SegmentFileWriter;
use crate::persistence::storage::position::LogPosition;
use crate::util::config::WalConfig;
use crc32fast::Hasher;
use log::{debug, info, warn};
use parking_lot::{Mutex, MutexGuard};
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

const SEGMENT_PREFIX: &str = "txlog-";
const SEGMENT_SUFFIX: &str = ".log";
const SEGMENT_MAGIC: [u8; 4] = *b"GWAL";
const SEGMENT_FORMAT: u32 = 1;

/// Every segment starts with a fixed-width header; entries follow it.
pub const SEGMENT_HEADER_LEN: u64 = 32;

pub fn segment_file_name(version: u64) -> String {
    format!("{SEGMENT_PREFIX}{version:010}{SEGMENT_SUFFIX}")
}

/// Header written once when a segment is created.
///
/// Layout (little endian): magic `[4]`, format `u32`, log version `u64`,
/// last committed transaction id `u64`, crc32 `u32`, reserved `[4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub log_version: u64,
    pub last_committed_tx_id: u64,
}

impl SegmentHeader {
    pub fn new(log_version: u64, last_committed_tx_id: u64) -> Self {
        Self {
            log_version,
            last_committed_tx_id,
        }
    }

    pub fn encode(&self) -> [u8; SEGMENT_HEADER_LEN as usize] {
        let mut out = [0u8; SEGMENT_HEADER_LEN as usize];
        out[0..4].copy_from_slice(&SEGMENT_MAGIC);
        out[4..8].copy_from_slice(&SEGMENT_FORMAT.to_le_bytes());
        out[8..16].copy_from_slice(&self.log_version.to_le_bytes());
        out[16..24].copy_from_slice(&self.last_committed_tx_id.to_le_bytes());
        let crc = header_crc(&out[0..24]);
        out[24..28].copy_from_slice(&crc.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderDecodeError> {
        if bytes.len() < SEGMENT_HEADER_LEN as usize {
            return Err(HeaderDecodeError::TooShort);
        }
        if bytes[0..4] != SEGMENT_MAGIC {
            return Err(HeaderDecodeError::BadMagic);
        }
        let format = u32::from_le_bytes(array4(&bytes[4..8]));
        if format != SEGMENT_FORMAT {
            return Err(HeaderDecodeError::UnsupportedFormat(format));
        }
        let stored_crc = u32::from_le_bytes(array4(&bytes[24..28]));
        if stored_crc != header_crc(&bytes[0..24]) {
            return Err(HeaderDecodeError::CrcMismatch);
        }
        Ok(Self {
            log_version: u64::from_le_bytes(array8(&bytes[8..16])),
            last_committed_tx_id: u64::from_le_bytes(array8(&bytes[16..24])),
        })
    }

    pub fn read_from(path: &Path) -> Result<Self, SegmentError> {
        let mut file = File::open(path)?;
        let mut buf = [0u8; SEGMENT_HEADER_LEN as usize];
        file.read_exact(&mut buf)?;
        Self::decode(&buf).map_err(|reason| SegmentError::CorruptHeader {
            path: path.to_path_buf(),
            reason,
        })
    }
}

fn header_crc(bytes: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn array4(bytes: &[u8]) -> [u8; 4] {
    let mut array = [0u8; 4];
    array.copy_from_slice(&bytes[..4]);
    array
}

fn array8(bytes: &[u8]) -> [u8; 8] {
    let mut array = [0u8; 8];
    array.copy_from_slice(&bytes[..8]);
    array
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderDecodeError {
    #[error("header shorter than {} bytes", SEGMENT_HEADER_LEN)]
    TooShort,
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported header format {0}")]
    UnsupportedFormat(u32),
    #[error("header checksum mismatch")]
    CrcMismatch,
}

/// One segment file as observed in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub version: u64,
    pub path: PathBuf,
    pub len: u64,
}

/// Lists segment files in `dir`, ordered by version.
///
/// A missing directory is an empty log, not an error.
pub fn list_segments(dir: &Path) -> Result<Vec<SegmentDescriptor>, SegmentError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(SegmentError::Io(err)),
    };
    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if !is_segment_name(&name) {
            continue;
        }
        let version = parse_segment_version(&name)
            .ok_or_else(|| SegmentError::InvalidSegmentName { path: entry.path() })?;
        segments.push(SegmentDescriptor {
            version,
            path: entry.path(),
            len: entry.metadata()?.len(),
        });
    }
    segments.sort_by_key(|segment| segment.version);
    Ok(segments)
}

fn is_segment_name(name: &OsStr) -> bool {
    name.to_str()
        .map(|value| value.starts_with(SEGMENT_PREFIX) && value.ends_with(SEGMENT_SUFFIX))
        .unwrap_or(false)
}

fn parse_segment_version(name: &OsStr) -> Option<u64> {
    let name = name.to_str()?;
    let digits = name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Read side of the log used for monitoring and segment headers.
pub trait LogFileInformation: Send + Sync {
    /// Id of the transaction most recently handed to the log, durable or not.
    fn committing_entry_id(&self) -> u64;
    /// Id of the last transaction whose entry has been forced to disk.
    fn last_committed_tx_id(&self) -> u64;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentHandle {
    pub version: u64,
    pub path: PathBuf,
}

#[derive(Debug)]
struct ActiveSegment {
    version: u64,
    path: PathBuf,
    writer: SegmentFileWriter,
}

/// Ordered set of append-only segment files plus the active writer.
///
/// Appends, flushes and rotation all go through one exclusive section
/// ([`LogSegmentStore::lock`]). The active length and highest version are
/// mirrored into atomics so that [`LogSegmentStore::rotation_needed`] can be
/// checked without taking the lock.
#[derive(Debug)]
pub struct LogSegmentStore {
    dir: PathBuf,
    rotation_threshold: u64,
    buffer_capacity: usize,
    highest_version: AtomicU64,
    active_len: AtomicU64,
    committing_tx_id: AtomicU64,
    last_committed_tx_id: AtomicU64,
    active: Mutex<ActiveSegment>,
}

impl LogSegmentStore {
    /// Opens the log in `dir`, creating the directory and segment 0 when absent.
    ///
    /// A trailing segment shorter than its header is the remnant of a failed
    /// rotation and is deleted before the log is opened.
    pub fn open(
        dir: impl Into<PathBuf>,
        config: &WalConfig,
        last_committed_tx_id: u64,
    ) -> Result<Self, SegmentError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let mut segments = list_segments(&dir)?;
        if let Some(last) = segments.last() {
            if last.len < SEGMENT_HEADER_LEN {
                warn!(
                    "event=wal_segment_discarded path={} version={} len={}",
                    last.path.display(),
                    last.version,
                    last.len
                );
                fs::remove_file(&last.path)?;
                segments.pop();
            }
        }
        verify_sequence(&segments)?;

        let active = match segments.last() {
            Some(last) => {
                let file = OpenOptions::new().append(true).open(&last.path)?;
                let writer = SegmentFileWriter::at_end(file, config.writer_buffer_bytes)?;
                debug!(
                    "event=wal_segment_opened path={} version={} len={}",
                    last.path.display(),
                    last.version,
                    writer.len()
                );
                ActiveSegment {
                    version: last.version,
                    path: last.path.clone(),
                    writer,
                }
            }
            None => create_segment(&dir, 0, last_committed_tx_id, config.writer_buffer_bytes)?,
        };

        Ok(Self {
            dir,
            rotation_threshold: config.rotation_threshold_bytes,
            buffer_capacity: config.writer_buffer_bytes,
            highest_version: AtomicU64::new(active.version),
            active_len: AtomicU64::new(active.writer.len()),
            committing_tx_id: AtomicU64::new(last_committed_tx_id),
            last_committed_tx_id: AtomicU64::new(last_committed_tx_id),
            active: Mutex::new(active),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn highest_version(&self) -> u64 {
        self.highest_version.load(Ordering::Acquire)
    }

    pub fn rotation_threshold(&self) -> u64 {
        self.rotation_threshold
    }

    /// Lock-free check; callers must re-check under [`LogSegmentStore::lock`].
    pub fn rotation_needed(&self) -> bool {
        self.rotation_threshold != 0
            && self.active_len.load(Ordering::Acquire) >= self.rotation_threshold
    }

    pub fn active_segment(&self) -> SegmentHandle {
        self.lock().active_segment()
    }

    /// Position just past the last appended byte, read under the section
    /// lock so the version and offset belong to the same segment.
    pub fn current_position(&self) -> LogPosition {
        let section = self.lock();
        LogPosition::new(section.active.version, section.active.writer.len())
    }

    pub fn list_segments(&self) -> Result<Vec<SegmentDescriptor>, SegmentError> {
        list_segments(&self.dir)
    }

    /// Enters the exclusive section shared by append, flush and rotation.
    pub fn lock(&self) -> SegmentSection<'_> {
        SegmentSection {
            store: self,
            active: self.active.lock(),
        }
    }

    /// Appends one encoded transaction entry and returns the position just past it.
    pub fn append(&self, tx_id: u64, entry: &[u8]) -> Result<LogPosition, SegmentError> {
        self.lock().append(tx_id, entry)
    }

    /// Forces everything appended so far to stable storage.
    pub fn flush(&self) -> Result<LogPosition, SegmentError> {
        self.lock().force()
    }

    /// Closes the active segment and opens the next version.
    pub fn rotate(&self) -> Result<SegmentHandle, SegmentError> {
        self.lock().rotate()
    }
}

impl LogFileInformation for LogSegmentStore {
    fn committing_entry_id(&self) -> u64 {
        self.committing_tx_id.load(Ordering::Acquire)
    }

    fn last_committed_tx_id(&self) -> u64 {
        self.last_committed_tx_id.load(Ordering::Acquire)
    }
}

/// Holder of the segment store's exclusive section.
pub struct SegmentSection<'a> {
    store: &'a LogSegmentStore,
    active: MutexGuard<'a, ActiveSegment>,
}

impl SegmentSection<'_> {
    pub fn rotation_needed(&self) -> bool {
        self.store.rotation_needed()
    }

    pub fn active_segment(&self) -> SegmentHandle {
        SegmentHandle {
            version: self.active.version,
            path: self.active.path.clone(),
        }
    }

    pub fn append(&mut self, tx_id: u64, entry: &[u8]) -> Result<LogPosition, SegmentError> {
        self.active.writer.write_all(entry)?;
        let len = self.active.writer.len();
        self.store.active_len.store(len, Ordering::Release);
        self.store.committing_tx_id.store(tx_id, Ordering::Release);
        Ok(LogPosition::new(self.active.version, len))
    }

    pub fn force(&mut self) -> Result<LogPosition, SegmentError> {
        self.active.writer.force()?;
        let committing = self.store.committing_tx_id.load(Ordering::Acquire);
        self.store
            .last_committed_tx_id
            .store(committing, Ordering::Release);
        Ok(LogPosition::new(
            self.active.version,
            self.active.writer.len(),
        ))
    }

    /// Forces the active segment, creates `highest + 1` with its header and
    /// switches the active pointer.
    ///
    /// A creation failure leaves the previous segment active; the file that
    /// failed to initialise is discarded on the next open.
    pub fn rotate(&mut self) -> Result<SegmentHandle, SegmentError> {
        self.force()?;
        let next_version = self.active.version + 1;
        let last_committed = self.store.last_committed_tx_id.load(Ordering::Acquire);
        let next = create_segment(
            &self.store.dir,
            next_version,
            last_committed,
            self.store.buffer_capacity,
        )?;
        let previous = std::mem::replace(&mut *self.active, next);
        self.store
            .active_len
            .store(self.active.writer.len(), Ordering::Release);
        self.store
            .highest_version
            .store(next_version, Ordering::Release);
        previous.writer.close()?;
        Ok(self.active_segment())
    }
}

fn create_segment(
    dir: &Path,
    version: u64,
    last_committed_tx_id: u64,
    buffer_capacity: usize,
) -> Result<ActiveSegment, SegmentError> {
    let path = dir.join(segment_file_name(version));
    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .open(&path)?;
    let mut writer = SegmentFileWriter::at_end(file, buffer_capacity)?;
    writer.write_all(&SegmentHeader::new(version, last_committed_tx_id).encode())?;
    writer.force()?;
    info!(
        "event=wal_segment_created path={} version={} last_committed_tx_id={}",
        path.display(),
        version,
        last_committed_tx_id
    );
    Ok(ActiveSegment {
        version,
        path,
        writer,
    })
}

fn verify_sequence(segments: &[SegmentDescriptor]) -> Result<(), SegmentError> {
    let Some(first) = segments.first() else {
        return Ok(());
    };
    if first.version != 0 {
        debug!(
            "event=wal_segments_pruned lowest_version={}",
            first.version
        );
    }
    for (offset, segment) in segments.iter().enumerate() {
        let expected = first.version + offset as u64;
        if segment.version != expected {
            return Err(SegmentError::VersionGap {
                expected,
                found: segment.version,
            });
        }
        if segment.len < SEGMENT_HEADER_LEN {
            return Err(SegmentError::Truncated {
                version: segment.version,
                len: segment.len,
            });
        }
        let header = SegmentHeader::read_from(&segment.path)?;
        if header.log_version != segment.version {
            return Err(SegmentError::HeaderVersionMismatch {
                path: segment.path.clone(),
                expected: segment.version,
                found: header.log_version,
            });
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid log segment filename: {path:?}")]
    InvalidSegmentName { path: PathBuf },
    #[error("log segment versions not contiguous: expected {expected}, found {found}")]
    VersionGap { expected: u64, found: u64 },
    #[error("log segment {version} truncated to {len} bytes")]
    Truncated { version: u64, len: u64 },
    #[error("corrupt log segment header in {path:?}: {reason}")]
    CorruptHeader {
        path: PathBuf,
        reason: HeaderDecodeError,
    },
    #[error("log segment {path:?} declares version {found}, expected {expected}")]
    HeaderVersionMismatch {
        path: PathBuf,
        expected: u64,
        found: u64,
    },
}
