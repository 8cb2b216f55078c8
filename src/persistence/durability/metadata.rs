use crate::persistence::durability::health::{HealthError, HealthMonitor};
use crate::persistence::durability::slots::{FileRecordStore, MemoryRecordStore, RecordStore};
use crate::persistence::durability::transaction::TransactionId;
use crate::persistence::storage::position::LogPosition;
use log::debug;
use std::fmt;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Width of one persisted slot: in-use marker byte followed by a little-endian `u64`.
pub const SLOT_RECORD_LEN: usize = 9;

const IN_USE: u8 = 1;
const NOT_IN_USE: u8 = 0;

/// Persisted bit pattern of a slot that holds no value.
///
/// Absence lives in the marker byte, so every `u64` remains a valid value.
pub const FIELD_NOT_PRESENT: [u8; SLOT_RECORD_LEN] =
    [NOT_IN_USE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataSlot {
    LastTransactionId,
    LastTransactionChecksum,
    LastTransactionCommitTimestamp,
    LastClosedLogVersion,
    LastClosedLogByteOffset,
}

impl MetadataSlot {
    pub const ALL: [MetadataSlot; 5] = [
        MetadataSlot::LastTransactionId,
        MetadataSlot::LastTransactionChecksum,
        MetadataSlot::LastTransactionCommitTimestamp,
        MetadataSlot::LastClosedLogVersion,
        MetadataSlot::LastClosedLogByteOffset,
    ];

    fn index(self) -> u64 {
        match self {
            MetadataSlot::LastTransactionId => 0,
            MetadataSlot::LastTransactionChecksum => 1,
            MetadataSlot::LastTransactionCommitTimestamp => 2,
            MetadataSlot::LastClosedLogVersion => 3,
            MetadataSlot::LastClosedLogByteOffset => 4,
        }
    }

    pub fn offset(self) -> u64 {
        self.index() * SLOT_RECORD_LEN as u64
    }

    pub fn name(self) -> &'static str {
        match self {
            MetadataSlot::LastTransactionId => "last_transaction_id",
            MetadataSlot::LastTransactionChecksum => "last_transaction_checksum",
            MetadataSlot::LastTransactionCommitTimestamp => "last_transaction_commit_timestamp",
            MetadataSlot::LastClosedLogVersion => "last_closed_log_version",
            MetadataSlot::LastClosedLogByteOffset => "last_closed_log_byte_offset",
        }
    }
}

impl fmt::Display for MetadataSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn encode_slot(value: u64) -> [u8; SLOT_RECORD_LEN] {
    let mut record = [0u8; SLOT_RECORD_LEN];
    record[0] = IN_USE;
    record[1..].copy_from_slice(&value.to_le_bytes());
    record
}

/// Durable record of what was last committed and where the log was last closed.
///
/// Writes consult the shared [`HealthMonitor`] first and refuse to touch the
/// store once it is unhealthy.
#[derive(Debug)]
pub struct TransactionMetadataStore {
    records: Box<dyn RecordStore>,
    health: HealthMonitor,
}

impl TransactionMetadataStore {
    pub fn new(records: Box<dyn RecordStore>, health: HealthMonitor) -> Self {
        Self { records, health }
    }

    /// Opens (creating if needed) the metadata file at `path`.
    pub fn open(path: impl AsRef<Path>, health: HealthMonitor) -> Result<Self, MetadataError> {
        let records = FileRecordStore::open(path.as_ref())?;
        Ok(Self::new(Box::new(records), health))
    }

    /// Opens an existing metadata file without write access; a missing file
    /// is an error and every write fails with [`MetadataError::Io`].
    pub fn open_read_only(
        path: impl AsRef<Path>,
        health: HealthMonitor,
    ) -> Result<Self, MetadataError> {
        let records = FileRecordStore::open_read_only(path.as_ref())?;
        Ok(Self::new(Box::new(records), health))
    }

    pub fn in_memory(health: HealthMonitor) -> Self {
        Self::new(Box::new(MemoryRecordStore::new()), health)
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Returns the slot's value, or `None` for a slot never written or cleared.
    pub fn get(&self, slot: MetadataSlot) -> Result<Option<u64>, MetadataError> {
        let mut record = [0u8; SLOT_RECORD_LEN];
        let read = self.records.read_at(slot.offset(), &mut record)?;
        if read < SLOT_RECORD_LEN {
            return Ok(None);
        }
        match record[0] {
            IN_USE => {
                let mut value = [0u8; 8];
                value.copy_from_slice(&record[1..]);
                Ok(Some(u64::from_le_bytes(value)))
            }
            NOT_IN_USE => Ok(None),
            marker => Err(MetadataError::CorruptSlot { slot, marker }),
        }
    }

    pub fn set(&self, slot: MetadataSlot, value: u64) -> Result<(), MetadataError> {
        self.write_record(slot, &encode_slot(value))
    }

    /// Writes [`FIELD_NOT_PRESENT`] into `slot`.
    pub fn clear(&self, slot: MetadataSlot) -> Result<(), MetadataError> {
        self.write_record(slot, &FIELD_NOT_PRESENT)
    }

    fn write_record(
        &self,
        slot: MetadataSlot,
        record: &[u8; SLOT_RECORD_LEN],
    ) -> Result<(), MetadataError> {
        self.health.assert_healthy()?;
        self.records.write_at(slot.offset(), record)?;
        debug!(
            "event=metadata_slot_written slot={} in_use={}",
            slot,
            record[0] == IN_USE
        );
        Ok(())
    }

    /// The last committed transaction, present only when all three slots are.
    pub fn last_committed(&self) -> Result<Option<TransactionId>, MetadataError> {
        let id = self.get(MetadataSlot::LastTransactionId)?;
        let checksum = self.get(MetadataSlot::LastTransactionChecksum)?;
        let timestamp = self.get(MetadataSlot::LastTransactionCommitTimestamp)?;
        Ok(match (id, checksum, timestamp) {
            (Some(id), Some(checksum), Some(timestamp)) => {
                Some(TransactionId::new(id, checksum, timestamp))
            }
            _ => None,
        })
    }

    /// Records a committed transaction. The id slot is written last.
    pub fn set_last_committed(&self, tx: TransactionId) -> Result<(), MetadataError> {
        self.set(MetadataSlot::LastTransactionChecksum, tx.checksum)?;
        self.set(
            MetadataSlot::LastTransactionCommitTimestamp,
            tx.commit_timestamp,
        )?;
        self.set(MetadataSlot::LastTransactionId, tx.id)
    }

    /// The last closed position; `None` when the version slot is absent.
    ///
    /// An absent offset alongside a present version reads as offset 0.
    pub fn last_closed_position(&self) -> Result<Option<LogPosition>, MetadataError> {
        let Some(version) = self.get(MetadataSlot::LastClosedLogVersion)? else {
            return Ok(None);
        };
        let offset = self
            .get(MetadataSlot::LastClosedLogByteOffset)?
            .unwrap_or(0);
        Ok(Some(LogPosition::new(version, offset)))
    }

    /// Records a position known to sit on a transaction boundary.
    pub fn set_last_closed(&self, position: LogPosition) -> Result<(), MetadataError> {
        self.set(MetadataSlot::LastClosedLogByteOffset, position.byte_offset)?;
        self.set(MetadataSlot::LastClosedLogVersion, position.log_version)
    }

    /// Marks the closed position untrustworthy, forcing recovery to rescan the log.
    pub fn invalidate_last_closed(&self) -> Result<(), MetadataError> {
        self.clear(MetadataSlot::LastClosedLogVersion)
    }
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Unhealthy(#[from] HealthError),
    #[error("metadata slot {slot} has unknown in-use marker {marker:#04x}")]
    CorruptSlot { slot: MetadataSlot, marker: u8 },
}
