//! Durable transaction metadata, store health, log rotation and recovery.

pub mod health;
pub mod initializer;
pub mod log;
pub mod metadata;
pub mod recovery;
pub mod rotation;
pub mod slots;
pub mod transaction;

pub use health::{HealthError, HealthMonitor, HealthState};
pub use initializer::{InitializerError, LogFilesInitializer};
pub use log::{TransactionLog, TransactionLogError};
pub use metadata::{
    MetadataError, MetadataSlot, TransactionMetadataStore, FIELD_NOT_PRESENT, SLOT_RECORD_LEN,
};
pub use recovery::{scan_log_position, RecoveryError, RecoveryPoint, RecoveryPositionResolver};
pub use rotation::{
    AppendEvent, Clock, LoggingRotationMonitor, MetricsRotationMonitor, NullAppendEvent,
    NullRotationMonitor, RotationController, RotationError, RotationMonitor, RotationReport,
    RotationState, SystemClock,
};
pub use slots::{FileRecordStore, MemoryRecordStore, RecordStore};
pub use transaction::{
    TransactionId, BASE_TX_CHECKSUM, BASE_TX_COMMIT_TIMESTAMP, BASE_TX_ID, UNKNOWN_TX_CHECKSUM,
    UNKNOWN_TX_COMMIT_TIMESTAMP,
};
