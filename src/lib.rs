//! Write-ahead-log durability for a transactional graph store.
//!
//! Covers segment files and their rotation, the persisted record of the last
//! committed transaction and last closed log position, resolution of the
//! resume position after a restart, and carrying that state across store
//! format upgrades.

pub mod migration;
pub mod persistence;
pub mod telemetry;
pub mod util;

pub use migration::{
    MigrationAdapter, MigrationError, MigrationOutcome, NullProgressReporter, ProgressReporter,
    StoreFormat,
};
pub use persistence::durability::{
    AppendEvent, HealthMonitor, LogFilesInitializer, MetadataSlot, NullAppendEvent,
    RecoveryPoint, RecoveryPositionResolver, RotationController, RotationMonitor,
    TransactionId, TransactionLog, TransactionMetadataStore,
};
pub use persistence::storage::{LogPosition, LogSegmentStore, StoreLayout};
pub use telemetry::{MetricsRegistry, MetricsSnapshot};
pub use util::{DurabilityError, WalConfig};
