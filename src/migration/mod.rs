//! Store format upgrades: capability comparison and side-channel staging of
//! transaction metadata for the upgraded store.

pub mod adapter;
pub mod format;
pub mod staging;

pub use adapter::{
    MigrationAdapter, MigrationError, MigrationOutcome, NullProgressReporter, ProgressReporter,
};
pub use format::{Capability, CapabilityType, StoreFormat, KNOWN_FORMATS};
pub use staging::{StagedMetadata, StagingError};
