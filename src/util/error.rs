use crate::migration::{MigrationError, StagingError};
use crate::persistence::durability::{
    HealthError, InitializerError, MetadataError, RecoveryError, RotationError,
    TransactionLogError,
};
use crate::persistence::storage::SegmentError;
use crate::util::config::ConfigError;
use thiserror::Error;

/// Any failure surfaced by the durability subsystem.
#[derive(Debug, Error)]
pub enum DurabilityError {
    #[error(transparent)]
    Health(#[from] HealthError),
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Rotation(#[from] RotationError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Log(#[from] TransactionLogError),
    #[error(transparent)]
    Initializer(#[from] InitializerError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DurabilityError {
    /// True when the failure came from a store already marked unhealthy.
    pub fn is_unhealthy(&self) -> bool {
        matches!(
            self,
            DurabilityError::Health(_)
                | DurabilityError::Metadata(MetadataError::Unhealthy(_))
                | DurabilityError::Rotation(RotationError::Unhealthy(_))
                | DurabilityError::Log(TransactionLogError::Unhealthy(_))
                | DurabilityError::Log(TransactionLogError::Metadata(MetadataError::Unhealthy(_)))
                | DurabilityError::Log(TransactionLogError::Rotation(RotationError::Unhealthy(_)))
        )
    }
}
