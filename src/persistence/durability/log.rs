use crate::persistence::durability::health::{HealthError, HealthMonitor};
use crate::persistence::durability::metadata::{MetadataError, TransactionMetadataStore};
use crate::persistence::durability::rotation::{
    AppendEvent, RotationController, RotationError, RotationMonitor, RotationReport,
};
use crate::persistence::durability::transaction::TransactionId;
use crate::persistence::storage::layout::StoreLayout;
use crate::persistence::storage::position::LogPosition;
use crate::persistence::storage::segment::{LogSegmentStore, SegmentError};
use crate::util::config::WalConfig;
use log::{debug, error};
use std::sync::Arc;
use thiserror::Error;

/// Commit path over the segment store, rotation controller and metadata store.
///
/// An entry is forced to disk before the metadata slots naming it are
/// written, so the metadata never runs ahead of the log. Log I/O failures
/// mark the store unhealthy before they are returned.
pub struct TransactionLog {
    segments: Arc<LogSegmentStore>,
    rotation: RotationController,
    metadata: Arc<TransactionMetadataStore>,
    health: HealthMonitor,
}

impl TransactionLog {
    pub fn open(
        layout: &StoreLayout,
        config: &WalConfig,
        metadata: Arc<TransactionMetadataStore>,
        monitor: Arc<dyn RotationMonitor>,
    ) -> Result<Self, TransactionLogError> {
        let health = metadata.health().clone();
        let last_committed = metadata
            .last_committed()?
            .map(|tx| tx.id)
            .unwrap_or_default();
        let segments = Arc::new(LogSegmentStore::open(
            layout.logs_dir(config),
            config,
            last_committed,
        )?);
        debug!(
            "event=transaction_log_opened dir={} highest_version={} last_committed_tx_id={}",
            segments.dir().display(),
            segments.highest_version(),
            last_committed
        );
        let rotation = RotationController::new(segments.clone(), health.clone(), monitor);
        Ok(Self {
            segments,
            rotation,
            metadata,
            health,
        })
    }

    pub fn segments(&self) -> &Arc<LogSegmentStore> {
        &self.segments
    }

    pub fn rotation(&self) -> &RotationController {
        &self.rotation
    }

    pub fn metadata(&self) -> &Arc<TransactionMetadataStore> {
        &self.metadata
    }

    /// Appends `entry`, forces it and records `tx` as the last committed
    /// transaction, then rotates if the segment crossed its threshold.
    pub fn commit(
        &self,
        tx: TransactionId,
        entry: &[u8],
        event: &dyn AppendEvent,
    ) -> Result<LogPosition, TransactionLogError> {
        self.health.assert_healthy()?;
        let position = {
            let mut section = self.segments.lock();
            let forced = section
                .append(tx.id, entry)
                .and_then(|_| section.force());
            let position = match forced {
                Ok(position) => position,
                Err(err) => {
                    self.fail(format!("append of transaction {} failed: {err}", tx.id));
                    return Err(err.into());
                }
            };
            self.metadata.set_last_committed(tx)?;
            self.metadata.set_last_closed(position)?;
            position
        };
        match self.rotation.rotate_if_needed(event) {
            Ok(_) => Ok(position),
            Err(RotationError::Segment(err)) => {
                self.fail(format!("log rotation failed: {err}"));
                Err(RotationError::Segment(err).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn flush(&self) -> Result<LogPosition, TransactionLogError> {
        self.segments.flush().map_err(|err| {
            self.fail(format!("log flush failed: {err}"));
            err.into()
        })
    }

    /// Forced rotation, as administrative and migration flows require.
    pub fn rotate(&self, event: &dyn AppendEvent) -> Result<RotationReport, TransactionLogError> {
        self.rotation.rotate_log_file(event).map_err(|err| {
            if let RotationError::Segment(cause) = &err {
                self.fail(format!("log rotation failed: {cause}"));
            }
            err.into()
        })
    }

    fn fail(&self, cause: String) {
        error!("event=transaction_log_failed cause={}", cause);
        self.health.panic(cause);
    }
}

#[derive(Debug, Error)]
pub enum TransactionLogError {
    #[error(transparent)]
    Unhealthy(#[from] HealthError),
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Rotation(#[from] RotationError),
}
