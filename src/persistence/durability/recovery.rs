use crate::persistence::durability::metadata::{MetadataError, TransactionMetadataStore};
use crate::persistence::durability::transaction::{TransactionId, BASE_TX_ID};
use crate::persistence::storage::layout::StoreLayout;
use crate::persistence::storage::position::LogPosition;
use crate::persistence::storage::segment::{list_segments, SegmentError, SEGMENT_HEADER_LEN};
use crate::util::config::WalConfig;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where replay or further appends resume after a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPoint {
    pub transaction: TransactionId,
    pub position: LogPosition,
}

/// Reconciles persisted metadata with the log directory.
///
/// Runs offline: the caller guarantees that nothing appends to the log while
/// a resolution is in progress, since the fallback position is derived from
/// file lengths alone.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryPositionResolver<'a> {
    metadata: &'a TransactionMetadataStore,
    layout: &'a StoreLayout,
    config: &'a WalConfig,
}

impl<'a> RecoveryPositionResolver<'a> {
    pub fn new(
        metadata: &'a TransactionMetadataStore,
        layout: &'a StoreLayout,
        config: &'a WalConfig,
    ) -> Self {
        Self {
            metadata,
            layout,
            config,
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.layout.logs_dir(self.config)
    }

    pub fn resolve(&self, target_tx_id: u64) -> Result<RecoveryPoint, RecoveryError> {
        Ok(RecoveryPoint {
            transaction: self.resolve_transaction_metadata(target_tx_id)?,
            position: self.resolve_log_position(target_tx_id)?,
        })
    }

    /// Persisted triple when complete, otherwise `BASE` for the first
    /// transaction and `UNKNOWN` for any later one.
    pub fn resolve_transaction_metadata(
        &self,
        target_tx_id: u64,
    ) -> Result<TransactionId, RecoveryError> {
        if let Some(tx) = self.metadata.last_committed()? {
            return Ok(tx);
        }
        if target_tx_id == BASE_TX_ID {
            info!(
                "event=recovery_metadata_base store={}",
                self.layout.root().display()
            );
            return Ok(TransactionId::base());
        }
        warn!(
            "event=recovery_metadata_unknown store={} target_tx_id={}",
            self.layout.root().display(),
            target_tx_id
        );
        Ok(TransactionId::unknown(target_tx_id))
    }

    /// Closed position when recorded, otherwise the end of the highest segment.
    pub fn resolve_log_position(&self, target_tx_id: u64) -> Result<LogPosition, RecoveryError> {
        if let Some(position) = self.metadata.last_closed_position()? {
            debug!(
                "event=recovery_position_closed position={} target_tx_id={}",
                position, target_tx_id
            );
            return Ok(position);
        }
        scan_log_position(&self.logs_dir())
    }
}

/// Derives the resume position from segment lengths in `dir`.
///
/// No segments means a brand-new log at [`LogPosition::START`]. A trailing
/// segment shorter than its header is the remnant of a failed rotation and is
/// skipped, matching what opening the log would discard.
pub fn scan_log_position(dir: &Path) -> Result<LogPosition, RecoveryError> {
    let mut segments = list_segments(dir)?;
    if segments
        .last()
        .is_some_and(|last| last.len < SEGMENT_HEADER_LEN)
    {
        segments.pop();
    }
    let Some(highest) = segments.last() else {
        debug!("event=recovery_position_empty dir={}", dir.display());
        return Ok(LogPosition::START);
    };
    let lowest = segments[0].version;
    let mut total_bytes = 0u64;
    for (offset, segment) in segments.iter().enumerate() {
        let expected = lowest + offset as u64;
        if segment.version != expected {
            return Err(SegmentError::VersionGap {
                expected,
                found: segment.version,
            }
            .into());
        }
        total_bytes = total_bytes.saturating_add(segment.len);
    }
    let position = LogPosition::new(highest.version, highest.len);
    info!(
        "event=recovery_position_scan dir={} lowest_version={} highest_version={} total_bytes={} position={}",
        dir.display(),
        lowest,
        highest.version,
        total_bytes,
        position
    );
    Ok(position)
}

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Segment(#[from] SegmentError),
}
