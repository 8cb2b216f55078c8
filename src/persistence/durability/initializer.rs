use crate::persistence::durability::metadata::{MetadataError, TransactionMetadataStore};
use crate::persistence::storage::layout::StoreLayout;
use crate::persistence::storage::position::LogPosition;
use crate::persistence::storage::segment::{list_segments, LogSegmentStore, SegmentError};
use crate::util::config::WalConfig;
use log::info;
use std::path::PathBuf;
use thiserror::Error;

/// Creates the first log segment for a store populated outside the log,
/// such as by a bulk import.
#[derive(Debug, Clone, Copy)]
pub struct LogFilesInitializer<'a> {
    layout: &'a StoreLayout,
    config: &'a WalConfig,
}

impl<'a> LogFilesInitializer<'a> {
    pub fn new(layout: &'a StoreLayout, config: &'a WalConfig) -> Self {
        Self { layout, config }
    }

    /// Writes segment 0 and records its header end as the last closed position.
    pub fn initialize(
        &self,
        metadata: &TransactionMetadataStore,
    ) -> Result<LogPosition, InitializerError> {
        let dir = self.layout.logs_dir(self.config);
        let existing = list_segments(&dir)?;
        if !existing.is_empty() {
            return Err(InitializerError::LogsExist {
                dir,
                count: existing.len(),
            });
        }
        let last_committed = metadata
            .last_committed()?
            .ok_or(InitializerError::MissingLastCommitted)?;
        metadata.health().assert_healthy().map_err(MetadataError::from)?;
        let segments = LogSegmentStore::open(&dir, self.config, last_committed.id)?;
        let position = segments.flush()?;
        metadata.set_last_closed(position)?;
        info!(
            "event=wal_logs_initialized dir={} last_committed_tx_id={} position={}",
            dir.display(),
            last_committed.id,
            position
        );
        Ok(position)
    }
}

#[derive(Debug, Error)]
pub enum InitializerError {
    #[error("log directory {dir:?} already holds {count} segment(s)")]
    LogsExist { dir: PathBuf, count: usize },
    #[error("metadata store has no last committed transaction")]
    MissingLastCommitted,
    #[error(transparent)]
    Segment(#[from] SegmentError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}
