use crate::migration::format::{CapabilityType, StoreFormat};
use crate::migration::staging::{StagedMetadata, StagingError};
use crate::persistence::durability::health::HealthMonitor;
use crate::persistence::durability::metadata::{
    MetadataError, MetadataSlot, TransactionMetadataStore,
};
use crate::persistence::durability::recovery::{RecoveryError, RecoveryPositionResolver};
use crate::persistence::durability::transaction::{TransactionId, BASE_TX_ID};
use crate::persistence::storage::layout::StoreLayout;
use crate::persistence::storage::position::LogPosition;
use crate::util::config::WalConfig;
use log::info;
use thiserror::Error;

/// Sink for migration progress.
pub trait ProgressReporter {
    fn start(&mut self, max: u64);
    fn progress(&mut self, add: u64);
    fn completed(&mut self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn start(&mut self, _max: u64) {}
    fn progress(&mut self, _add: u64) {}
    fn completed(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Source and target share format capabilities; nothing was touched.
    Skipped,
    Staged {
        transaction: TransactionId,
        position: LogPosition,
    },
}

/// Carries transaction metadata and the log position across a store format upgrade.
#[derive(Debug, Clone, Default)]
pub struct MigrationAdapter {
    config: WalConfig,
}

impl MigrationAdapter {
    pub fn new(config: WalConfig) -> Self {
        Self { config }
    }

    pub fn should_migrate(&self, old_version: &str, new_version: &str) -> Result<bool, MigrationError> {
        let old = StoreFormat::lookup(old_version)?;
        let new = StoreFormat::lookup(new_version)?;
        Ok(!old.has_compatible_capabilities(&new, CapabilityType::Format))
    }

    /// Reads the old store's metadata, resolving absent slots the way recovery does.
    pub fn derive_metadata(
        &self,
        old_layout: &StoreLayout,
    ) -> Result<(TransactionId, LogPosition), MigrationError> {
        let metadata = TransactionMetadataStore::open_read_only(
            old_layout.metadata_file(),
            HealthMonitor::new(),
        )?;
        let target_tx_id = metadata
            .get(MetadataSlot::LastTransactionId)?
            .unwrap_or(BASE_TX_ID);
        let resolver = RecoveryPositionResolver::new(&metadata, old_layout, &self.config);
        let transaction = resolver.resolve_transaction_metadata(target_tx_id)?;
        let position = resolver.resolve_log_position(target_tx_id)?;
        Ok((transaction, position))
    }

    pub fn stage_for_new_store(
        &self,
        new_layout: &StoreLayout,
        transaction: &TransactionId,
        position: &LogPosition,
    ) -> Result<(), MigrationError> {
        StagedMetadata::new(new_layout).stage(transaction, position)?;
        Ok(())
    }

    pub fn read_staged(
        &self,
        new_layout: &StoreLayout,
    ) -> Result<(TransactionId, LogPosition), MigrationError> {
        Ok(StagedMetadata::new(new_layout).read()?)
    }

    /// Derives and stages metadata unless both formats share their format capabilities,
    /// in which case the reporter is never invoked.
    pub fn migrate(
        &self,
        old_layout: &StoreLayout,
        new_layout: &StoreLayout,
        reporter: &mut dyn ProgressReporter,
        old_version: &str,
        new_version: &str,
    ) -> Result<MigrationOutcome, MigrationError> {
        if !self.should_migrate(old_version, new_version)? {
            info!(
                "event=migration_skipped from={} to={} store={}",
                old_version,
                new_version,
                old_layout.root().display()
            );
            return Ok(MigrationOutcome::Skipped);
        }
        info!(
            "event=migration_started from={} to={} store={}",
            old_version,
            new_version,
            old_layout.root().display()
        );
        reporter.start(2);
        let (transaction, position) = self.derive_metadata(old_layout)?;
        reporter.progress(1);
        self.stage_for_new_store(new_layout, &transaction, &position)?;
        reporter.progress(1);
        reporter.completed();
        info!(
            "event=migration_finished from={} to={} tx_id={} position={}",
            old_version, new_version, transaction.id, position
        );
        Ok(MigrationOutcome::Staged {
            transaction,
            position,
        })
    }

    /// Moves staged values into the new store's metadata and drops the side channel.
    pub fn finalize(
        &self,
        new_layout: &StoreLayout,
        metadata: &TransactionMetadataStore,
    ) -> Result<(TransactionId, LogPosition), MigrationError> {
        let staged = StagedMetadata::new(new_layout);
        let (transaction, position) = staged.read()?;
        metadata.set_last_committed(transaction)?;
        metadata.set_last_closed(position)?;
        staged.remove()?;
        info!(
            "event=migration_finalized store={} tx_id={} position={}",
            new_layout.root().display(),
            transaction.id,
            position
        );
        Ok((transaction, position))
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("unknown store format version {0:?}")]
    UnknownFormat(String),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error(transparent)]
    Staging(#[from] StagingError),
}
