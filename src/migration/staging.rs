use crate::persistence::durability::transaction::TransactionId;
use crate::persistence::storage::layout::StoreLayout;
use crate::persistence::storage::position::LogPosition;
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Side-channel files carrying transaction metadata into a store whose
/// metadata file does not exist yet.
#[derive(Debug, Clone)]
pub struct StagedMetadata {
    transaction_path: PathBuf,
    position_path: PathBuf,
}

impl StagedMetadata {
    pub fn new(layout: &StoreLayout) -> Self {
        Self {
            transaction_path: layout.staged_transaction_file(),
            position_path: layout.staged_position_file(),
        }
    }

    pub fn transaction_path(&self) -> &Path {
        &self.transaction_path
    }

    pub fn position_path(&self) -> &Path {
        &self.position_path
    }

    pub fn exists(&self) -> bool {
        self.transaction_path.exists() && self.position_path.exists()
    }

    pub fn stage(
        &self,
        transaction: &TransactionId,
        position: &LogPosition,
    ) -> Result<(), StagingError> {
        persist(&self.transaction_path, transaction)?;
        persist(&self.position_path, position)?;
        debug!(
            "event=migration_metadata_staged tx_id={} position={} dir={}",
            transaction.id,
            position,
            self.transaction_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .display()
        );
        Ok(())
    }

    pub fn read(&self) -> Result<(TransactionId, LogPosition), StagingError> {
        Ok((load(&self.transaction_path)?, load(&self.position_path)?))
    }

    /// Removes both files; files already gone are not an error.
    pub fn remove(&self) -> Result<(), StagingError> {
        for path in [&self.transaction_path, &self.position_path] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

fn persist<T: Serialize>(path: &Path, value: &T) -> Result<(), StagingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    let payload = serde_json::to_vec_pretty(value)?;
    file.write_all(&payload)?;
    file.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, StagingError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StagingError::Missing {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(StagingError::Io(err)),
    }
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("staged migration file {path:?} is missing")]
    Missing { path: PathBuf },
}
