use crate::util::config::WalConfig;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

const METADATA_FILE: &str = "metadata.db";
const STAGED_TX_FILE: &str = "lastxinformation";
const STAGED_POSITION_FILE: &str = "lastxlogposition";

/// Describes the on-disk layout of one store directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: normalize_path(&root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn staged_transaction_file(&self) -> PathBuf {
        self.root.join(STAGED_TX_FILE)
    }

    pub fn staged_position_file(&self) -> PathBuf {
        self.root.join(STAGED_POSITION_FILE)
    }

    /// Resolves the configured log directory for this store.
    pub fn logs_dir(&self, config: &WalConfig) -> PathBuf {
        resolve_logs_dir(&self.root, &config.logs_location)
    }

    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }
}

/// Single resolution point for the log directory setting.
///
/// Relative settings are joined onto the store directory, absolute settings
/// are taken as-is, and both are lexically normalised so that the two spellings
/// of one location compare equal before any I/O happens.
pub fn resolve_logs_dir(store_dir: &Path, logs_location: &str) -> PathBuf {
    let configured = Path::new(logs_location.trim());
    let joined = if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        store_dir.join(configured)
    };
    normalize_path(&joined)
}

/// Removes `.` components and folds `..` into its parent without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
