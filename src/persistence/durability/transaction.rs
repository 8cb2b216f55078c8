use serde::{Deserialize, Serialize};

/// Id of the very first transaction a store ever commits.
pub const BASE_TX_ID: u64 = 1;
/// Checksum recorded for "no prior transaction".
pub const BASE_TX_CHECKSUM: u64 = 0;
/// Commit timestamp recorded for "no prior transaction".
pub const BASE_TX_COMMIT_TIMESTAMP: u64 = 0;
/// Checksum recorded when a transaction existed but its metadata was lost.
pub const UNKNOWN_TX_CHECKSUM: u64 = 1;
/// Commit timestamp recorded when a transaction existed but its metadata was lost.
pub const UNKNOWN_TX_COMMIT_TIMESTAMP: u64 = 1;

/// Identity of a committed transaction. Equality is structural over all fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    pub id: u64,
    pub checksum: u64,
    pub commit_timestamp: u64,
}

impl TransactionId {
    pub fn new(id: u64, checksum: u64, commit_timestamp: u64) -> Self {
        Self {
            id,
            checksum,
            commit_timestamp,
        }
    }

    /// The first transaction: nothing came before it.
    pub fn base() -> Self {
        Self::new(BASE_TX_ID, BASE_TX_CHECKSUM, BASE_TX_COMMIT_TIMESTAMP)
    }

    /// Transaction `id` whose checksum and timestamp could not be recovered.
    pub fn unknown(id: u64) -> Self {
        Self::new(id, UNKNOWN_TX_CHECKSUM, UNKNOWN_TX_COMMIT_TIMESTAMP)
    }

    pub fn is_base(&self) -> bool {
        *self == Self::base()
    }

    pub fn has_unknown_metadata(&self) -> bool {
        self.checksum == UNKNOWN_TX_CHECKSUM && self.commit_timestamp == UNKNOWN_TX_COMMIT_TIMESTAMP
    }
}
