use serde::{Deserialize, Serialize};
use std::fmt;

/// Exact cursor into the log segment sequence.
///
/// Ordering is lexicographic over `(log_version, byte_offset)`, which the
/// derived `Ord` provides through field declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition {
    pub log_version: u64,
    pub byte_offset: u64,
}

impl LogPosition {
    /// Position of a brand-new log: segment 0, offset 0.
    pub const START: LogPosition = LogPosition {
        log_version: 0,
        byte_offset: 0,
    };

    pub fn new(log_version: u64, byte_offset: u64) -> Self {
        Self {
            log_version,
            byte_offset,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.log_version, self.byte_offset)
    }
}
