use crate::migration::adapter::MigrationError;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CapabilityType {
    /// Affects the on-disk record layout; differences require a migration.
    Format,
    /// Affects only index providers, which are rebuilt separately.
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    DenseNodes,
    SchemaRecords,
    RelationshipTypeThreeBytes,
    PointProperties,
    TemporalProperties,
    LargeIdSpace,
    LuceneIndex,
    NativeIndex,
}

impl Capability {
    pub fn capability_type(self) -> CapabilityType {
        match self {
            Capability::LuceneIndex | Capability::NativeIndex => CapabilityType::Index,
            _ => CapabilityType::Format,
        }
    }
}

/// A known on-disk store format and what it can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFormat {
    version: &'static str,
    capabilities: &'static [Capability],
}

const STANDARD_V1: StoreFormat = StoreFormat {
    version: "standard-v1",
    capabilities: &[
        Capability::DenseNodes,
        Capability::SchemaRecords,
        Capability::RelationshipTypeThreeBytes,
        Capability::LuceneIndex,
    ],
};

const STANDARD_V2: StoreFormat = StoreFormat {
    version: "standard-v2",
    capabilities: &[
        Capability::DenseNodes,
        Capability::SchemaRecords,
        Capability::RelationshipTypeThreeBytes,
        Capability::NativeIndex,
    ],
};

const STANDARD_V3: StoreFormat = StoreFormat {
    version: "standard-v3",
    capabilities: &[
        Capability::DenseNodes,
        Capability::SchemaRecords,
        Capability::RelationshipTypeThreeBytes,
        Capability::PointProperties,
        Capability::TemporalProperties,
        Capability::NativeIndex,
    ],
};

const HIGH_LIMIT_V1: StoreFormat = StoreFormat {
    version: "high-limit-v1",
    capabilities: &[
        Capability::DenseNodes,
        Capability::SchemaRecords,
        Capability::RelationshipTypeThreeBytes,
        Capability::PointProperties,
        Capability::TemporalProperties,
        Capability::LargeIdSpace,
        Capability::NativeIndex,
    ],
};

pub const KNOWN_FORMATS: [StoreFormat; 4] = [STANDARD_V1, STANDARD_V2, STANDARD_V3, HIGH_LIMIT_V1];

impl StoreFormat {
    pub fn lookup(version: &str) -> Result<StoreFormat, MigrationError> {
        KNOWN_FORMATS
            .iter()
            .copied()
            .find(|format| format.version == version)
            .ok_or_else(|| MigrationError::UnknownFormat(version.to_string()))
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn capabilities_of(&self, kind: CapabilityType) -> BTreeSet<Capability> {
        self.capabilities
            .iter()
            .copied()
            .filter(|capability| capability.capability_type() == kind)
            .collect()
    }

    pub fn has_compatible_capabilities(&self, other: &StoreFormat, kind: CapabilityType) -> bool {
        self.capabilities_of(kind) == other.capabilities_of(kind)
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version)
    }
}
