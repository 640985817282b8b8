//! Consistency levels

use serde::{Deserialize, Serialize};

/// How many replicas must acknowledge an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    /// Any node, hinted handoff included (writes only)
    Any,
    /// One replica
    One,
    /// Two replicas
    Two,
    /// Three replicas
    Three,
    /// Majority of replicas across all datacenters
    Quorum,
    /// All replicas
    All,
    /// Majority of replicas in the local datacenter
    LocalQuorum,
    /// Majority of replicas in each datacenter
    EachQuorum,
    /// Linearizable, across datacenters
    Serial,
    /// Linearizable, local datacenter
    LocalSerial,
    /// One replica in the local datacenter
    LocalOne,
}

impl ConsistencyLevel {
    /// Level used when the configured value is not a known level
    pub const DRIVER_DEFAULT: ConsistencyLevel = ConsistencyLevel::LocalOne;

    /// Every supported level
    pub const ALL_LEVELS: [ConsistencyLevel; 11] = [
        Self::Any,
        Self::One,
        Self::Two,
        Self::Three,
        Self::Quorum,
        Self::All,
        Self::LocalQuorum,
        Self::EachQuorum,
        Self::Serial,
        Self::LocalSerial,
        Self::LocalOne,
    ];

    /// Case-insensitive match against the level names; `None` when nothing matches
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL_LEVELS
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Canonical uppercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::Serial => "SERIAL",
            Self::LocalSerial => "LOCAL_SERIAL",
            Self::LocalOne => "LOCAL_ONE",
        }
    }

    /// Whether this is a serial (lightweight transaction) level
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::Serial | Self::LocalSerial)
    }
}

impl Default for ConsistencyLevel {
    fn default() -> Self {
        Self::DRIVER_DEFAULT
    }
}

impl std::fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConsistencyLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            crate::Error::MalformedUri(format!("unknown consistency level '{}'", s))
        })
    }
}
