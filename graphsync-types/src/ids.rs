//! Identifier types used throughout graphsync.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identity of one replica (one running client attached to a shared document).
///
/// Stable for the lifetime of a session; a new session gets a new identity.
/// Uses UUID v7 so identities created later sort later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(Uuid);

impl ReplicaId {
    /// Creates a fresh replica identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a replica identity from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a replica identity from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ReplicaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReplicaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identifier of a node or edge, unique within its entity kind.
///
/// Serialized untagged, so it reads and writes as a plain JSON number or
/// string. Two ids denote the same record iff their [`key`](Self::key) forms
/// are equal; the replicated maps and local collections are keyed by that
/// form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl RecordId {
    /// The string form used as the replicated map key.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Recovers an id from its key form.
    ///
    /// A key that is the canonical rendering of an `i64` becomes [`RecordId::Int`];
    /// anything else (including `"01"` or `"+1"`) stays a string.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key.parse::<i64>() {
            Ok(n) if n.to_string() == key => Self::Int(n),
            _ => Self::Str(key.to_string()),
        }
    }

    /// Returns true for an empty string id, which can never be a valid key.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Str(s) if s.trim().is_empty())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i32> for RecordId {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}
