//! Core type definitions for graphsync.
//!
//! This crate defines the types shared by the replication layer and the
//! sync bridge:
//! - Replica and record identifiers
//! - Hybrid Logical Clock timestamps
//! - Typed node and edge records carrying an optional origin tag
//!
//! Records are validated here, at the boundary between the local collections
//! and the replicated maps, so that nothing without a stable key ever reaches
//! the shared document.

mod ids;
mod record;
mod timestamp;

pub use ids::{RecordId, ReplicaId};
pub use record::{EdgeRecord, EntityKind, GraphRecord, NodeRecord};
pub use timestamp::HybridTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed {kind} record: {reason}")]
    MalformedRecord { kind: EntityKind, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid replica id: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
