//! Error types for the sync layer.

use graphsync_types::{EntityKind, ReplicaId};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// There is no conflict variant: two replicas writing the same key is resolved
/// by the replicated map's last-writer-wins rule and is never reported.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A record without a usable key, or a stored value that does not decode.
    #[error("malformed {kind} record: {reason}")]
    MalformedRecord { kind: EntityKind, reason: String },

    /// The replicated map cannot accept writes (detached or torn down).
    #[error("{kind} map unavailable: {reason}")]
    AdapterUnavailable { kind: EntityKind, reason: String },

    /// An edit addressed a record the local collection does not hold.
    #[error("no {kind} record with id {id}")]
    UnknownRecord { kind: EntityKind, id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown room: {0}")]
    UnknownRoom(String),

    /// The replica is not a connected member of the room.
    #[error("replica {0} is not connected")]
    NotConnected(ReplicaId),

    #[error(transparent)]
    Types(graphsync_types::Error),
}

impl From<graphsync_types::Error> for SyncError {
    fn from(err: graphsync_types::Error) -> Self {
        match err {
            graphsync_types::Error::MalformedRecord { kind, reason } => {
                Self::MalformedRecord { kind, reason }
            }
            graphsync_types::Error::Serialization(e) => Self::Serialization(e),
            other => Self::Types(other),
        }
    }
}
