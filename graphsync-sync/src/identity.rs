//! Source of the local replica identity.

use graphsync_types::ReplicaId;

/// Supplies the identity a replica tags its writes with.
///
/// The value must stay the same for the whole lifetime of one connection to
/// the shared document.
pub trait IdentityProvider {
    fn identity(&self) -> ReplicaId;
}

impl IdentityProvider for ReplicaId {
    fn identity(&self) -> ReplicaId {
        *self
    }
}
