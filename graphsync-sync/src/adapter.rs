//! Replicated map adapter.
//!
//! [`ReplicatedMap`] is the narrow interface the sync bridge needs from the
//! shared document. [`MapAdapter`] implements it over an [`LwwMap`] of JSON
//! values, decoding into typed records at the boundary and collecting every
//! local write into an outbox for the transport to disseminate.

use crate::{SyncError, SyncResult};
use graphsync_crdt::{LwwMap, MapUpdate, VectorClock};
use graphsync_types::{GraphRecord, ReplicaId};
use serde_json::Value;
use std::marker::PhantomData;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

/// Keys whose values changed in one merge, local or remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysChanged {
    pub keys: Vec<String>,
}

/// Operations the sync bridge performs against a replicated map.
///
/// The change stream fires for local and remote writes alike; implementations
/// are not expected to know where a write came from.
pub trait ReplicatedMap<R: GraphRecord> {
    fn has(&self, key: &str) -> bool;

    /// Reads and decodes the record under `key`.
    fn get(&self, key: &str) -> SyncResult<Option<R>>;

    fn set(&mut self, key: &str, record: &R) -> SyncResult<()>;

    /// Deletes `key`; deleting an absent key succeeds without effect.
    fn delete(&mut self, key: &str) -> SyncResult<()>;

    fn subscribe(&mut self) -> UnboundedReceiver<KeysChanged>;

    /// False while the map cannot take writes.
    fn is_available(&self) -> bool {
        true
    }
}

/// A typed view over one [`LwwMap`] of a replica's shared document.
#[derive(Debug)]
pub struct MapAdapter<R: GraphRecord> {
    replica: ReplicaId,
    map: LwwMap<Value>,
    subscribers: Vec<UnboundedSender<KeysChanged>>,
    outbox: Vec<MapUpdate<Value>>,
    attached: bool,
    _record: PhantomData<fn() -> R>,
}

impl<R: GraphRecord> MapAdapter<R> {
    /// Creates an empty map that writes as `replica`.
    #[must_use]
    pub fn new(replica: ReplicaId) -> Self {
        Self {
            replica,
            map: LwwMap::new(),
            subscribers: Vec::new(),
            outbox: Vec::new(),
            attached: true,
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// The underlying CRDT, for inspection.
    #[must_use]
    pub fn inner(&self) -> &LwwMap<Value> {
        &self.map
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// This map's state vector.
    #[must_use]
    pub fn state_vector(&self) -> &VectorClock {
        self.map.clock()
    }

    /// Winning writes a replica with state vector `seen` is missing.
    #[must_use]
    pub fn updates_since(&self, seen: &VectorClock) -> Vec<MapUpdate<Value>> {
        self.map.updates_since(seen)
    }

    /// Local writes made since the last call, oldest first.
    pub fn take_outgoing(&mut self) -> Vec<MapUpdate<Value>> {
        std::mem::take(&mut self.outbox)
    }

    /// Merges updates received from other replicas as one transaction and
    /// notifies subscribers of the keys whose values changed.
    pub fn apply_remote(&mut self, updates: &[MapUpdate<Value>]) -> SyncResult<Vec<String>> {
        self.ensure_attached()?;
        let mut changed: Vec<String> = updates
            .iter()
            .filter(|update| self.map.apply(update))
            .map(|update| update.key.clone())
            .collect();
        changed.sort();
        changed.dedup();
        debug!(
            "{} map merged {} remote update(s), {} key(s) changed",
            R::KIND,
            updates.len(),
            changed.len()
        );
        self.notify(changed.clone());
        Ok(changed)
    }

    /// Stops accepting writes; every later operation that mutates the map
    /// fails with [`SyncError::AdapterUnavailable`].
    pub fn detach(&mut self) {
        self.attached = false;
        self.subscribers.clear();
    }

    fn ensure_attached(&self) -> SyncResult<()> {
        if self.attached {
            Ok(())
        } else {
            Err(SyncError::AdapterUnavailable {
                kind: R::KIND,
                reason: "map adapter has been detached".to_string(),
            })
        }
    }

    fn notify(&mut self, keys: Vec<String>) {
        if keys.is_empty() {
            return;
        }
        let change = KeysChanged { keys };
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

impl<R: GraphRecord> ReplicatedMap<R> for MapAdapter<R> {
    fn has(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    fn get(&self, key: &str) -> SyncResult<Option<R>> {
        match self.map.get(key) {
            Some(value) => Ok(Some(R::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    fn set(&mut self, key: &str, record: &R) -> SyncResult<()> {
        self.ensure_attached()?;
        if record.key() != key {
            warn!("refusing {} write: key {key} does not match id {}", R::KIND, record.id());
            return Err(SyncError::MalformedRecord {
                kind: R::KIND,
                reason: format!("key {key} does not match id {}", record.id()),
            });
        }
        let value = record.to_value()?;
        let update = self.map.set(key, value, self.replica);
        self.outbox.push(update);
        self.notify(vec![key.to_string()]);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> SyncResult<()> {
        self.ensure_attached()?;
        if let Some(update) = self.map.delete(key, self.replica) {
            self.outbox.push(update);
            self.notify(vec![key.to_string()]);
        }
        Ok(())
    }

    fn subscribe(&mut self) -> UnboundedReceiver<KeysChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn is_available(&self) -> bool {
        self.attached
    }
}
