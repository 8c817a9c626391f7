//! Last-Writer-Wins map.
//!
//! A string-keyed map where every key is an [`LWWRegister`] over `Option<V>`;
//! `None` is a tombstone, kept so that a delete still beats older writes that
//! arrive late. Each local write is stamped with the map's hybrid clock and the
//! writer's next sequence number, and the map's [`VectorClock`] records the
//! highest sequence seen per replica.

use crate::{LWWRegister, VectorClock};
use graphsync_types::{HybridTimestamp, ReplicaId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One write to one key, as exchanged between replicas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapUpdate<V> {
    pub key: String,
    /// New value, or `None` for a delete.
    pub value: Option<V>,
    pub timestamp: HybridTimestamp,
    pub replica: ReplicaId,
    /// The writer's sequence number for this map.
    pub seq: u64,
}

impl<V> MapUpdate<V> {
    #[must_use]
    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot<V> {
    register: LWWRegister<Option<V>>,
    seq: u64,
}

impl<V: Clone> Slot<V> {
    fn to_update(&self, key: &str) -> MapUpdate<V> {
        MapUpdate {
            key: key.to_string(),
            value: self.register.value().clone(),
            timestamp: self.register.timestamp(),
            replica: self.register.replica(),
            seq: self.seq,
        }
    }
}

/// A replicated last-writer-wins map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LwwMap<V> {
    slots: BTreeMap<String, Slot<V>>,
    clock: VectorClock,
    /// Hybrid clock, advanced past every timestamp written or observed.
    latest: HybridTimestamp,
}

impl<V> Default for LwwMap<V> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
            clock: VectorClock::new(),
            latest: HybridTimestamp::zero(),
        }
    }
}

impl<V: Clone + PartialEq> LwwMap<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&V> {
        self.slots.get(key).and_then(|slot| slot.register.value().as_ref())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.slots
            .iter()
            .filter_map(|(key, slot)| slot.register.value().as_ref().map(|v| (key.as_str(), v)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(key, _)| key)
    }

    /// Number of live (non-tombstoned) keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The map's state vector.
    #[must_use]
    pub fn clock(&self) -> &VectorClock {
        &self.clock
    }

    /// Writes `value` under `key` as `replica`. Always wins locally.
    pub fn set(&mut self, key: impl Into<String>, value: V, replica: ReplicaId) -> MapUpdate<V> {
        self.write(key.into(), Some(value), replica)
    }

    /// Tombstones `key`. Deleting a key that is absent (never written or already
    /// deleted) is a no-op and produces no update.
    pub fn delete(&mut self, key: &str, replica: ReplicaId) -> Option<MapUpdate<V>> {
        if !self.contains_key(key) {
            return None;
        }
        Some(self.write(key.to_string(), None, replica))
    }

    fn write(&mut self, key: String, value: Option<V>, replica: ReplicaId) -> MapUpdate<V> {
        self.latest = self.latest.tick();
        let update = MapUpdate {
            key,
            value,
            timestamp: self.latest,
            replica,
            seq: self.clock.increment(replica),
        };
        self.slots.insert(
            update.key.clone(),
            Slot {
                register: LWWRegister::with_timestamp(
                    update.value.clone(),
                    update.timestamp,
                    update.replica,
                ),
                seq: update.seq,
            },
        );
        update
    }

    /// Applies an update produced by any replica.
    ///
    /// Returns true if the live value under the key changed. Redelivering an
    /// update that was already applied, or one that loses to the current
    /// winner, returns false and leaves the map untouched apart from the
    /// state vector.
    pub fn apply(&mut self, update: &MapUpdate<V>) -> bool {
        self.clock.update(update.replica, update.seq);
        self.latest = self.latest.receive(&update.timestamp);

        let before = self.get(&update.key).cloned();
        match self.slots.get_mut(&update.key) {
            Some(slot) => {
                let won = slot.register.set_with_timestamp(
                    update.value.clone(),
                    update.timestamp,
                    update.replica,
                );
                if !won {
                    return false;
                }
                slot.seq = update.seq;
            }
            None => {
                self.slots.insert(
                    update.key.clone(),
                    Slot {
                        register: LWWRegister::with_timestamp(
                            update.value.clone(),
                            update.timestamp,
                            update.replica,
                        ),
                        seq: update.seq,
                    },
                );
            }
        }
        before.as_ref() != self.get(&update.key)
    }

    /// Merges another replica's full state. Returns the keys whose live value
    /// changed, in key order.
    pub fn merge(&mut self, other: &Self) -> Vec<String> {
        let changed = other
            .slots
            .iter()
            .filter_map(|(key, slot)| self.apply(&slot.to_update(key)).then(|| key.clone()))
            .collect();
        self.clock.merge(&other.clock);
        changed
    }

    /// Every winning write (tombstones included) that a replica with state
    /// vector `seen` has not observed yet.
    #[must_use]
    pub fn updates_since(&self, seen: &VectorClock) -> Vec<MapUpdate<V>> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.seq > seen.get(&slot.register.replica()))
            .map(|(key, slot)| slot.to_update(key))
            .collect()
    }

    /// Every winning write, for a replica that has seen nothing.
    #[must_use]
    pub fn snapshot(&self) -> Vec<MapUpdate<V>> {
        self.updates_since(&VectorClock::new())
    }
}
