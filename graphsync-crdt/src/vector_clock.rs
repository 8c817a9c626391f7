//! Vector clock over replica sequence numbers.
//!
//! Every local write into a replicated map bumps the writer's entry. The
//! resulting clock is the map's *state vector*: a summary of which writes a
//! replica has seen, exchanged on reconnect so each side can send exactly what
//! the other is missing.

use graphsync_types::ReplicaId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Causality relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    Before,
    After,
    Concurrent,
    Equal,
}

/// Highest sequence number seen from each replica.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorClock {
    clocks: HashMap<ReplicaId, u64>,
}

impl VectorClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence seen from a replica (0 if none).
    #[must_use]
    pub fn get(&self, replica: &ReplicaId) -> u64 {
        self.clocks.get(replica).copied().unwrap_or(0)
    }

    pub fn replicas(&self) -> impl Iterator<Item = (&ReplicaId, &u64)> {
        self.clocks.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Bumps a replica's entry and returns the new sequence number.
    pub fn increment(&mut self, replica: ReplicaId) -> u64 {
        let entry = self.clocks.entry(replica).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Raises a replica's entry to `seq` if that is higher.
    pub fn update(&mut self, replica: ReplicaId, seq: u64) {
        let entry = self.clocks.entry(replica).or_insert(0);
        if seq > *entry {
            *entry = seq;
        }
    }

    /// Pointwise maximum.
    pub fn merge(&mut self, other: &Self) {
        for (replica, &seq) in &other.clocks {
            self.update(*replica, seq);
        }
    }

    #[must_use]
    pub fn compare(&self, other: &Self) -> CausalOrder {
        let replicas: BTreeSet<_> = self.clocks.keys().chain(other.clocks.keys()).collect();

        let mut self_ahead = false;
        let mut other_ahead = false;
        for replica in replicas {
            let (mine, theirs) = (self.get(replica), other.get(replica));
            self_ahead |= mine > theirs;
            other_ahead |= theirs > mine;
        }

        match (self_ahead, other_ahead) {
            (false, false) => CausalOrder::Equal,
            (true, false) => CausalOrder::After,
            (false, true) => CausalOrder::Before,
            (true, true) => CausalOrder::Concurrent,
        }
    }

    /// True if this clock has seen everything `other` has.
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        matches!(self.compare(other), CausalOrder::After | CausalOrder::Equal)
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Equal
    }
}

impl Eq for VectorClock {}
