//! Last-Writer-Wins Register.
//!
//! Holds one value. Concurrent writes resolve by timestamp; equal timestamps
//! fall back to the higher replica id so every replica picks the same winner.

use graphsync_types::{HybridTimestamp, ReplicaId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A Last-Writer-Wins register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LWWRegister<T> {
    value: T,
    /// Timestamp of the winning write.
    timestamp: HybridTimestamp,
    /// Replica that performed the winning write.
    replica: ReplicaId,
}

impl<T> LWWRegister<T> {
    /// Creates a register holding a write made at `timestamp`.
    #[must_use]
    pub fn with_timestamp(value: T, timestamp: HybridTimestamp, replica: ReplicaId) -> Self {
        Self {
            value,
            timestamp,
            replica,
        }
    }

    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    #[must_use]
    pub fn timestamp(&self) -> HybridTimestamp {
        self.timestamp
    }

    /// Replica that performed the winning write.
    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Offers a write with an explicit timestamp. Returns true if it won.
    pub fn set_with_timestamp(
        &mut self,
        value: T,
        timestamp: HybridTimestamp,
        replica: ReplicaId,
    ) -> bool {
        if !self.wins_over_current(timestamp, replica) {
            return false;
        }
        self.value = value;
        self.timestamp = timestamp;
        self.replica = replica;
        true
    }

    /// Decides whether an incoming write beats the current one.
    ///
    /// A write identical in timestamp and replica does not win, which is what
    /// makes redelivery of the same write a no-op.
    fn wins_over_current(&self, timestamp: HybridTimestamp, replica: ReplicaId) -> bool {
        match timestamp.cmp(&self.timestamp) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => replica > self.replica,
        }
    }
}

impl<T: Clone> LWWRegister<T> {
    /// Merges another register into this one. Returns true if this one changed.
    pub fn merge(&mut self, other: &Self) -> bool {
        self.set_with_timestamp(other.value.clone(), other.timestamp, other.replica)
    }

    /// Returns the merge of this register and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl<T: PartialEq> PartialEq for LWWRegister<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.timestamp == other.timestamp
            && self.replica == other.replica
    }
}

impl<T: Eq> Eq for LWWRegister<T> {}
