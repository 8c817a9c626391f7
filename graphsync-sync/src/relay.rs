//! In-memory relay.
//!
//! Stands in for the room server replicas connect to. Each room keeps its own
//! merged copy of the shared document, so a replica that joins late (or
//! rejoins after working offline) catches up from the room even when nobody
//! else is online. Delivery is reliable and in order; nothing here is visible
//! to the sync bridge, which only ever sees its map's change stream.

use crate::{SyncError, SyncResult};
use graphsync_crdt::{LwwMap, MapUpdate, VectorClock};
use graphsync_types::{EntityKind, ReplicaId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, warn};

/// Undelivered batches a member may have queued before the relay drops it
/// from the room. A dropped member catches up through the state-vector
/// exchange when it joins again, so nothing it missed is lost.
pub const MAX_INBOX: usize = 1024;

/// A batch of map updates for one entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocUpdate {
    pub kind: EntityKind,
    pub updates: Vec<MapUpdate<Value>>,
}

impl DocUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

/// State vectors of both maps of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVectors {
    pub nodes: VectorClock,
    pub edges: VectorClock,
}

impl StateVectors {
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> &VectorClock {
        match kind {
            EntityKind::Node => &self.nodes,
            EntityKind::Edge => &self.edges,
        }
    }
}

#[derive(Debug, Default)]
struct Room {
    nodes: LwwMap<Value>,
    edges: LwwMap<Value>,
    /// Connected members and their undelivered updates, each at most
    /// [`MAX_INBOX`] long.
    inboxes: HashMap<ReplicaId, VecDeque<DocUpdate>>,
}

impl Room {
    fn map_mut(&mut self, kind: EntityKind) -> &mut LwwMap<Value> {
        match kind {
            EntityKind::Node => &mut self.nodes,
            EntityKind::Edge => &mut self.edges,
        }
    }

    fn state_vectors(&self) -> StateVectors {
        StateVectors {
            nodes: self.nodes.clock().clone(),
            edges: self.edges.clock().clone(),
        }
    }

    fn missing_for(&self, seen: &StateVectors) -> Vec<DocUpdate> {
        [
            DocUpdate {
                kind: EntityKind::Node,
                updates: self.nodes.updates_since(&seen.nodes),
            },
            DocUpdate {
                kind: EntityKind::Edge,
                updates: self.edges.updates_since(&seen.edges),
            },
        ]
        .into_iter()
        .filter(|update| !update.is_empty())
        .collect()
    }
}

/// What a replica receives when it joins a room.
#[derive(Debug, Clone)]
pub struct JoinResponse {
    /// Everything in the room the replica has not seen.
    pub missing: Vec<DocUpdate>,
    /// The room's state vectors, so the replica can push what the room lacks.
    pub room_state: StateVectors,
}

/// Rooms of connected replicas.
#[derive(Debug, Default)]
pub struct Relay {
    rooms: BTreeMap<String, Room>,
}

impl Relay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects a replica to a room (creating the room on first use).
    pub fn join(&mut self, room: &str, replica: ReplicaId, seen: &StateVectors) -> JoinResponse {
        let state = self.rooms.entry(room.to_string()).or_default();
        state.inboxes.entry(replica).or_default();
        info!(
            "replica {replica} joined room {room} ({} member(s))",
            state.inboxes.len()
        );
        JoinResponse {
            missing: state.missing_for(seen),
            room_state: state.state_vectors(),
        }
    }

    /// Disconnects a replica. Returns false if it was not connected.
    pub fn leave(&mut self, room: &str, replica: ReplicaId) -> bool {
        let Some(state) = self.rooms.get_mut(room) else {
            return false;
        };
        let was_member = state.inboxes.remove(&replica).is_some();
        if was_member {
            info!("replica {replica} left room {room}");
        }
        was_member
    }

    /// Merges an update into the room and queues it for every other connected
    /// member. Returns the number of members it was queued for.
    pub fn publish(&mut self, room: &str, from: ReplicaId, update: DocUpdate) -> SyncResult<usize> {
        let state = self.room_mut(room)?;
        if !state.inboxes.contains_key(&from) {
            return Err(SyncError::NotConnected(from));
        }
        if update.is_empty() {
            return Ok(0);
        }

        let map = state.map_mut(update.kind);
        for entry in &update.updates {
            map.apply(entry);
        }

        let mut delivered = 0;
        let mut overflowed = Vec::new();
        for (member, inbox) in state.inboxes.iter_mut() {
            if *member == from {
                continue;
            }
            if inbox.len() >= MAX_INBOX {
                overflowed.push(*member);
            } else {
                inbox.push_back(update.clone());
                delivered += 1;
            }
        }
        for member in overflowed {
            state.inboxes.remove(&member);
            warn!("room {room}: dropped {member}, {MAX_INBOX} batches undelivered");
        }
        debug!(
            "room {room}/{}: {} update(s) from {from} queued for {delivered} member(s)",
            update.kind.map_name(),
            update.updates.len()
        );
        Ok(delivered)
    }

    /// Hands a member its queued updates, oldest first.
    pub fn drain_inbox(&mut self, room: &str, replica: ReplicaId) -> SyncResult<Vec<DocUpdate>> {
        let inbox = self
            .room_mut(room)?
            .inboxes
            .get_mut(&replica)
            .ok_or(SyncError::NotConnected(replica))?;
        Ok(inbox.drain(..).collect())
    }

    /// Connected members of a room.
    #[must_use]
    pub fn members(&self, room: &str) -> Vec<ReplicaId> {
        let mut members: Vec<ReplicaId> = self
            .rooms
            .get(room)
            .map(|state| state.inboxes.keys().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// The room's state vectors, if the room exists.
    #[must_use]
    pub fn state_vectors(&self, room: &str) -> Option<StateVectors> {
        self.rooms.get(room).map(Room::state_vectors)
    }

    fn room_mut(&mut self, room: &str) -> SyncResult<&mut Room> {
        self.rooms
            .get_mut(room)
            .ok_or_else(|| SyncError::UnknownRoom(room.to_string()))
    }
}
