//! Replica session: everything one replica needs to take part in a shared
//! graph.
//!
//! A session is created when a replica starts and torn down with
//! [`Session::close`]. It holds the replica's identity, its two local
//! collections, the two replicated maps of its copy of the document and the
//! two bridges wiring them together. Nothing is global: two sessions in one
//! process are two independent replicas.

use crate::adapter::MapAdapter;
use crate::bridge::{PumpReport, SyncBridge};
use crate::collection::{LocalCollection, Upsert};
use crate::identity::IdentityProvider;
use crate::relay::{DocUpdate, JoinResponse, Relay, StateVectors};
use crate::snapshot::GraphSnapshot;
use crate::{SyncError, SyncResult};
use graphsync_types::{EdgeRecord, EntityKind, NodeRecord, RecordId, ReplicaId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Room (shared document) to join on the relay.
    pub room: String,
    /// Human-readable name used in logs.
    pub device_name: String,
    /// Whether [`Session::open`] connects immediately.
    pub connect_on_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: "graphsync-default".to_string(),
            device_name: "graphsync replica".to_string(),
            connect_on_start: true,
        }
    }
}

/// Whether the session is currently disseminating its writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// One replica of the shared graph.
#[derive(Debug)]
pub struct Session {
    replica: ReplicaId,
    config: SessionConfig,
    status: ConnectionStatus,
    nodes: LocalCollection<NodeRecord>,
    edges: LocalCollection<EdgeRecord>,
    node_map: MapAdapter<NodeRecord>,
    edge_map: MapAdapter<EdgeRecord>,
    node_bridge: SyncBridge<NodeRecord>,
    edge_bridge: SyncBridge<EdgeRecord>,
}

impl Session {
    /// Creates a disconnected session with a fresh identity.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_identity(config, &ReplicaId::new())
    }

    /// Creates a disconnected session whose writes are tagged with the
    /// provider's identity.
    pub fn with_identity(config: SessionConfig, identity: &impl IdentityProvider) -> Self {
        let replica = identity.identity();
        let mut nodes = LocalCollection::new();
        let mut edges = LocalCollection::new();
        let mut node_map = MapAdapter::new(replica);
        let mut edge_map = MapAdapter::new(replica);
        let node_bridge = SyncBridge::attach(replica, &mut nodes, &mut node_map);
        let edge_bridge = SyncBridge::attach(replica, &mut edges, &mut edge_map);

        info!(
            "session for {} started, replica id {replica}",
            config.device_name
        );

        Self {
            replica,
            config,
            status: ConnectionStatus::Disconnected,
            nodes,
            edges,
            node_map,
            edge_map,
            node_bridge,
            edge_bridge,
        }
    }

    /// Creates a session and, if configured to, connects it.
    pub fn open(config: SessionConfig, relay: &mut Relay) -> SyncResult<Self> {
        let connect = config.connect_on_start;
        let mut session = Self::new(config);
        if connect {
            session.connect(relay)?;
        }
        Ok(session)
    }

    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    // ── Consumer surface ─────────────────────────────────────────

    #[must_use]
    pub fn nodes(&self) -> &LocalCollection<NodeRecord> {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut LocalCollection<NodeRecord> {
        &mut self.nodes
    }

    #[must_use]
    pub fn edges(&self) -> &LocalCollection<EdgeRecord> {
        &self.edges
    }

    pub fn edges_mut(&mut self) -> &mut LocalCollection<EdgeRecord> {
        &mut self.edges
    }

    /// Releases a node from its current owner and edits it.
    pub fn edit_node(
        &mut self,
        id: &RecordId,
        edit: impl FnOnce(&mut NodeRecord),
    ) -> SyncResult<Upsert> {
        self.nodes.edit(id, edit)
    }

    /// Releases an edge from its current owner and edits it.
    pub fn edit_edge(
        &mut self,
        id: &RecordId,
        edit: impl FnOnce(&mut EdgeRecord),
    ) -> SyncResult<Upsert> {
        self.edges.edit(id, edit)
    }

    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.nodes.iter().cloned(), self.edges.iter().cloned())
    }

    // ── Replicated side (read-only) ──────────────────────────────

    #[must_use]
    pub fn node_map(&self) -> &MapAdapter<NodeRecord> {
        &self.node_map
    }

    #[must_use]
    pub fn edge_map(&self) -> &MapAdapter<EdgeRecord> {
        &self.edge_map
    }

    #[must_use]
    pub fn state_vectors(&self) -> StateVectors {
        StateVectors {
            nodes: self.node_map.state_vector().clone(),
            edges: self.edge_map.state_vector().clone(),
        }
    }

    // ── Sync ─────────────────────────────────────────────────────

    /// Runs both bridges until neither has queued changes.
    pub fn pump(&mut self) -> SyncResult<PumpReport> {
        let mut report = self.node_bridge.pump(&mut self.nodes, &mut self.node_map)?;
        report += self.edge_bridge.pump(&mut self.edges, &mut self.edge_map)?;
        Ok(report)
    }

    /// One sync round: pump local changes into the maps, then, while
    /// connected, exchange updates with the relay until nothing moves.
    ///
    /// While disconnected, writes stay in the local maps and are picked up by
    /// the state-vector exchange of the next [`connect`](Self::connect).
    pub fn sync(&mut self, relay: &mut Relay) -> SyncResult<PumpReport> {
        let mut report = self.pump()?;
        if !self.is_connected() {
            let held = self.node_map.take_outgoing().len() + self.edge_map.take_outgoing().len();
            if held > 0 {
                debug!("offline: {held} write(s) held for catch-up");
            }
            return Ok(report);
        }

        match self.exchange(relay) {
            Ok(exchanged) => {
                report += exchanged;
                Ok(report)
            }
            Err(err @ SyncError::NotConnected(_)) => {
                // Dropped by the relay; the next connect catches up.
                self.status = ConnectionStatus::Disconnected;
                warn!("{} {}: {err}", self.config.device_name, self.status);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Publishes and applies updates until the relay has nothing either way.
    fn exchange(&mut self, relay: &mut Relay) -> SyncResult<PumpReport> {
        let mut report = PumpReport::default();
        loop {
            let published = self.publish_outgoing(relay)?;
            let incoming = relay.drain_inbox(&self.config.room, self.replica)?;
            if published == 0 && incoming.is_empty() {
                return Ok(report);
            }
            for update in &incoming {
                self.apply_incoming(update)?;
            }
            report += self.pump()?;
        }
    }

    /// Joins the configured room and reconciles with it: receives what this
    /// replica missed, then pushes what the room is missing.
    ///
    /// The session only counts as connected once that exchange has gone
    /// through. If it fails the session leaves the room again, so the next
    /// call starts the exchange over.
    pub fn connect(&mut self, relay: &mut Relay) -> SyncResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.pump()?;

        let response = relay.join(&self.config.room, self.replica, &self.state_vectors());
        if let Err(err) = self.catch_up(relay, &response) {
            relay.leave(&self.config.room, self.replica);
            warn!("{} could not catch up: {err}", self.config.device_name);
            return Err(err);
        }
        self.status = ConnectionStatus::Connected;
        info!("{} {}", self.config.device_name, self.status);

        self.sync(relay)?;
        Ok(())
    }

    /// Stops disseminating. Local editing keeps working.
    pub fn disconnect(&mut self, relay: &mut Relay) {
        if !self.is_connected() {
            return;
        }
        relay.leave(&self.config.room, self.replica);
        self.status = ConnectionStatus::Disconnected;
        info!("{} {}", self.config.device_name, self.status);
    }

    /// Ends the session: flushes pending changes, leaves the room and detaches
    /// the replicated maps. Returns the final local graph.
    pub fn close(mut self, relay: &mut Relay) -> SyncResult<GraphSnapshot> {
        let flushed = self.sync(relay);
        self.disconnect(relay);
        self.node_map.detach();
        self.edge_map.detach();
        info!("session for {} closed", self.config.device_name);
        flushed?;
        Ok(self.snapshot())
    }

    fn catch_up(&mut self, relay: &mut Relay, response: &JoinResponse) -> SyncResult<()> {
        // The outbox is a subset of what the room is missing.
        self.node_map.take_outgoing();
        self.edge_map.take_outgoing();

        for update in &response.missing {
            self.apply_incoming(update)?;
        }
        for kind in [EntityKind::Node, EntityKind::Edge] {
            let seen = response.room_state.get(kind);
            let updates = match kind {
                EntityKind::Node => self.node_map.updates_since(seen),
                EntityKind::Edge => self.edge_map.updates_since(seen),
            };
            relay.publish(&self.config.room, self.replica, DocUpdate { kind, updates })?;
        }
        Ok(())
    }

    fn publish_outgoing(&mut self, relay: &mut Relay) -> SyncResult<usize> {
        let batches = [
            DocUpdate {
                kind: EntityKind::Node,
                updates: self.node_map.take_outgoing(),
            },
            DocUpdate {
                kind: EntityKind::Edge,
                updates: self.edge_map.take_outgoing(),
            },
        ];
        let mut published = 0;
        for batch in batches {
            if !batch.is_empty() {
                published += batch.updates.len();
                relay.publish(&self.config.room, self.replica, batch)?;
            }
        }
        Ok(published)
    }

    fn apply_incoming(&mut self, update: &DocUpdate) -> SyncResult<()> {
        match update.kind {
            EntityKind::Node => self.node_map.apply_remote(&update.updates)?,
            EntityKind::Edge => self.edge_map.apply_remote(&update.updates)?,
        };
        Ok(())
    }
}

/// Sessions hand out their identity like any other provider.
impl IdentityProvider for Session {
    fn identity(&self) -> ReplicaId {
        self.replica
    }
}
