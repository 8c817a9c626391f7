//! Scripted multi-replica scenario.
//!
//! Every replica is a full [`Session`] with its own identity, collections and
//! maps; they only ever talk through the shared [`Relay`]. The script mirrors
//! what a handful of people editing one graph view would do: one of them draws
//! a chain of nodes, another drags a node around, and optionally one works
//! offline for a while before rejoining.

use anyhow::{Context, Result, bail, ensure};
use graphsync_sync::{GraphSnapshot, Relay, Session, SessionConfig};
use graphsync_types::{EdgeRecord, NodeRecord, RecordId};
use serde::Serialize;
use tracing::{info, warn};

/// Sync rounds after which a scenario that has not gone quiet is reported as
/// stuck.
const MAX_ROUNDS: usize = 16;

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub replicas: usize,
    pub nodes: usize,
    /// Take the last replica offline for the middle of the script.
    pub offline: bool,
    pub config: SessionConfig,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            replicas: 3,
            nodes: 4,
            offline: true,
            config: SessionConfig::default(),
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub converged: bool,
    pub rounds: usize,
    pub dangling_edges: usize,
    /// The graph as every replica sees it, origin tags stripped.
    pub graph: GraphSnapshot,
}

/// Runs the scripted edits and returns the converged graph.
pub fn run(scenario: &Scenario) -> Result<Outcome> {
    ensure!(scenario.replicas >= 2, "need at least two replicas");
    ensure!(scenario.nodes >= 2, "need at least two nodes");

    let mut relay = Relay::new();
    let mut sessions = (0..scenario.replicas)
        .map(|n| {
            let config = SessionConfig {
                device_name: format!("replica-{n}"),
                ..scenario.config.clone()
            };
            Session::open(config, &mut relay)
                .with_context(|| format!("failed to open replica-{n}"))
        })
        .collect::<Result<Vec<_>>>()?;
    for session in &mut sessions {
        session.connect(&mut relay).context("failed to connect")?;
    }

    // replica-0 draws a chain 0 -> 1 -> ... -> n-1.
    let author = &mut sessions[0];
    author
        .nodes_mut()
        .upsert_many((0..scenario.nodes).map(|n| NodeRecord::new(n as i64, format!("node {n}"))))?;
    author
        .edges_mut()
        .upsert_many((1..scenario.nodes).map(|n| draw_edge((n - 1) as i64, n as i64)))?;
    settle(&mut relay, &mut sessions)?;

    // replica-1 drags node 0, taking it over.
    sessions[1].edit_node(&RecordId::from(0), |node| {
        node.extra.insert("x".to_string(), 120.into());
        node.extra.insert("y".to_string(), (-40).into());
    })?;
    settle(&mut relay, &mut sessions)?;

    if scenario.offline {
        let last = sessions.len() - 1;
        sessions[last].disconnect(&mut relay);

        let loner = &mut sessions[last];
        loner
            .nodes_mut()
            .upsert(NodeRecord::new("offline", "drawn offline"))?;
        loner
            .edges_mut()
            .upsert(draw_edge("offline", 0))?;
        loner.sync(&mut relay)?;

        let tail = RecordId::from((scenario.nodes - 1) as i64);
        sessions[0].nodes_mut().remove(&tail);
        settle(&mut relay, &mut sessions[..last])?;

        sessions[last]
            .connect(&mut relay)
            .context("failed to reconnect the offline replica")?;
    }
    let rounds = settle(&mut relay, &mut sessions)?;

    let graphs: Vec<GraphSnapshot> = sessions
        .iter()
        .map(|s| s.snapshot().without_origins())
        .collect();
    let converged = graphs.windows(2).all(|pair| pair[0] == pair[1]);
    if !converged {
        warn!("replicas disagree after {rounds} round(s)");
    }

    let mut graph = GraphSnapshot::default();
    for session in sessions {
        graph = session.close(&mut relay)?.without_origins();
    }
    let dangling_edges = graph.dangling_edges().len();
    info!(
        "{} node(s), {} edge(s), {dangling_edges} dangling",
        graph.nodes.len(),
        graph.edges.len()
    );

    Ok(Outcome {
        converged,
        rounds,
        dangling_edges,
        graph,
    })
}

/// Draws an edge between two nodes the way a graph view does, with a fresh id.
fn draw_edge(from: impl Into<RecordId>, to: impl Into<RecordId>) -> EdgeRecord {
    let edge = EdgeRecord::connecting(from, to);
    if edge.is_self_loop() {
        warn!("edge {} connects node {} to itself", edge.id, edge.from);
    }
    edge
}

/// Syncs every connected session until a full round moves nothing.
/// Returns the number of rounds it took.
fn settle(relay: &mut Relay, sessions: &mut [Session]) -> Result<usize> {
    for round in 1..=MAX_ROUNDS {
        let mut idle = true;
        for session in sessions.iter_mut() {
            if !session.sync(relay)?.is_idle() {
                idle = false;
            }
        }
        if idle {
            return Ok(round);
        }
    }
    bail!("replicas still exchanging updates after {MAX_ROUNDS} rounds")
}
