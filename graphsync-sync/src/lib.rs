//! Origin-tagged sync between local graph collections and a shared document.
//!
//! Each replica keeps its nodes and edges in observable [`LocalCollection`]s
//! that a consumer (a renderer, an editor) reads and mutates directly. The
//! shared document holds one replicated map per entity kind. A
//! [`SyncBridge`] per kind forwards changes between the two, tagging what it
//! writes with the replica's identity so that no edit is ever echoed back to
//! where it came from.
//!
//! ## Components
//!
//! - **Collection**: the consumer-facing store with a change stream
//! - **Adapter**: typed view over the CRDT map, plus its change stream
//! - **Bridge**: the forwarding rules between the two
//! - **Relay**: in-memory room server that disseminates map updates
//! - **Session**: one replica's identity, collections, maps and bridges
//!
//! # Example
//!
//! ```
//! use graphsync_sync::{Relay, Session, SessionConfig};
//! use graphsync_types::NodeRecord;
//!
//! let mut relay = Relay::new();
//! let mut alice = Session::open(SessionConfig::default(), &mut relay).unwrap();
//! let mut bob = Session::open(SessionConfig::default(), &mut relay).unwrap();
//!
//! alice.nodes_mut().upsert(NodeRecord::new(1, "A")).unwrap();
//! alice.sync(&mut relay).unwrap();
//! bob.sync(&mut relay).unwrap();
//!
//! assert_eq!(bob.nodes().len(), 1);
//! ```

mod adapter;
mod bridge;
mod collection;
mod error;
mod identity;
mod relay;
mod session;
mod snapshot;

pub use adapter::{KeysChanged, MapAdapter, ReplicatedMap};
pub use bridge::{PumpReport, SyncBridge};
pub use collection::{ChangeKind, LocalChange, LocalCollection, Upsert};
pub use error::{SyncError, SyncResult};
pub use identity::IdentityProvider;
pub use relay::{DocUpdate, JoinResponse, MAX_INBOX, Relay, StateVectors};
pub use session::{ConnectionStatus, Session, SessionConfig};
pub use snapshot::GraphSnapshot;
