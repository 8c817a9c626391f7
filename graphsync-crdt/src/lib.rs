//! CRDTs backing the graphsync shared document.
//!
//! - [`LWWRegister<T>`]: Last-Writer-Wins register for a single value
//! - [`VectorClock`]: per-replica sequence tracking (the document's state vector)
//! - [`LwwMap<V>`]: string-keyed map of LWW registers with tombstones, the
//!   replicated map each entity kind lives in
//!
//! Merges are commutative, associative and idempotent, so replicas converge
//! regardless of the order or number of times updates are delivered.

mod lww_map;
mod lww_register;
mod vector_clock;

pub use lww_map::{LwwMap, MapUpdate};
pub use lww_register::LWWRegister;
pub use vector_clock::{CausalOrder, VectorClock};
