//! Property-based convergence checks across sessions.
//!
//! Any interleaving of fresh writes, edits, removals, syncs and connection
//! toggles on three replicas ends, once everyone reconnects and syncs, with
//! identical graphs everywhere.

use graphsync_sync::{Relay, Session, SessionConfig};
use graphsync_types::{EdgeRecord, NodeRecord, RecordId};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Upsert(usize, u8, u8),
    Edit(usize, u8, u8),
    Remove(usize, u8),
    Link(usize, u8, u8),
    Sync(usize),
    Disconnect(usize),
    Reconnect(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let replica = 0usize..3;
    let key = 0u8..5;
    prop_oneof![
        3 => (replica.clone(), key.clone(), any::<u8>()).prop_map(|(r, k, l)| Op::Upsert(r, k, l)),
        2 => (replica.clone(), key.clone(), any::<u8>()).prop_map(|(r, k, l)| Op::Edit(r, k, l)),
        1 => (replica.clone(), key.clone()).prop_map(|(r, k)| Op::Remove(r, k)),
        1 => (replica.clone(), key.clone(), key).prop_map(|(r, a, b)| Op::Link(r, a, b)),
        3 => replica.clone().prop_map(Op::Sync),
        1 => replica.clone().prop_map(Op::Disconnect),
        1 => replica.prop_map(Op::Reconnect),
    ]
}

fn apply(op: &Op, sessions: &mut [Session], relay: &mut Relay) {
    match *op {
        Op::Upsert(r, key, label) => {
            sessions[r]
                .nodes_mut()
                .upsert(NodeRecord::new(i64::from(key), format!("v{label}")))
                .unwrap();
        }
        Op::Edit(r, key, label) => {
            // Editing something this replica does not hold is a no-op here.
            let _ = sessions[r].edit_node(&RecordId::from(i64::from(key)), |n| {
                n.label = Some(format!("e{label}"));
            });
        }
        Op::Remove(r, key) => {
            sessions[r].nodes_mut().remove(&RecordId::from(i64::from(key)));
        }
        Op::Link(r, from, to) => {
            let edge = EdgeRecord::new(format!("{from}-{to}"), i64::from(from), i64::from(to));
            sessions[r].edges_mut().upsert(edge).unwrap();
        }
        Op::Sync(r) => {
            sessions[r].sync(relay).unwrap();
        }
        Op::Disconnect(r) => sessions[r].disconnect(relay),
        Op::Reconnect(r) => sessions[r].connect(relay).unwrap(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn replicas_converge(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut relay = Relay::new();
        let mut sessions: Vec<Session> = (0..3)
            .map(|_| Session::open(SessionConfig::default(), &mut relay).unwrap())
            .collect();

        for op in &ops {
            apply(op, &mut sessions, &mut relay);
        }

        for session in &mut sessions {
            session.connect(&mut relay).unwrap();
        }
        for _ in 0..4 {
            for session in &mut sessions {
                session.sync(&mut relay).unwrap();
            }
        }

        let graphs: Vec<_> = sessions
            .iter()
            .map(|s| s.snapshot().without_origins())
            .collect();
        prop_assert_eq!(&graphs[0], &graphs[1]);
        prop_assert_eq!(&graphs[1], &graphs[2]);
    }
}
