use graphsync_crdt::{CausalOrder, VectorClock};
use graphsync_types::ReplicaId;

#[test]
fn empty_clock() {
    let clock = VectorClock::new();
    assert!(clock.is_empty());
    assert_eq!(clock.get(&ReplicaId::new()), 0);
}

#[test]
fn increment_returns_new_sequence() {
    let r = ReplicaId::new();
    let mut clock = VectorClock::new();
    assert_eq!(clock.increment(r), 1);
    assert_eq!(clock.increment(r), 2);
    assert_eq!(clock.get(&r), 2);
    assert_eq!(clock.len(), 1);
}

#[test]
fn update_never_goes_backwards() {
    let r = ReplicaId::new();
    let mut clock = VectorClock::new();
    clock.update(r, 5);
    clock.update(r, 3);
    assert_eq!(clock.get(&r), 5);
}

#[test]
fn merge_is_pointwise_max() {
    let (r1, r2) = (ReplicaId::new(), ReplicaId::new());
    let mut a = VectorClock::new();
    a.update(r1, 3);
    a.update(r2, 1);
    let mut b = VectorClock::new();
    b.update(r1, 1);
    b.update(r2, 4);

    a.merge(&b);
    assert_eq!(a.get(&r1), 3);
    assert_eq!(a.get(&r2), 4);
}

// ── compare ──────────────────────────────────────────────────────

#[test]
fn compare_detects_before_and_after() {
    let r = ReplicaId::new();
    let mut a = VectorClock::new();
    a.increment(r);
    let mut b = a.clone();
    b.increment(r);

    assert_eq!(a.compare(&b), CausalOrder::Before);
    assert_eq!(b.compare(&a), CausalOrder::After);
    assert!(b.dominates(&a));
    assert!(!a.dominates(&b));
}

#[test]
fn compare_detects_concurrency() {
    let (r1, r2) = (ReplicaId::new(), ReplicaId::new());
    let mut a = VectorClock::new();
    a.increment(r1);
    let mut b = VectorClock::new();
    b.increment(r2);

    assert_eq!(a.compare(&b), CausalOrder::Concurrent);
    assert!(!a.dominates(&b));
}

#[test]
fn missing_entries_count_as_zero() {
    let r = ReplicaId::new();
    let mut a = VectorClock::new();
    a.update(r, 0);
    assert_eq!(a, VectorClock::new());
    assert_eq!(a.compare(&VectorClock::new()), CausalOrder::Equal);
}
