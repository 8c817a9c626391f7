use graphsync_sync::{ChangeKind, LocalChange, LocalCollection, SyncError, Upsert};
use graphsync_types::{EdgeRecord, GraphRecord, NodeRecord, RecordId, ReplicaId};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc::UnboundedReceiver;

fn drain(rx: &mut UnboundedReceiver<LocalChange>) -> Vec<LocalChange> {
    let mut out = Vec::new();
    while let Ok(change) = rx.try_recv() {
        out.push(change);
    }
    out
}

fn change(kind: ChangeKind, ids: &[i64]) -> LocalChange {
    LocalChange {
        kind,
        ids: ids.iter().map(|&id| RecordId::from(id)).collect(),
    }
}

// ── Upsert ───────────────────────────────────────────────────────

#[test]
fn upsert_adds_then_updates() {
    let mut nodes = LocalCollection::new();
    let mut rx = nodes.subscribe();

    assert_eq!(nodes.upsert(NodeRecord::new(1, "A")).unwrap(), Upsert::Added);
    assert_eq!(nodes.upsert(NodeRecord::new(1, "B")).unwrap(), Upsert::Updated);

    assert_eq!(
        drain(&mut rx),
        vec![change(ChangeKind::Added, &[1]), change(ChangeKind::Updated, &[1])]
    );
    assert_eq!(
        nodes.get(&RecordId::from(1)).and_then(|n| n.label.as_deref()),
        Some("B")
    );
}

#[test]
fn identical_upsert_emits_nothing() {
    let mut nodes = LocalCollection::new();
    nodes.upsert(NodeRecord::new(1, "A")).unwrap();
    let mut rx = nodes.subscribe();

    assert_eq!(nodes.upsert(NodeRecord::new(1, "A")).unwrap(), Upsert::Unchanged);
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn upsert_with_only_a_new_origin_is_an_update() {
    let mut nodes = LocalCollection::new();
    nodes.upsert(NodeRecord::new(1, "A")).unwrap();

    let tagged = NodeRecord::new(1, "A").with_origin(Some(ReplicaId::new()));
    assert_eq!(nodes.upsert(tagged).unwrap(), Upsert::Updated);
}

#[test]
fn numeric_and_string_ids_address_the_same_record() {
    let mut nodes = LocalCollection::new();
    nodes.upsert(NodeRecord::new(1, "A")).unwrap();

    assert!(nodes.contains(&RecordId::from("1")));
    assert_eq!(nodes.upsert(NodeRecord::new("1", "B")).unwrap(), Upsert::Updated);
    assert_eq!(nodes.len(), 1);
}

#[test]
fn blank_id_is_rejected() {
    let mut nodes = LocalCollection::new();
    let mut rx = nodes.subscribe();

    let err = nodes.upsert(NodeRecord::new("  ", "A")).unwrap_err();
    assert!(matches!(err, SyncError::MalformedRecord { .. }));
    assert!(nodes.is_empty());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn edge_without_target_is_rejected() {
    let mut edges = LocalCollection::new();
    let err = edges.upsert(EdgeRecord::new("e", 1, "")).unwrap_err();
    assert_eq!(err.to_string(), "malformed edge record: `to` is empty");
}

#[test]
fn upsert_many_emits_one_event_per_kind_of_change() {
    let mut nodes = LocalCollection::new();
    nodes.upsert(NodeRecord::new(1, "A")).unwrap();
    let mut rx = nodes.subscribe();

    nodes
        .upsert_many([
            NodeRecord::new(1, "A2"),
            NodeRecord::new(2, "B"),
            NodeRecord::new(3, "C"),
        ])
        .unwrap();

    assert_eq!(
        drain(&mut rx),
        vec![change(ChangeKind::Added, &[2, 3]), change(ChangeKind::Updated, &[1])]
    );
}

#[test]
fn upsert_many_stores_nothing_if_any_record_is_malformed() {
    let mut nodes = LocalCollection::new();
    let mut rx = nodes.subscribe();

    let result = nodes.upsert_many([NodeRecord::new(1, "A"), NodeRecord::new("", "bad")]);
    assert!(result.is_err());
    assert!(nodes.is_empty());
    assert!(drain(&mut rx).is_empty());
}

// ── Remove ───────────────────────────────────────────────────────

#[test]
fn remove_emits_removed() {
    let mut nodes = LocalCollection::new();
    nodes.upsert(NodeRecord::new(1, "A")).unwrap();
    let mut rx = nodes.subscribe();

    let removed = nodes.remove(&RecordId::from(1)).unwrap();
    assert_eq!(removed.label.as_deref(), Some("A"));
    assert_eq!(drain(&mut rx), vec![change(ChangeKind::Removed, &[1])]);
}

#[test]
fn removing_an_absent_id_emits_nothing() {
    let mut nodes: LocalCollection<NodeRecord> = LocalCollection::new();
    let mut rx = nodes.subscribe();

    assert!(nodes.remove(&RecordId::from(42)).is_none());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn remove_many_batches_present_ids() {
    let mut nodes = LocalCollection::new();
    nodes
        .upsert_many([NodeRecord::new(1, "A"), NodeRecord::new(2, "B")])
        .unwrap();
    let mut rx = nodes.subscribe();

    let ids = [RecordId::from(1), RecordId::from(2), RecordId::from(3)];
    let removed = nodes.remove_many(&ids);

    assert_eq!(removed.len(), 2);
    assert!(nodes.is_empty());
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, ChangeKind::Removed);
    assert_eq!(events[0].ids.len(), 2);
}

#[test]
fn clear_removes_everything_in_one_event() {
    let mut nodes = LocalCollection::new();
    nodes
        .upsert_many([NodeRecord::new(1, "A"), NodeRecord::new(2, "B")])
        .unwrap();
    let mut rx = nodes.subscribe();

    nodes.clear();
    assert!(nodes.is_empty());
    assert_eq!(drain(&mut rx).len(), 1);

    nodes.clear();
    assert!(drain(&mut rx).is_empty());
}

// ── Edit ─────────────────────────────────────────────────────────

#[test]
fn edit_releases_ownership() {
    let owner = ReplicaId::new();
    let mut nodes = LocalCollection::new();
    nodes
        .upsert(NodeRecord::new(1, "A").with_origin(Some(owner)))
        .unwrap();

    let outcome = nodes
        .edit(&RecordId::from(1), |n| n.label = Some("A'".to_string()))
        .unwrap();

    assert_eq!(outcome, Upsert::Updated);
    let node = nodes.get(&RecordId::from(1)).unwrap();
    assert_eq!(node.origin(), None);
    assert_eq!(node.label.as_deref(), Some("A'"));
}

#[test]
fn edit_of_unknown_record_fails() {
    let mut nodes: LocalCollection<NodeRecord> = LocalCollection::new();
    let err = nodes.edit(&RecordId::from(9), |_| {}).unwrap_err();
    assert!(matches!(err, SyncError::UnknownRecord { ref id, .. } if id == "9"));
}

#[test]
fn edit_may_not_change_the_id() {
    let mut nodes = LocalCollection::new();
    nodes.upsert(NodeRecord::new(1, "A")).unwrap();

    let err = nodes
        .edit(&RecordId::from(1), |n| n.id = RecordId::from(2))
        .unwrap_err();
    assert!(matches!(err, SyncError::MalformedRecord { .. }));
    assert!(nodes.contains(&RecordId::from(1)));
    assert!(!nodes.contains(&RecordId::from(2)));
}

// ── Subscribers ──────────────────────────────────────────────────

#[test]
fn dropped_subscribers_do_not_block_others() {
    let mut nodes = LocalCollection::new();
    let dropped = nodes.subscribe();
    let mut kept = nodes.subscribe();
    drop(dropped);

    nodes.upsert(NodeRecord::new(1, "A")).unwrap();
    assert_eq!(drain(&mut kept), vec![change(ChangeKind::Added, &[1])]);
}
