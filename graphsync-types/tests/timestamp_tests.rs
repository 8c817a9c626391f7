use graphsync_types::HybridTimestamp;

// ── Construction ─────────────────────────────────────────────────

#[test]
fn now_starts_at_logical_zero() {
    let ts = HybridTimestamp::now();
    assert_eq!(ts.logical(), 0);
    assert!(ts.wall_time() > 0);
}

#[test]
fn zero_orders_before_everything() {
    assert!(HybridTimestamp::zero() < HybridTimestamp::new(0, 1));
    assert!(HybridTimestamp::zero() < HybridTimestamp::now());
}

// ── Ordering ─────────────────────────────────────────────────────

#[test]
fn wall_time_dominates_logical() {
    assert!(HybridTimestamp::new(100, 50) < HybridTimestamp::new(101, 0));
}

#[test]
fn logical_breaks_wall_time_ties() {
    assert!(HybridTimestamp::new(100, 0) < HybridTimestamp::new(100, 1));
    assert_eq!(HybridTimestamp::new(100, 5), HybridTimestamp::new(100, 5));
}

// ── tick ─────────────────────────────────────────────────────────

#[test]
fn tick_is_strictly_monotonic() {
    let mut ts = HybridTimestamp::now();
    for _ in 0..1000 {
        let next = ts.tick();
        assert!(next > ts);
        ts = next;
    }
}

#[test]
fn tick_ahead_of_wall_clock_bumps_logical() {
    let ts = HybridTimestamp::new(u64::MAX / 2, 0);
    let ticked = ts.tick();
    assert_eq!(ticked.wall_time(), ts.wall_time());
    assert_eq!(ticked.logical(), 1);
}

#[test]
fn tick_behind_wall_clock_resets_logical() {
    let ticked = HybridTimestamp::new(1, 99).tick();
    assert!(ticked.wall_time() > 1);
    assert_eq!(ticked.logical(), 0);
}

// ── receive ──────────────────────────────────────────────────────

#[test]
fn receive_from_future_peer_jumps_forward() {
    let local = HybridTimestamp::new(1, 0);
    let remote = HybridTimestamp::new(u64::MAX / 2, 7);
    let merged = local.receive(&remote);
    assert_eq!(merged.wall_time(), u64::MAX / 2);
    assert_eq!(merged.logical(), 8);
}

#[test]
fn receive_same_future_wall_time_takes_max_logical() {
    let local = HybridTimestamp::new(u64::MAX / 2, 5);
    let remote = HybridTimestamp::new(u64::MAX / 2, 10);
    assert_eq!(local.receive(&remote).logical(), 11);
}

#[test]
fn receive_exceeds_both_inputs() {
    let local = HybridTimestamp::new(1000, 5);
    let remote = HybridTimestamp::new(1000, 10);
    let merged = local.receive(&remote);
    assert!(merged > local);
    assert!(merged > remote);
}
