//! Hybrid Logical Clock timestamps.
//!
//! Every write into a replicated map is stamped with one of these. Ordering is
//! wall time first, then the logical counter, so writes made within the same
//! millisecond on one replica still order deterministically.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

/// Physical clock reading in milliseconds. A clock set before 1970 reads as 0
/// and the logical counter carries ordering from there.
fn physical_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// A Hybrid Logical Clock timestamp (Kulkarni et al.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HybridTimestamp {
    /// Milliseconds since the Unix epoch.
    wall_time: u64,
    /// Counter for writes at the same wall time.
    logical: u32,
}

impl HybridTimestamp {
    #[must_use]
    pub fn now() -> Self {
        Self::new(physical_millis(), 0)
    }

    /// The smallest timestamp; every real write orders after it.
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    #[must_use]
    pub const fn new(wall_time: u64, logical: u32) -> Self {
        Self { wall_time, logical }
    }

    #[must_use]
    pub const fn wall_time(&self) -> u64 {
        self.wall_time
    }

    #[must_use]
    pub const fn logical(&self) -> u32 {
        self.logical
    }

    /// Next timestamp for a local write. Always strictly greater than `self`,
    /// even if the system clock has not moved or has gone backwards.
    #[must_use]
    pub fn tick(&self) -> Self {
        self.receive(self)
    }

    /// Advances this clock past a timestamp observed from another replica.
    ///
    /// The result is greater than both `self` and `observed`.
    #[must_use]
    pub fn receive(&self, observed: &Self) -> Self {
        let wall_time = physical_millis()
            .max(self.wall_time)
            .max(observed.wall_time);

        let logical = [self, observed]
            .into_iter()
            .filter(|ts| ts.wall_time == wall_time)
            .map(|ts| ts.logical.saturating_add(1))
            .max()
            .unwrap_or(0);

        Self { wall_time, logical }
    }
}

impl PartialOrd for HybridTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HybridTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.wall_time, self.logical).cmp(&(other.wall_time, other.logical))
    }
}
