//! Sync bridge: origin-tagged forwarding between a local collection and a
//! replicated map.
//!
//! One generic bridge per entity kind. It listens to both change streams and
//! moves each change in exactly one direction:
//!
//! - local → map: only records this replica may publish, i.e. whose
//!   `originId` is unset or names this replica. The copy written to the map is
//!   tagged with this replica's identity.
//! - map → local: only records whose `originId` names some other replica.
//!   Records this replica tagged itself are already present locally; applying
//!   them again would feed the local stream and write them back out.
//!
//! Together these keep every logical edit from crossing the bridge twice. No
//! network-level deduplication is involved.

use crate::adapter::{KeysChanged, ReplicatedMap};
use crate::collection::{ChangeKind, LocalChange, LocalCollection, Upsert};
use crate::{SyncError, SyncResult};
use graphsync_types::{GraphRecord, RecordId, ReplicaId};
use std::marker::PhantomData;
use std::ops::AddAssign;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

/// Counters describing what a bridge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Local change batches handled.
    pub local_events: usize,
    /// Map change batches handled.
    pub remote_events: usize,
    /// Records written into the replicated map.
    pub forwarded: usize,
    /// Keys deleted from the replicated map.
    pub deleted: usize,
    /// Records not forwarded or not applied because of their origin tag.
    pub suppressed: usize,
    /// Records added or updated in the local collection.
    pub applied: usize,
    /// Records removed from the local collection.
    pub removed: usize,
}

impl PumpReport {
    /// True if the pump moved nothing in either direction.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.forwarded == 0 && self.deleted == 0 && self.applied == 0 && self.removed == 0
    }
}

impl AddAssign for PumpReport {
    fn add_assign(&mut self, other: Self) {
        self.local_events += other.local_events;
        self.remote_events += other.remote_events;
        self.forwarded += other.forwarded;
        self.deleted += other.deleted;
        self.suppressed += other.suppressed;
        self.applied += other.applied;
        self.removed += other.removed;
    }
}

/// Bidirectional forwarder for one entity kind.
#[derive(Debug)]
pub struct SyncBridge<R: GraphRecord> {
    replica: ReplicaId,
    local_changes: UnboundedReceiver<LocalChange>,
    remote_changes: UnboundedReceiver<KeysChanged>,
    _record: PhantomData<fn() -> R>,
}

impl<R: GraphRecord> SyncBridge<R> {
    /// Subscribes to both sides and returns the bridge.
    ///
    /// Changes made before attaching are not replayed.
    pub fn attach<M: ReplicatedMap<R>>(
        replica: ReplicaId,
        local: &mut LocalCollection<R>,
        map: &mut M,
    ) -> Self {
        Self {
            replica,
            local_changes: local.subscribe(),
            remote_changes: map.subscribe(),
            _record: PhantomData,
        }
    }

    /// Identity this bridge tags writes with.
    #[must_use]
    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Forwards one local change batch into the replicated map.
    ///
    /// The whole batch is checked before the first write: an unavailable map
    /// or a malformed record rejects the batch with nothing written.
    pub fn handle_local_change<M: ReplicatedMap<R>>(
        &self,
        change: &LocalChange,
        local: &LocalCollection<R>,
        map: &mut M,
    ) -> SyncResult<PumpReport> {
        debug!("{} local {:?} {:?}", R::KIND, change.kind, change.ids);
        let mut report = PumpReport::default();

        if !map.is_available() {
            warn!("dropping local {} change: replicated map unavailable", R::KIND);
            return Err(SyncError::AdapterUnavailable {
                kind: R::KIND,
                reason: format!("cannot forward {} local change(s)", change.ids.len()),
            });
        }

        if change.kind == ChangeKind::Removed {
            for id in &change.ids {
                let key = id.key();
                if map.has(&key) {
                    map.delete(&key)?;
                    report.deleted += 1;
                }
            }
            return Ok(report);
        }

        let mut outgoing = Vec::with_capacity(change.ids.len());
        for id in &change.ids {
            let Some(record) = local.get(id) else {
                debug!("{} {id} gone before its change was handled", R::KIND);
                continue;
            };
            if let Err(err) = record.validate() {
                warn!("refusing to forward {} {id}: {err}", R::KIND);
                return Err(err.into());
            }
            match record.origin() {
                Some(origin) if origin != self.replica => {
                    debug!("{} {id} belongs to {origin}, not forwarding", R::KIND);
                    report.suppressed += 1;
                }
                _ => outgoing.push(record.with_origin(Some(self.replica))),
            }
        }

        for record in &outgoing {
            map.set(&record.key(), record)?;
            report.forwarded += 1;
        }
        Ok(report)
    }

    /// Applies one batch of changed map keys to the local collection.
    ///
    /// Keys whose value does not decode are skipped; every other key in the
    /// batch is still applied, then the skipped keys are reported as one
    /// [`SyncError::MalformedRecord`].
    pub fn handle_remote_change<M: ReplicatedMap<R>>(
        &self,
        changed: &KeysChanged,
        local: &mut LocalCollection<R>,
        map: &M,
    ) -> SyncResult<PumpReport> {
        debug!("{} map changed {:?}", R::KIND, changed.keys);
        let mut report = PumpReport::default();
        let mut malformed = Vec::new();

        for key in &changed.keys {
            let record = if map.has(key) {
                match map.get(key) {
                    Ok(record) => record,
                    Err(err) => {
                        warn!("skipping {} {key} from the map: {err}", R::KIND);
                        malformed.push(key.as_str());
                        continue;
                    }
                }
            } else {
                None
            };

            match record {
                None => {
                    if local.remove(&RecordId::from_key(key)).is_some() {
                        report.removed += 1;
                    }
                }
                Some(record) if record.origin() == Some(self.replica) => {
                    report.suppressed += 1;
                }
                Some(record) => {
                    if local.upsert(record)? != Upsert::Unchanged {
                        report.applied += 1;
                    }
                }
            }
        }

        if malformed.is_empty() {
            Ok(report)
        } else {
            Err(SyncError::MalformedRecord {
                kind: R::KIND,
                reason: format!("undecodable value under key(s) {}", malformed.join(", ")),
            })
        }
    }

    /// Drains both change streams until neither has anything queued.
    ///
    /// Local changes are handled before map changes on every round. The first
    /// failing handler stops the pump and its error is returned. The failing
    /// batch is not retried; batches behind it stay queued for the next call.
    pub fn pump<M: ReplicatedMap<R>>(
        &mut self,
        local: &mut LocalCollection<R>,
        map: &mut M,
    ) -> SyncResult<PumpReport> {
        let mut report = PumpReport::default();
        loop {
            let mut progressed = false;

            while let Ok(change) = self.local_changes.try_recv() {
                report.local_events += 1;
                report += self.handle_local_change(&change, local, map)?;
                progressed = true;
            }

            while let Ok(changed) = self.remote_changes.try_recv() {
                report.remote_events += 1;
                report += self.handle_remote_change(&changed, local, map)?;
                progressed = true;
            }

            if !progressed {
                return Ok(report);
            }
        }
    }
}
