//! Observable local collection.
//!
//! The in-memory table a consumer (typically a graph view) reads and writes.
//! Every mutation is published to subscribers as one [`LocalChange`] per
//! logical operation, after the mutation has been applied.

use crate::{SyncError, SyncResult};
use graphsync_types::{GraphRecord, RecordId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// What happened to the ids in a [`LocalChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}

/// A batch of ids affected by one logical operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChange {
    pub kind: ChangeKind,
    pub ids: Vec<RecordId>,
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Added,
    Updated,
    /// The stored record was already identical; no event is emitted.
    Unchanged,
}

/// Keyed, observable table of records of one entity kind.
///
/// Records are keyed by [`RecordId::key`], so `1` and `"1"` address the same
/// record.
#[derive(Debug)]
pub struct LocalCollection<R: GraphRecord> {
    records: HashMap<String, R>,
    subscribers: Vec<UnboundedSender<LocalChange>>,
}

impl<R: GraphRecord> Default for LocalCollection<R> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            subscribers: Vec::new(),
        }
    }
}

impl<R: GraphRecord> LocalCollection<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new change stream. Streams whose receiver has been dropped
    /// are pruned on the next notification.
    pub fn subscribe(&mut self) -> UnboundedReceiver<LocalChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<&R> {
        self.records.get(&id.key())
    }

    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(&id.key())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.records.values()
    }

    /// Inserts the record if its id is new, otherwise overwrites it.
    pub fn upsert(&mut self, record: R) -> SyncResult<Upsert> {
        record.validate()?;
        let id = record.id().clone();
        let outcome = self.store(record);
        match outcome {
            Upsert::Added => self.notify(ChangeKind::Added, vec![id]),
            Upsert::Updated => self.notify(ChangeKind::Updated, vec![id]),
            Upsert::Unchanged => {}
        }
        Ok(outcome)
    }

    /// Upserts a batch as one logical operation: at most one `Added` and one
    /// `Updated` event. If any record is malformed nothing is stored.
    pub fn upsert_many(&mut self, records: impl IntoIterator<Item = R>) -> SyncResult<()> {
        let records: Vec<R> = records.into_iter().collect();
        for record in &records {
            record.validate()?;
        }

        let (mut added, mut updated) = (Vec::new(), Vec::new());
        for record in records {
            let id = record.id().clone();
            match self.store(record) {
                Upsert::Added => added.push(id),
                Upsert::Updated => updated.push(id),
                Upsert::Unchanged => {}
            }
        }
        self.notify(ChangeKind::Added, added);
        self.notify(ChangeKind::Updated, updated);
        Ok(())
    }

    /// Removes a record. Removing an absent id is a no-op and emits nothing.
    pub fn remove(&mut self, id: &RecordId) -> Option<R> {
        let removed = self.records.remove(&id.key())?;
        self.notify(ChangeKind::Removed, vec![removed.id().clone()]);
        Some(removed)
    }

    /// Removes several records as one logical operation.
    pub fn remove_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a RecordId>) -> Vec<R> {
        let removed: Vec<R> = ids
            .into_iter()
            .filter_map(|id| self.records.remove(&id.key()))
            .collect();
        self.notify(
            ChangeKind::Removed,
            removed.iter().map(|r| r.id().clone()).collect(),
        );
        removed
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        let ids = self.records.values().map(|r| r.id().clone()).collect();
        self.records.clear();
        self.notify(ChangeKind::Removed, ids);
    }

    /// Edits a record that may be owned by another replica.
    ///
    /// Clears the origin tag before applying `edit`, releasing the record so
    /// this replica's bridge will forward the result. There is no lock: if
    /// another replica releases and edits the same record concurrently, the
    /// replicated map's last-writer-wins rule picks the survivor.
    pub fn edit(&mut self, id: &RecordId, edit: impl FnOnce(&mut R)) -> SyncResult<Upsert> {
        let mut record = self
            .get(id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownRecord {
                kind: R::KIND,
                id: id.key(),
            })?;
        record.set_origin(None);
        edit(&mut record);
        if record.id().key() != id.key() {
            return Err(SyncError::MalformedRecord {
                kind: R::KIND,
                reason: format!("edit changed id {id} to {}", record.id()),
            });
        }
        self.upsert(record)
    }

    fn store(&mut self, record: R) -> Upsert {
        match self.records.entry(record.key()) {
            Entry::Occupied(slot) if *slot.get() == record => Upsert::Unchanged,
            Entry::Occupied(mut slot) => {
                slot.insert(record);
                Upsert::Updated
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
                Upsert::Added
            }
        }
    }

    fn notify(&mut self, kind: ChangeKind, ids: Vec<RecordId>) {
        if ids.is_empty() {
            return;
        }
        debug!("local {} change {:?}: {} id(s)", R::KIND, kind, ids.len());
        let change = LocalChange { kind, ids };
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}
