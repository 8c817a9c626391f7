//! Typed graph records.
//!
//! Nodes and edges are the two entity kinds of the shared graph. Each record
//! carries an `originId` tag naming the replica that last wrote it into the
//! replicated map; the sync bridge uses that tag to decide which direction a
//! change is allowed to flow in.

use crate::{Error, RecordId, ReplicaId, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The two kinds of replicated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Edge,
}

impl EntityKind {
    /// Name of the shared map holding this kind inside a document.
    #[must_use]
    pub const fn map_name(self) -> &'static str {
        match self {
            Self::Node => "nodes",
            Self::Edge => "edges",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => f.write_str("node"),
            Self::Edge => f.write_str("edge"),
        }
    }
}

/// Behaviour shared by every record kind that can pass through a sync bridge.
pub trait GraphRecord: Clone + PartialEq + fmt::Debug + Serialize + DeserializeOwned {
    /// Entity kind of this record type.
    const KIND: EntityKind;

    fn id(&self) -> &RecordId;

    /// Replica that last wrote this record, if known.
    fn origin(&self) -> Option<ReplicaId>;

    fn set_origin(&mut self, origin: Option<ReplicaId>);

    /// Kind-specific structural checks beyond the id.
    fn validate_fields(&self) -> Result<()> {
        Ok(())
    }

    /// Rejects records that cannot be keyed or are otherwise malformed.
    fn validate(&self) -> Result<()> {
        if self.id().is_blank() {
            return Err(malformed(Self::KIND, "id is empty"));
        }
        self.validate_fields()
    }

    /// Replicated map key of this record.
    fn key(&self) -> String {
        self.id().key()
    }

    /// Returns a copy tagged with the given origin.
    #[must_use]
    fn with_origin(&self, origin: Option<ReplicaId>) -> Self {
        let mut tagged = self.clone();
        tagged.set_origin(origin);
        tagged
    }

    /// Validates and encodes the record for storage in a replicated map.
    fn to_value(&self) -> Result<Value> {
        self.validate()?;
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes and validates a record read from a replicated map.
    fn from_value(value: Value) -> Result<Self> {
        let record: Self =
            serde_json::from_value(value).map_err(|e| malformed(Self::KIND, e.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}

fn malformed(kind: EntityKind, reason: impl Into<String>) -> Error {
    Error::MalformedRecord {
        kind,
        reason: reason.into(),
    }
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "originId", default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<ReplicaId>,
    /// Any other named fields (position, color, ...), carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeRecord {
    #[must_use]
    pub fn new(id: impl Into<RecordId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: Some(label.into()),
            origin_id: None,
            extra: Map::new(),
        }
    }

    /// Adds an extra named field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

impl GraphRecord for NodeRecord {
    const KIND: EntityKind = EntityKind::Node;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn origin(&self) -> Option<ReplicaId> {
        self.origin_id
    }

    fn set_origin(&mut self, origin: Option<ReplicaId>) {
        self.origin_id = origin;
    }
}

/// A directed edge between two nodes.
///
/// `from` and `to` name node ids, but nothing here checks that those nodes
/// exist; dangling edges are the consumer's problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: RecordId,
    pub from: RecordId,
    pub to: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "originId", default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<ReplicaId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EdgeRecord {
    #[must_use]
    pub fn new(id: impl Into<RecordId>, from: impl Into<RecordId>, to: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            label: None,
            origin_id: None,
            extra: Map::new(),
        }
    }

    /// Creates an edge with a generated id, the way a graph view assigns ids
    /// to edges drawn by the user.
    #[must_use]
    pub fn connecting(from: impl Into<RecordId>, to: impl Into<RecordId>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), from, to)
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// True if the edge starts and ends at the same node.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.from.key() == self.to.key()
    }
}

impl GraphRecord for EdgeRecord {
    const KIND: EntityKind = EntityKind::Edge;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn origin(&self) -> Option<ReplicaId> {
        self.origin_id
    }

    fn set_origin(&mut self, origin: Option<ReplicaId>) {
        self.origin_id = origin;
    }

    fn validate_fields(&self) -> Result<()> {
        if self.from.is_blank() {
            return Err(malformed(Self::KIND, "`from` is empty"));
        }
        if self.to.is_blank() {
            return Err(malformed(Self::KIND, "`to` is empty"));
        }
        Ok(())
    }
}
