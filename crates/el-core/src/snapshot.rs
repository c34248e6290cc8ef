//! Snapshots, events, and the entities that group them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::ValueError;
use crate::path::Path;
use crate::value::{Object, Value};

/// One timestamped capture of game state. The state is always an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    timestamp: f64,
    state: Value,
}

impl Snapshot {
    /// Build a snapshot; fails with `TypeMismatch` unless `state` is an object.
    pub fn new(timestamp: f64, state: Value) -> Result<Self, ValueError> {
        state.as_object()?;
        Ok(Self { timestamp, state })
    }

    pub fn from_object(timestamp: f64, state: Object) -> Self {
        Self {
            timestamp,
            state: Value::Object(state),
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.state.get_path(path)
    }

    pub fn number_at(&self, path: &Path) -> Option<f64> {
        self.state.number_at(path)
    }
}

/// A game event (damage taken, enemy spawned, ...) recorded next to snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    kind: String,
    timestamp: f64,
    data: Value,
}

impl Event {
    /// Build an event; fails with `TypeMismatch` unless `data` is an object.
    pub fn new(kind: impl Into<String>, timestamp: f64, data: Value) -> Result<Self, ValueError> {
        data.as_object()?;
        Ok(Self {
            kind: kind.into(),
            timestamp,
            data,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Field of the event payload by key.
    pub fn field(&self, key: &str) -> Option<&Value> {
        match &self.data {
            Value::Object(obj) => obj.get(key),
            _ => None,
        }
    }
}

/// Granularity of a comparable log unit.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityLevel {
    Snapshot,
    Session,
    Export,
}

/// A log unit that an external resolver can turn into snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub level: EntityLevel,
}

impl Entity {
    pub fn new(id: impl Into<String>, level: EntityLevel) -> Self {
        Self {
            id: id.into(),
            level,
        }
    }

    pub fn snapshot(id: impl Into<String>) -> Self {
        Self::new(id, EntityLevel::Snapshot)
    }

    pub fn session(id: impl Into<String>) -> Self {
        Self::new(id, EntityLevel::Session)
    }

    pub fn export(id: impl Into<String>) -> Self {
        Self::new(id, EntityLevel::Export)
    }
}

impl core::fmt::Display for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.level, self.id)
    }
}

/// Time-ordered snapshots and events belonging to one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionData {
    snapshots: Vec<Snapshot>,
    events: Vec<Event>,
}

impl SessionData {
    /// Sorts both sequences by timestamp; equal timestamps keep input order.
    pub fn new(mut snapshots: Vec<Snapshot>, mut events: Vec<Event>) -> Self {
        snapshots.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self { snapshots, events }
    }

    pub fn from_snapshots(snapshots: Vec<Snapshot>) -> Self {
        Self::new(snapshots, Vec::new())
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
