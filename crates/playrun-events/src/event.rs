//! Event records and filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::EventError;

/// Event table an event lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventStream {
    /// Provider events (one column per owning object kind)
    EmsEvent,
    /// Platform events (polymorphic `target_id` / `target_type`)
    MiqEvent,
}

impl EventStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStream::EmsEvent => "EmsEvent",
            EventStream::MiqEvent => "MiqEvent",
        }
    }
}

impl std::fmt::Display for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStream {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EmsEvent" => Ok(EventStream::EmsEvent),
            "MiqEvent" => Ok(EventStream::MiqEvent),
            other => Err(EventError::UnknownStream(other.to_string())),
        }
    }
}

/// A single stored event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub stream: EventStream,
    pub timestamp: DateTime<Utc>,
    /// Column values (`ems_id`, `host_id`, `target_type`, ...)
    pub fields: BTreeMap<String, Value>,
}

impl EventRecord {
    pub fn new(stream: EventStream, timestamp: DateTime<Utc>) -> Self {
        EventRecord {
            stream,
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }
}

/// `column = value AND ...` against one stream.
///
/// Like SQL, a `null` condition matches nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub stream: EventStream,
    pub conditions: BTreeMap<String, Value>,
}

impl EventFilter {
    pub fn new(stream: EventStream) -> Self {
        EventFilter {
            stream,
            conditions: BTreeMap::new(),
        }
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(column.into(), value.into());
        self
    }

    pub fn matches(&self, event: &EventRecord) -> bool {
        event.stream == self.stream
            && self.conditions.iter().all(|(column, expected)| {
                !expected.is_null() && event.fields.get(column) == Some(expected)
            })
    }
}
