//! Event timeline capability
//!
//! Objects opt in to event queries by implementing [`EventCapable`] and
//! [`EventTimeline`]. Callers check `supports_events()` through the trait
//! instead of probing for methods at runtime; an object that reports no
//! support answers every query with "no events".

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::EventResult;
use crate::event::{EventFilter, EventStream};
use crate::store::EventStore;

/// Database id
pub type DbId = i64;

/// Capability flag for event queries
pub trait EventCapable {
    fn supports_events(&self) -> bool;
}

/// First/last event queries for an object that owns events
#[async_trait]
pub trait EventTimeline: EventCapable + Sync {
    /// Filter selecting this object's events
    fn event_where_clause(&self) -> EventFilter;

    async fn first_event(&self, store: &dyn EventStore) -> EventResult<Option<DateTime<Utc>>> {
        if !self.supports_events() {
            return Ok(None);
        }
        store.first_timestamp(&self.event_where_clause()).await
    }

    async fn last_event(&self, store: &dyn EventStore) -> EventResult<Option<DateTime<Utc>>> {
        if !self.supports_events() {
            return Ok(None);
        }
        store.last_timestamp(&self.event_where_clause()).await
    }

    /// `[first, last]`, or empty when there are no events
    async fn first_and_last_event(&self, store: &dyn EventStore) -> EventResult<Vec<DateTime<Utc>>> {
        let first = self.first_event(store).await?;
        let last = self.last_event(store).await?;
        Ok(match (first, last) {
            (Some(first), Some(last)) => vec![first, last],
            _ => Vec::new(),
        })
    }

    async fn has_events(&self, store: &dyn EventStore) -> EventResult<bool> {
        let found = self.first_event(store).await?.is_some();
        debug!("has_events: {}", found);
        Ok(found)
    }
}

/// Per-stream filters used to build an object's event stream view
pub trait EventStreamSource {
    fn event_target_id(&self) -> DbId;

    /// `EmsEvent` column holding this object's id
    fn ems_event_column(&self) -> &'static str;

    /// Base class name stored in `MiqEvent.target_type`
    fn base_class_name(&self) -> &'static str;

    fn event_stream_filters(&self) -> BTreeMap<EventStream, BTreeMap<String, Value>> {
        let id = Value::from(self.event_target_id());

        let ems = BTreeMap::from([(self.ems_event_column().to_string(), id.clone())]);
        let miq = BTreeMap::from([
            ("target_id".to_string(), id),
            (
                "target_type".to_string(),
                Value::from(self.base_class_name()),
            ),
        ]);

        BTreeMap::from([(EventStream::EmsEvent, ems), (EventStream::MiqEvent, miq)])
    }
}

/// Kinds of objects that own provider events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    EmsCluster,
    ExtManagementSystem,
    Host,
    VmOrTemplate,
    Vm,
}

impl TargetKind {
    pub fn ems_event_column(&self) -> &'static str {
        match self {
            TargetKind::EmsCluster => "ems_cluster_id",
            TargetKind::ExtManagementSystem => "ems_id",
            TargetKind::Host => "host_id",
            TargetKind::VmOrTemplate | TargetKind::Vm => "vm_or_template_id",
        }
    }

    /// VMs share the `VmOrTemplate` base class
    pub fn base_class_name(&self) -> &'static str {
        match self {
            TargetKind::EmsCluster => "EmsCluster",
            TargetKind::ExtManagementSystem => "ExtManagementSystem",
            TargetKind::Host => "Host",
            TargetKind::VmOrTemplate | TargetKind::Vm => "VmOrTemplate",
        }
    }
}

/// A concrete event-owning object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventTarget {
    pub kind: TargetKind,
    pub id: DbId,
}

impl EventTarget {
    pub fn new(kind: TargetKind, id: DbId) -> Self {
        EventTarget { kind, id }
    }
}

impl EventCapable for EventTarget {
    fn supports_events(&self) -> bool {
        true
    }
}

impl EventTimeline for EventTarget {
    fn event_where_clause(&self) -> EventFilter {
        EventFilter::new(EventStream::EmsEvent).where_eq(self.kind.ems_event_column(), self.id)
    }
}

impl EventStreamSource for EventTarget {
    fn event_target_id(&self) -> DbId {
        self.id
    }

    fn ems_event_column(&self) -> &'static str {
        self.kind.ems_event_column()
    }

    fn base_class_name(&self) -> &'static str {
        self.kind.base_class_name()
    }
}
