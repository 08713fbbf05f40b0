//! In-memory event store (testing only)

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EventResult;
use crate::event::{EventFilter, EventRecord};
use crate::store::EventStore;

/// Event store backed by a `Vec<EventRecord>`
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<EventRecord>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matching_timestamps(&self, filter: &EventFilter) -> Vec<DateTime<Utc>> {
        let events = self.events.lock().unwrap();
        events
            .iter()
            .filter(|e| filter.matches(e))
            .map(|e| e.timestamp)
            .collect()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn record(&self, event: EventRecord) -> EventResult<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn first_timestamp(&self, filter: &EventFilter) -> EventResult<Option<DateTime<Utc>>> {
        Ok(self.matching_timestamps(filter).into_iter().min())
    }

    async fn last_timestamp(&self, filter: &EventFilter) -> EventResult<Option<DateTime<Utc>>> {
        Ok(self.matching_timestamps(filter).into_iter().max())
    }
}
