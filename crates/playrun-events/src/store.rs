//! Event store abstraction
//!
//! Only the two aggregate queries the timeline needs are part of the
//! contract; backends are free to answer them with `MIN`/`MAX` or an index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::EventResult;
use crate::event::{EventFilter, EventRecord};

/// Backend-agnostic event storage
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist one event
    async fn record(&self, event: EventRecord) -> EventResult<()>;

    /// Earliest timestamp among events matching `filter`
    async fn first_timestamp(&self, filter: &EventFilter) -> EventResult<Option<DateTime<Utc>>>;

    /// Latest timestamp among events matching `filter`
    async fn last_timestamp(&self, filter: &EventFilter) -> EventResult<Option<DateTime<Utc>>>;
}
