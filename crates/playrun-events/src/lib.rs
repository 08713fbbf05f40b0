//! playrun-events: first/last event timestamps
//!
//! Objects that own events expose them through the [`EventCapable`] and
//! [`EventTimeline`] traits; storage is behind [`EventStore`], with an
//! in-memory implementation in [`fakes`] for tests.

pub mod error;
pub mod event;
pub mod fakes;
pub mod store;
pub mod timeline;

pub use error::{EventError, EventResult};
pub use event::{EventFilter, EventRecord, EventStream};
pub use store::EventStore;
pub use timeline::{DbId, EventCapable, EventStreamSource, EventTarget, EventTimeline, TargetKind};
