//! Query types shared by the event store backends.

use samsara_types::{ActorId, Event, EventCursor};

/// Which slice of the log a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// The whole log.
    All,
    /// Events referencing the given actor.
    Actor(ActorId),
    /// Events referencing both actors of the pair.
    Pair(ActorId, ActorId),
}

/// One page of a reverse-chronological scan.
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    /// Events, newest first.
    pub events: Vec<Event>,
    /// Cursor for the next page; `None` means the scan is exhausted.
    /// Strictly decreasing page over page.
    pub next: Option<EventCursor>,
}

impl EventPage {
    /// An empty, exhausted page.
    pub const fn empty() -> Self {
        Self {
            events: Vec::new(),
            next: None,
        }
    }
}
