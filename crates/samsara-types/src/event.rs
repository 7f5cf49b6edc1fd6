//! The immutable [`Event`] record.
//!
//! Events are the source of truth for the simulation's history. Every state
//! change produces an event; the scheduler persists each distinct event id
//! exactly once per tick. After creation an event is read-only -- the store
//! supports bulk deletion but never in-place mutation.
//!
//! Two independent boolean classifications drive downstream consumers:
//!
//! - `major` -- worth keeping in an actor's long-term memory.
//! - `story` -- narrative-only prose, excluded from memory indexing even
//!   when flagged major.
//!
//! "Memorable" (see [`Event::is_memorable`]) means `major && !story`; this
//! is the partition the event manager's major/minor queries use.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ActorId, EventId};

/// An immutable record of something that happened in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique event id.
    pub id: EventId,
    /// Tick at which the event occurred.
    pub tick: u64,
    /// Human-readable description of what happened.
    pub content: String,
    /// Actors referenced by this event (0..N).
    pub actors: BTreeSet<ActorId>,
    /// Long-term-memory-worthy flag.
    pub major: bool,
    /// Narrative-only flag; story events are excluded from memory indexing.
    pub story: bool,
    /// Wall-clock creation time, used as a tie-breaker.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Create a new minor, non-story event with no actor associations.
    pub fn new(tick: u64, content: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            tick,
            content: content.into(),
            actors: BTreeSet::new(),
            major: false,
            story: false,
            created_at: Utc::now(),
        }
    }

    /// Associate the event with the given actors.
    #[must_use]
    pub fn with_actors<I: IntoIterator<Item = ActorId>>(mut self, actors: I) -> Self {
        self.actors.extend(actors);
        self
    }

    /// Flag the event as major (long-term-memory-worthy).
    #[must_use]
    pub const fn major(mut self) -> Self {
        self.major = true;
        self
    }

    /// Flag the event as narrative-only story text.
    #[must_use]
    pub const fn story(mut self) -> Self {
        self.story = true;
        self
    }

    /// Whether this event belongs in long-term memory.
    ///
    /// Story events never qualify, regardless of the major flag.
    pub const fn is_memorable(&self) -> bool {
        self.major && !self.story
    }

    /// Whether the event references the given actor.
    pub fn mentions(&self, actor: ActorId) -> bool {
        self.actors.contains(&actor)
    }

    /// Whether the event references both actors of a pair.
    pub fn mentions_pair(&self, a: ActorId, b: ActorId) -> bool {
        self.actors.contains(&a) && self.actors.contains(&b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_is_minor_and_unassociated() {
        let event = Event::new(3, "a quiet month passes");
        assert_eq!(event.tick, 3);
        assert!(!event.major);
        assert!(!event.story);
        assert!(event.actors.is_empty());
        assert!(!event.is_memorable());
    }

    #[test]
    fn builders_compose() {
        let a = ActorId::new();
        let b = ActorId::new();
        let event = Event::new(1, "a duel in the market square")
            .with_actors([a, b])
            .major();

        assert!(event.mentions(a));
        assert!(event.mentions_pair(a, b));
        assert!(event.is_memorable());
    }

    #[test]
    fn story_events_are_never_memorable() {
        let event = Event::new(1, "the wind carried rumors").major().story();
        assert!(event.major);
        assert!(!event.is_memorable());
    }

    #[test]
    fn duplicate_actor_ids_collapse() {
        let a = ActorId::new();
        let event = Event::new(1, "soliloquy").with_actors([a, a]);
        assert_eq!(event.actors.len(), 1);
    }

    #[test]
    fn event_ids_are_unique() {
        let first = Event::new(1, "x");
        let second = Event::new(1, "x");
        assert_ne!(first.id, second.id);
    }
}
