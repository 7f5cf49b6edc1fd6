//! In-memory event log fallback.
//!
//! Backs tests and infrastructure-free runs with the same contract as the
//! `PostgreSQL` store, except that queries are explicitly non-paginated: a
//! single call returns up to `limit` events and never emits a
//! continuation cursor. An incoming cursor is still honored as an upper
//! bound, so a caller written against the durable store behaves the same
//! way here -- it just finishes in one call.
//!
//! Sequence allocation is serialized behind the mutex, so concurrent
//! appends never collide on `(tick, seq)`.

use std::collections::BTreeMap;

use tokio::sync::Mutex;

use samsara_types::{ActorId, Event, EventCursor, EventId};

use crate::error::StoreError;
use crate::query::{EventFilter, EventPage};

/// The in-memory event log.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    inner: Mutex<Inner>,
}

/// Log state behind the mutex.
#[derive(Debug, Default)]
struct Inner {
    /// Next insertion sequence number.
    next_seq: u64,
    /// Events keyed by their `(tick, seq)` position.
    by_position: BTreeMap<(u64, u64), Event>,
    /// Position of each event id, for idempotence checks.
    positions: BTreeMap<EventId, (u64, u64)>,
}

impl Inner {
    fn matches(event: &Event, filter: EventFilter) -> bool {
        match filter {
            EventFilter::All => true,
            EventFilter::Actor(actor) => event.mentions(actor),
            EventFilter::Pair(a, b) => event.mentions_pair(a, b),
        }
    }
}

impl MemoryEventStore {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Returns `true` if newly written, `false` when the
    /// id was already present (the stored content is kept).
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn append(&self, event: &Event) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.positions.contains_key(&event.id) {
            return Ok(false);
        }
        let seq = inner.next_seq;
        inner.next_seq = inner.next_seq.saturating_add(1);
        let position = (event.tick, seq);
        inner.positions.insert(event.id, position);
        inner.by_position.insert(position, event.clone());
        Ok(true)
    }

    /// Query events newest-first, strictly older than `cursor`.
    ///
    /// Non-paginated: the continuation cursor is always `None`.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn query(
        &self,
        filter: EventFilter,
        cursor: Option<EventCursor>,
        limit: u32,
    ) -> Result<EventPage, StoreError> {
        let inner = self.inner.lock().await;
        let bound = cursor.map(|c| (c.tick, c.seq));
        let events = inner
            .by_position
            .iter()
            .rev()
            .filter(|&(&position, _)| bound.is_none_or(|b| position < b))
            .filter(|(_, event)| Inner::matches(event, filter))
            .take(limit as usize)
            .map(|(_, event)| event.clone())
            .collect();
        Ok(EventPage { events, next: None })
    }

    /// Major events for one actor, oldest first.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn major_by_actor(
        &self,
        actor: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified(EventFilter::Actor(actor), true, limit).await
    }

    /// Minor events for one actor, oldest first.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn minor_by_actor(
        &self,
        actor: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified(EventFilter::Actor(actor), false, limit).await
    }

    /// Major events referencing both actors of a pair, oldest first.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn major_by_pair(
        &self,
        a: ActorId,
        b: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified(EventFilter::Pair(a, b), true, limit).await
    }

    /// Minor events referencing both actors of a pair, oldest first.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn minor_by_pair(
        &self,
        a: ActorId,
        b: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified(EventFilter::Pair(a, b), false, limit).await
    }

    async fn classified(
        &self,
        filter: EventFilter,
        major: bool,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.lock().await;
        let events = inner
            .by_position
            .values()
            .filter(|event| event.is_memorable() == major)
            .filter(|event| Inner::matches(event, filter))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(events)
    }

    /// Bulk-delete events, optionally preserving the major class and/or
    /// restricting to events older than `before_tick`. Returns the number
    /// of deleted events.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn cleanup(
        &self,
        keep_major: bool,
        before_tick: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let doomed: Vec<(u64, u64)> = inner
            .by_position
            .iter()
            .filter(|&(&(tick, _), ref event)| {
                let class_doomed = !(keep_major && event.is_memorable());
                let age_doomed = before_tick.is_none_or(|bound| tick < bound);
                class_doomed && age_doomed
            })
            .map(|(&position, _)| position)
            .collect();

        for position in &doomed {
            if let Some(event) = inner.by_position.remove(position) {
                inner.positions.remove(&event.id);
            }
        }
        Ok(doomed.len() as u64)
    }

    /// Number of events in the log.
    ///
    /// # Errors
    ///
    /// Infallible; the `Result` mirrors the durable store's signature.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.by_position.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_event(tick: u64, content: &str) -> Event {
        Event::new(tick, content)
    }

    #[tokio::test]
    async fn append_is_idempotent_and_keeps_first_content() {
        let store = MemoryEventStore::new();
        let original = make_event(1, "first write");
        let mut imposter = original.clone();
        imposter.content = String::from("second write");

        assert!(store.append(&original).await.unwrap());
        assert!(!store.append(&imposter).await.unwrap());

        let page = store.query(EventFilter::All, None, 10).await.unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].content, "first write");
    }

    #[tokio::test]
    async fn query_is_newest_first_and_never_paginates() {
        let store = MemoryEventStore::new();
        for tick in 0..5 {
            store.append(&make_event(tick, "e")).await.unwrap();
        }

        let page = store.query(EventFilter::All, None, 3).await.unwrap();
        assert_eq!(page.events.len(), 3);
        assert!(page.next.is_none());
        assert_eq!(page.events[0].tick, 4);
        assert_eq!(page.events[2].tick, 2);
    }

    #[tokio::test]
    async fn same_tick_events_keep_insertion_order() {
        let store = MemoryEventStore::new();
        let first = make_event(7, "first");
        let second = make_event(7, "second");
        store.append(&first).await.unwrap();
        store.append(&second).await.unwrap();

        let page = store.query(EventFilter::All, None, 10).await.unwrap();
        assert_eq!(page.events[0].content, "second");
        assert_eq!(page.events[1].content, "first");
    }

    #[tokio::test]
    async fn cursor_bound_is_honored() {
        let store = MemoryEventStore::new();
        for tick in 0..5 {
            store.append(&make_event(tick, "e")).await.unwrap();
        }
        let bound = EventCursor::new(3, u64::MAX);
        let page = store
            .query(EventFilter::All, Some(bound), 10)
            .await
            .unwrap();
        assert_eq!(page.events.len(), 4);
        assert!(page.events.iter().all(|e| e.tick <= 3));
    }

    #[tokio::test]
    async fn cleanup_keep_major_deletes_only_minor() {
        let store = MemoryEventStore::new();
        let a = ActorId::new();
        store
            .append(&make_event(1, "m1").with_actors([a]).major())
            .await
            .unwrap();
        store
            .append(&make_event(2, "m2").with_actors([a]).major())
            .await
            .unwrap();
        for tick in 3..6 {
            store.append(&make_event(tick, "minor")).await.unwrap();
        }

        let deleted = store.cleanup(true, None).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cleanup_before_tick_spares_recent_events() {
        let store = MemoryEventStore::new();
        for tick in 0..6 {
            store.append(&make_event(tick, "e")).await.unwrap();
        }
        let deleted = store.cleanup(false, Some(3)).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn major_and_minor_partition_an_actors_events() {
        let store = MemoryEventStore::new();
        let actor = ActorId::new();

        store
            .append(&make_event(1, "feat").with_actors([actor]).major())
            .await
            .unwrap();
        store
            .append(&make_event(2, "errand").with_actors([actor]))
            .await
            .unwrap();
        store
            .append(&make_event(3, "tale").with_actors([actor]).major().story())
            .await
            .unwrap();
        store.append(&make_event(4, "unrelated")).await.unwrap();

        let major = store.major_by_actor(actor, 100).await.unwrap();
        let minor = store.minor_by_actor(actor, 100).await.unwrap();

        // Story events land in the minor class even when flagged major.
        assert_eq!(major.len(), 1);
        assert_eq!(minor.len(), 2);

        let all = store
            .query(EventFilter::Actor(actor), None, 100)
            .await
            .unwrap();
        assert_eq!(major.len() + minor.len(), all.events.len());
        assert!(major.iter().all(|e| !minor.iter().any(|m| m.id == e.id)));
    }

    #[tokio::test]
    async fn pair_filter_requires_both_actors() {
        let store = MemoryEventStore::new();
        let a = ActorId::new();
        let b = ActorId::new();

        store
            .append(&make_event(1, "together").with_actors([a, b]))
            .await
            .unwrap();
        store
            .append(&make_event(2, "alone").with_actors([a]))
            .await
            .unwrap();

        let page = store
            .query(EventFilter::Pair(a, b), None, 10)
            .await
            .unwrap();
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.events[0].content, "together");
    }
}
