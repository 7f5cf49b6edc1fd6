//! The event manager facade.
//!
//! One uniform surface over the durable `PostgreSQL` store and the
//! in-memory fallback, using enum dispatch (the dyn-compatible
//! alternative to async trait objects). The scheduler talks only to this
//! type.
//!
//! [`EventManager::add`] never raises: persistence failures are logged
//! and reported through the boolean result, and a duplicate id is a
//! successful no-op. Read queries return `Result` for callers that need
//! to distinguish an empty log from a broken one.

use samsara_types::{ActorId, Event, EventCursor};

use crate::error::StoreError;
use crate::event_store::PostgresEventStore;
use crate::memory::MemoryEventStore;
use crate::query::{EventFilter, EventPage};

/// Uniform facade over the event store backends.
pub enum EventManager {
    /// Durable `PostgreSQL` backend.
    Postgres(PostgresEventStore),
    /// In-memory fallback (explicitly non-paginated).
    Memory(MemoryEventStore),
}

impl EventManager {
    /// Create a manager over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::Memory(MemoryEventStore::new())
    }

    /// Create a manager over a durable store.
    pub const fn postgres(store: PostgresEventStore) -> Self {
        Self::Postgres(store)
    }

    /// Human-readable backend name for logging.
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Persist an event. Returns `true` on success -- including the
    /// duplicate-id no-op -- and `false` on a persistence failure, which
    /// is logged here and never raised to the caller.
    pub async fn add(&self, event: &Event) -> bool {
        let result = match self {
            Self::Postgres(store) => store.append(event).await,
            Self::Memory(store) => store.append(event).await,
        };
        match result {
            Ok(newly_written) => {
                if !newly_written {
                    tracing::debug!(event_id = %event.id, "Duplicate event id; append ignored");
                }
                true
            }
            Err(err) => {
                tracing::error!(event_id = %event.id, %err, "Failed to persist event");
                false
            }
        }
    }

    /// Query events newest-first, strictly older than `cursor`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn query(
        &self,
        filter: EventFilter,
        cursor: Option<EventCursor>,
        limit: u32,
    ) -> Result<EventPage, StoreError> {
        match self {
            Self::Postgres(store) => store.query(filter, cursor, limit).await,
            Self::Memory(store) => store.query(filter, cursor, limit).await,
        }
    }

    /// Events referencing one actor, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn events_for(
        &self,
        actor: ActorId,
        cursor: Option<EventCursor>,
        limit: u32,
    ) -> Result<EventPage, StoreError> {
        self.query(EventFilter::Actor(actor), cursor, limit).await
    }

    /// Events referencing both actors of a pair, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn events_for_pair(
        &self,
        a: ActorId,
        b: ActorId,
        cursor: Option<EventCursor>,
        limit: u32,
    ) -> Result<EventPage, StoreError> {
        self.query(EventFilter::Pair(a, b), cursor, limit).await
    }

    /// Major events for one actor, oldest first, sized for prompts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn major_for(&self, actor: ActorId, limit: u32) -> Result<Vec<Event>, StoreError> {
        match self {
            Self::Postgres(store) => store.major_by_actor(actor, limit).await,
            Self::Memory(store) => store.major_by_actor(actor, limit).await,
        }
    }

    /// Minor events for one actor, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn minor_for(&self, actor: ActorId, limit: u32) -> Result<Vec<Event>, StoreError> {
        match self {
            Self::Postgres(store) => store.minor_by_actor(actor, limit).await,
            Self::Memory(store) => store.minor_by_actor(actor, limit).await,
        }
    }

    /// Major events for a pair, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn major_for_pair(
        &self,
        a: ActorId,
        b: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        match self {
            Self::Postgres(store) => store.major_by_pair(a, b, limit).await,
            Self::Memory(store) => store.major_by_pair(a, b, limit).await,
        }
    }

    /// Minor events for a pair, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn minor_for_pair(
        &self,
        a: ActorId,
        b: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        match self {
            Self::Postgres(store) => store.minor_by_pair(a, b, limit).await,
            Self::Memory(store) => store.minor_by_pair(a, b, limit).await,
        }
    }

    /// Bulk-delete events. See the backend documentation for semantics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn cleanup(
        &self,
        keep_major: bool,
        before_tick: Option<u64>,
    ) -> Result<u64, StoreError> {
        match self {
            Self::Postgres(store) => store.cleanup(keep_major, before_tick).await,
            Self::Memory(store) => store.cleanup(keep_major, before_tick).await,
        }
    }

    /// Number of events in the log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        match self {
            Self::Postgres(store) => store.count().await,
            Self::Memory(store) => store.count().await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_reports_success_and_tolerates_duplicates() {
        let manager = EventManager::in_memory();
        let event = Event::new(1, "once");
        assert!(manager.add(&event).await);
        // Same id again: a no-op, still a success.
        assert!(manager.add(&event).await);
        assert_eq!(manager.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn convenience_queries_delegate() {
        let manager = EventManager::in_memory();
        let a = ActorId::new();
        let b = ActorId::new();

        manager
            .add(&Event::new(1, "pact").with_actors([a, b]).major())
            .await;
        manager.add(&Event::new(2, "walk").with_actors([a])).await;

        let for_a = manager.events_for(a, None, 10).await.unwrap();
        assert_eq!(for_a.events.len(), 2);

        let for_pair = manager.events_for_pair(a, b, None, 10).await.unwrap();
        assert_eq!(for_pair.events.len(), 1);

        let major = manager.major_for_pair(a, b, 10).await.unwrap();
        assert_eq!(major.len(), 1);
        let minor = manager.minor_for(a, 10).await.unwrap();
        assert_eq!(minor.len(), 1);
    }

    #[test]
    fn backend_names() {
        assert_eq!(EventManager::in_memory().backend(), "memory");
    }
}
