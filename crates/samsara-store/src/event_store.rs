//! Durable event log operations on `PostgreSQL`.
//!
//! Appends are idempotent by event id: a repeat id is a no-op, never an
//! overwrite and never an error. Actor associations are written only when
//! the event row itself is new, inside the same transaction, so the log
//! and its association table cannot drift apart.
//!
//! Reverse-chronological queries are keyset-paginated over `(tick, seq)`:
//! a page carries a cursor strictly older than every event it contains,
//! so walking pages yields the full log with no gaps or duplicates. The
//! `seq` identity column is allocated by the database, which serializes
//! concurrent appends.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use samsara_types::{ActorId, Event, EventCursor, EventId};

use crate::error::StoreError;
use crate::query::{EventFilter, EventPage};

/// Operations on the `events` and `event_actors` tables.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Create a store bound to a connection pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an event. Returns `true` if the event was newly written,
    /// `false` if the id was already present (a no-op).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the transaction fails.
    pub async fn append(&self, event: &Event) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r"INSERT INTO events (id, tick, content, major, story, created_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (id) DO NOTHING",
        )
        .bind(event.id.into_inner())
        .bind(i64::try_from(event.tick).unwrap_or(i64::MAX))
        .bind(&event.content)
        .bind(event.major)
        .bind(event.story)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            for actor in &event.actors {
                sqlx::query(
                    r"INSERT INTO event_actors (event_id, actor_id)
                      VALUES ($1, $2)
                      ON CONFLICT DO NOTHING",
                )
                .bind(event.id.into_inner())
                .bind(actor.into_inner())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Query events newest-first, strictly older than `cursor`.
    ///
    /// Returns up to `limit` events and the cursor to continue from;
    /// a `None` continuation means the scan is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn query(
        &self,
        filter: EventFilter,
        cursor: Option<EventCursor>,
        limit: u32,
    ) -> Result<EventPage, StoreError> {
        let cursor_tick = cursor.map(|c| i64::try_from(c.tick).unwrap_or(i64::MAX));
        let cursor_seq = cursor.map(|c| i64::try_from(c.seq).unwrap_or(i64::MAX));
        // Fetch one extra row to learn whether a next page exists.
        let fetch = i64::from(limit).saturating_add(1);

        let rows: Vec<EventRow> = match filter {
            EventFilter::All => {
                sqlx::query_as(
                    r"SELECT e.id, e.tick, e.seq, e.content, e.major, e.story, e.created_at,
                             COALESCE(array_remove(array_agg(a.actor_id), NULL), ARRAY[]::UUID[]) AS actor_ids
                      FROM events e
                      LEFT JOIN event_actors a ON a.event_id = e.id
                      WHERE ($1::BIGINT IS NULL OR (e.tick, e.seq) < ($1, $2))
                      GROUP BY e.id
                      ORDER BY e.tick DESC, e.seq DESC
                      LIMIT $3",
                )
                .bind(cursor_tick)
                .bind(cursor_seq)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            EventFilter::Actor(actor) => {
                sqlx::query_as(
                    r"SELECT e.id, e.tick, e.seq, e.content, e.major, e.story, e.created_at,
                             COALESCE(array_remove(array_agg(a.actor_id), NULL), ARRAY[]::UUID[]) AS actor_ids
                      FROM events e
                      LEFT JOIN event_actors a ON a.event_id = e.id
                      WHERE ($1::BIGINT IS NULL OR (e.tick, e.seq) < ($1, $2))
                        AND EXISTS (SELECT 1 FROM event_actors x
                                    WHERE x.event_id = e.id AND x.actor_id = $4)
                      GROUP BY e.id
                      ORDER BY e.tick DESC, e.seq DESC
                      LIMIT $3",
                )
                .bind(cursor_tick)
                .bind(cursor_seq)
                .bind(fetch)
                .bind(actor.into_inner())
                .fetch_all(&self.pool)
                .await?
            }
            EventFilter::Pair(a, b) => {
                sqlx::query_as(
                    r"SELECT e.id, e.tick, e.seq, e.content, e.major, e.story, e.created_at,
                             COALESCE(array_remove(array_agg(a.actor_id), NULL), ARRAY[]::UUID[]) AS actor_ids
                      FROM events e
                      LEFT JOIN event_actors a ON a.event_id = e.id
                      WHERE ($1::BIGINT IS NULL OR (e.tick, e.seq) < ($1, $2))
                        AND EXISTS (SELECT 1 FROM event_actors x
                                    WHERE x.event_id = e.id AND x.actor_id = $4)
                        AND EXISTS (SELECT 1 FROM event_actors y
                                    WHERE y.event_id = e.id AND y.actor_id = $5)
                      GROUP BY e.id
                      ORDER BY e.tick DESC, e.seq DESC
                      LIMIT $3",
                )
                .bind(cursor_tick)
                .bind(cursor_seq)
                .bind(fetch)
                .bind(a.into_inner())
                .bind(b.into_inner())
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(page_from_rows(rows, limit))
    }

    /// Major events for one actor, oldest first: flagged long-term-memory
    /// events excluding story prose. Sized for prompt construction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn major_by_actor(
        &self,
        actor: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified_by_actors(&[actor], true, limit).await
    }

    /// Minor events for one actor, oldest first: everything that is not
    /// major, including story prose.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn minor_by_actor(
        &self,
        actor: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified_by_actors(&[actor], false, limit).await
    }

    /// Major events referencing both actors of a pair, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn major_by_pair(
        &self,
        a: ActorId,
        b: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified_by_actors(&[a, b], true, limit).await
    }

    /// Minor events referencing both actors of a pair, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn minor_by_pair(
        &self,
        a: ActorId,
        b: ActorId,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        self.classified_by_actors(&[a, b], false, limit).await
    }

    /// Shared body of the classification queries: events referencing all
    /// of `actors`, filtered to the major (`true`) or minor (`false`)
    /// class, oldest first.
    async fn classified_by_actors(
        &self,
        actors: &[ActorId],
        major: bool,
        limit: u32,
    ) -> Result<Vec<Event>, StoreError> {
        let ids: Vec<Uuid> = actors.iter().map(|a| a.into_inner()).collect();
        let rows: Vec<EventRow> = sqlx::query_as(
            r"SELECT e.id, e.tick, e.seq, e.content, e.major, e.story, e.created_at,
                     COALESCE(array_remove(array_agg(a.actor_id), NULL), ARRAY[]::UUID[]) AS actor_ids
              FROM events e
              LEFT JOIN event_actors a ON a.event_id = e.id
              WHERE (e.major AND NOT e.story) = $1
                AND NOT EXISTS (
                    SELECT 1 FROM UNNEST($2::UUID[]) AS required(actor_id)
                    WHERE NOT EXISTS (SELECT 1 FROM event_actors x
                                      WHERE x.event_id = e.id
                                        AND x.actor_id = required.actor_id))
              GROUP BY e.id
              ORDER BY e.tick ASC, e.seq ASC
              LIMIT $3",
        )
        .bind(major)
        .bind(&ids)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(EventRow::into_event).collect())
    }

    /// Bulk-delete events, optionally preserving the major class and/or
    /// restricting to events older than `before_tick`. Returns the number
    /// of deleted events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the delete fails.
    pub async fn cleanup(
        &self,
        keep_major: bool,
        before_tick: Option<u64>,
    ) -> Result<u64, StoreError> {
        let tick_bound = before_tick.map(|t| i64::try_from(t).unwrap_or(i64::MAX));
        let deleted = sqlx::query(
            r"DELETE FROM events e
              WHERE (NOT $1 OR NOT (e.major AND NOT e.story))
                AND ($2::BIGINT IS NULL OR e.tick < $2)",
        )
        .bind(keep_major)
        .bind(tick_bound)
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::info!(deleted, keep_major, ?before_tick, "Event log cleanup");
        Ok(deleted)
    }

    /// Number of events in the log.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(r"SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// A row from the `events` table with its aggregated actor associations.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    tick: i64,
    seq: i64,
    content: String,
    major: bool,
    story: bool,
    created_at: DateTime<Utc>,
    actor_ids: Vec<Uuid>,
}

impl EventRow {
    /// The row's position in the log's total order.
    fn cursor(&self) -> EventCursor {
        EventCursor::new(
            u64::try_from(self.tick).unwrap_or(0),
            u64::try_from(self.seq).unwrap_or(0),
        )
    }

    /// Convert into the domain [`Event`].
    fn into_event(self) -> Event {
        Event {
            id: EventId::from(self.id),
            tick: u64::try_from(self.tick).unwrap_or(0),
            content: self.content,
            actors: self.actor_ids.into_iter().map(ActorId::from).collect(),
            major: self.major,
            story: self.story,
            created_at: self.created_at,
        }
    }
}

/// Build a page from `limit + 1` fetched rows: the extra row, if present,
/// only signals that a next page exists.
fn page_from_rows(mut rows: Vec<EventRow>, limit: u32) -> EventPage {
    let limit = limit as usize;
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    let next = if has_more {
        rows.last().map(EventRow::cursor)
    } else {
        None
    };
    EventPage {
        events: rows.into_iter().map(EventRow::into_event).collect(),
        next,
    }
}
