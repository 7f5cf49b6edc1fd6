//! Event log persistence for the Samsara simulation kernel.
//!
//! The event log is the only state this kernel persists. `PostgreSQL` is
//! the durable backend; an in-memory structure backs tests and runs
//! without infrastructure. The [`EventManager`] facade presents one
//! contract over both -- the single visible difference is that the
//! in-memory fallback is non-paginated (a query returns up to `limit`
//! events and never a continuation cursor).
//!
//! # Modules
//!
//! - [`postgres`] -- `PostgreSQL` connection pool and embedded migrations.
//! - [`event_store`] -- Durable append/query operations on the log.
//! - [`memory`] -- The in-memory fallback store.
//! - [`manager`] -- The [`EventManager`] facade with convenience queries.
//! - [`query`] -- [`EventFilter`] and [`EventPage`] shared by both backends.
//! - [`error`] -- Shared error types.
//!
//! [`EventManager`]: manager::EventManager
//! [`EventFilter`]: query::EventFilter
//! [`EventPage`]: query::EventPage

pub mod error;
pub mod event_store;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod query;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use event_store::PostgresEventStore;
pub use manager::EventManager;
pub use memory::MemoryEventStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use query::{EventFilter, EventPage};
