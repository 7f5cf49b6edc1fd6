//! Shared type definitions for the Samsara simulation kernel.
//!
//! This crate holds the primitives every other crate builds on:
//!
//! - [`ids`] -- Type-safe identifier wrappers around UUID v7.
//! - [`event`] -- The immutable [`Event`] record and its builders.
//! - [`cursor`] -- The opaque [`EventCursor`] pagination token.
//! - [`actor`] -- [`ActorState`] and its per-pair bookkeeping.
//! - [`plan`] -- [`ActionKind`], [`ActionParams`], and [`ActionPlan`]
//!   produced by the decision provider.
//!
//! [`Event`]: event::Event
//! [`EventCursor`]: cursor::EventCursor
//! [`ActorState`]: actor::ActorState
//! [`ActionKind`]: plan::ActionKind
//! [`ActionParams`]: plan::ActionParams
//! [`ActionPlan`]: plan::ActionPlan

pub mod actor;
pub mod cursor;
pub mod event;
pub mod ids;
pub mod plan;

// Re-export primary types at crate root for convenience.
pub use actor::ActorState;
pub use cursor::{CursorError, EventCursor};
pub use event::Event;
pub use ids::{ActorId, EventId};
pub use plan::{ActionKind, ActionParams, ActionPlan};
