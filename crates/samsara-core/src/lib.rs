//! World clock, tick scheduler, and provider seams for the Samsara
//! simulation kernel.
//!
//! This crate owns the 8-phase tick cycle that advances the world one
//! month at a time: Decide, Execute, Count, Passive, Aging & Births,
//! Deaths, Relations, Re-count & Advance.
//!
//! # Modules
//!
//! - [`clock`] -- The month-granular [`WorldClock`] with checked advance.
//! - [`config`] -- Configuration loading from YAML into typed structs.
//! - [`decision`] -- The [`DecisionProvider`] seam and its stub.
//! - [`relation`] -- The [`RelationResolver`] seam and its stub.
//! - [`tick`] -- The 8-phase tick scheduler and [`WorldState`].
//! - [`runner`] -- The bounded simulation loop.
//!
//! [`WorldClock`]: clock::WorldClock
//! [`DecisionProvider`]: decision::DecisionProvider
//! [`RelationResolver`]: relation::RelationResolver
//! [`WorldState`]: tick::WorldState

pub mod clock;
pub mod config;
pub mod decision;
pub mod relation;
pub mod runner;
pub mod tick;
