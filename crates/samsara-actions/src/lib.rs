//! Action lifecycle, cooldown guard, and action catalog for the Samsara
//! simulation kernel.
//!
//! This crate owns everything between a committed [`ActionPlan`] and the
//! [`Event`]s it produces:
//!
//! - [`lifecycle`] -- The [`Action`] capability trait, the
//!   `Idle -> Started -> Running -> [AwaitingFeedback] -> Finished` phase
//!   machine ([`ActionInstance`]), and the [`Negotiation`] capability for
//!   mutual actions.
//! - [`cooldown`] -- Per-actor [`CooldownRecord`] and the [`CooldownGuard`]
//!   composition wrapper intercepting `can_start` and `finish`.
//! - [`narrative`] -- The async [`NarrativeProvider`] seam and the
//!   concatenation fallback for empty narration.
//! - [`sites`] -- Process-scoped shared gathering-site state
//!   ([`SiteLedger`]), owned by the world state and passed by reference.
//! - [`rules`] -- Pure rule collaborators (training gain, hunt outcomes,
//!   fortune rolls, births, mortality).
//! - [`catalog`] -- The concrete actions: Rest, Train, Forage, Hunt, and
//!   the mutual `TradeOffer`.
//!
//! [`ActionPlan`]: samsara_types::ActionPlan
//! [`Event`]: samsara_types::Event
//! [`Action`]: lifecycle::Action
//! [`ActionInstance`]: lifecycle::ActionInstance
//! [`Negotiation`]: lifecycle::Negotiation
//! [`CooldownRecord`]: cooldown::CooldownRecord
//! [`CooldownGuard`]: cooldown::CooldownGuard
//! [`NarrativeProvider`]: narrative::NarrativeProvider
//! [`SiteLedger`]: sites::SiteLedger

pub mod catalog;
pub mod cooldown;
pub mod error;
pub mod lifecycle;
pub mod narrative;
pub mod rules;
pub mod sites;

// Re-export primary types at crate root for convenience.
pub use cooldown::{CooldownGuard, CooldownRecord};
pub use error::ActionError;
pub use lifecycle::{
    Action, ActionContext, ActionInstance, ActionPhase, FollowUp, Negotiation, Settlement,
    StartCheck, StartContext,
};
pub use narrative::{NarrativeError, NarrativeProvider, PlainNarrative, narrate};
pub use sites::SiteLedger;
