//! Action plans produced by the decision provider.
//!
//! A plan names the action class ([`ActionKind`]), carries its parameters
//! ([`ActionParams`]), and keeps the provider's stated rationale and emotion
//! for logging and narration. The scheduler commits a plan into a running
//! action instance at the start of the execute phase.

use serde::{Deserialize, Serialize};

use crate::ids::ActorId;

/// The class identity of an action.
///
/// Cooldowns are keyed by kind: an actor that finished a `Hunt` may not
/// start another until the class cooldown elapses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ActionKind {
    /// Recover quietly for a month.
    Rest,
    /// Secluded training over several months.
    Train,
    /// Gather herbs at a shared site.
    Forage,
    /// Hunt in the wilds.
    Hunt,
    /// Offer a trade to another actor (mutual).
    TradeOffer,
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Rest => "rest",
            Self::Train => "train",
            Self::Forage => "forage",
            Self::Hunt => "hunt",
            Self::TradeOffer => "trade-offer",
        };
        write!(f, "{name}")
    }
}

/// Type-specific action parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionParams {
    /// No parameters.
    Rest,
    /// No parameters.
    Train,
    /// No parameters.
    Forage,
    /// No parameters.
    Hunt,
    /// Offer `target` a barter of coins against herbs.
    TradeOffer {
        /// The actor receiving the offer.
        target: ActorId,
        /// Coin side of the barter.
        coins: u64,
        /// Herb side of the barter.
        herbs: u64,
        /// Direction: `false` = the initiator pays coins for the
        /// target's herbs; `true` = the initiator sells herbs for the
        /// target's coins.
        selling: bool,
    },
}

impl ActionParams {
    /// The action kind these parameters belong to.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Rest => ActionKind::Rest,
            Self::Train => ActionKind::Train,
            Self::Forage => ActionKind::Forage,
            Self::Hunt => ActionKind::Hunt,
            Self::TradeOffer { .. } => ActionKind::TradeOffer,
        }
    }

    /// The other actor this action targets, if any.
    pub const fn target(&self) -> Option<ActorId> {
        match self {
            Self::TradeOffer { target, .. } => Some(*target),
            _ => None,
        }
    }
}

/// A committed-to-be plan for one actor's next action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    /// The action class.
    pub kind: ActionKind,
    /// The action's parameters.
    pub params: ActionParams,
    /// The provider's reasoning, kept for logs and narration prompts.
    pub rationale: String,
    /// The actor's stated emotional tone.
    pub emotion: String,
}

impl ActionPlan {
    /// Build a plan from parameters, deriving the kind.
    pub fn new(params: ActionParams, rationale: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            kind: params.kind(),
            params,
            rationale: rationale.into(),
            emotion: emotion.into(),
        }
    }

    /// Whether the plan's declared kind matches its parameters.
    ///
    /// A provider answering over a wire may disagree with itself; the
    /// scheduler drops such plans as malformed.
    pub fn is_coherent(&self) -> bool {
        self.kind == self.params.kind()
    }
}
