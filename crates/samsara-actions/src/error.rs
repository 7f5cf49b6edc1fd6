//! Error types for action execution.
//!
//! Validation refusals are not errors -- `can_start` answers with a
//! [`StartCheck`] value. The variants here split along the propagation
//! policy the scheduler applies: [`ActionError::Narrative`] is transient
//! and actor-scoped (the actor retries or sits out the tick), while
//! [`ActionError::Lifecycle`] signals a phase-machine violation -- a kernel
//! defect that aborts the tick.
//!
//! [`StartCheck`]: crate::lifecycle::StartCheck

use samsara_types::ActionKind;

use crate::narrative::NarrativeError;

/// Errors that can occur while driving an action through its lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The narrative provider failed mid-finish. Transient; the instance
    /// is left untouched and retried on a later tick.
    #[error(transparent)]
    Narrative(#[from] NarrativeError),

    /// A lifecycle call arrived in the wrong phase. Fatal; indicates a
    /// scheduler defect rather than a world condition.
    #[error("lifecycle violation for {kind} action: {reason}")]
    Lifecycle {
        /// The action class the violation occurred on.
        kind: ActionKind,
        /// What was attempted and why it is illegal.
        reason: String,
    },
}

impl ActionError {
    /// Whether this error must abort the tick instead of being isolated
    /// to the acting actor.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Lifecycle { .. })
    }
}
