//! Decision provider seam and stub implementation.
//!
//! During the Decide phase the scheduler builds a [`DecisionContext`] for
//! every actor lacking a queued plan, fans out one concurrent
//! [`decide`] call per actor, and joins them all before applying any
//! result. The same seam answers mutual-action feedback requests with a
//! label from the declared set.
//!
//! The [`StubDecisionProvider`] answers `Rest` and the first declared
//! label, which lets the tick cycle run end-to-end without an LLM
//! backend.
//!
//! [`decide`]: DecisionProvider::decide

use async_trait::async_trait;

use samsara_types::{ActionParams, ActionPlan, ActorState};

/// Errors that can occur while obtaining a decision.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    /// The backend failed or timed out.
    #[error("decision provider failed: {message}")]
    Provider {
        /// Description of the failure.
        message: String,
    },

    /// The backend answered something unusable.
    #[error("malformed decision: {message}")]
    Malformed {
        /// What was wrong with the answer.
        message: String,
    },
}

/// Everything a provider sees when deciding for one actor.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    /// Current tick.
    pub tick: u64,
    /// Snapshot of the deciding actor.
    pub actor: ActorState,
    /// The actor's long-term memories (major event contents, oldest
    /// first), sized for prompt construction.
    pub memories: Vec<String>,
}

/// A source of actor decisions.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Propose the actor's next action plan.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] on failure; the scheduler isolates the
    /// failure to this actor and the tick proceeds.
    async fn decide(&self, ctx: &DecisionContext) -> Result<ActionPlan, DecisionError>;

    /// Answer a mutual-action feedback request with one of `labels`.
    ///
    /// Answers outside the declared set are valid input downstream: the
    /// settlement treats them as the default rejection.
    ///
    /// # Errors
    ///
    /// Returns [`DecisionError`] on failure; the scheduler treats the
    /// failure as a rejection so the negotiation still settles.
    async fn feedback(
        &self,
        ctx: &DecisionContext,
        labels: &[&str],
        prompt: &str,
    ) -> Result<String, DecisionError>;
}

/// A stub provider: every actor rests, every offer is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubDecisionProvider;

impl StubDecisionProvider {
    /// Create a new stub provider.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DecisionProvider for StubDecisionProvider {
    async fn decide(&self, _ctx: &DecisionContext) -> Result<ActionPlan, DecisionError> {
        Ok(ActionPlan::new(
            ActionParams::Rest,
            "no pressing concerns",
            "calm",
        ))
    }

    async fn feedback(
        &self,
        _ctx: &DecisionContext,
        labels: &[&str],
        _prompt: &str,
    ) -> Result<String, DecisionError> {
        Ok(labels.first().copied().unwrap_or("").to_owned())
    }
}
