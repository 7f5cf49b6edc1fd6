//! Relation resolver seam and stub implementation.
//!
//! Actor pairs whose interaction counter exceeds the configured
//! threshold are submitted to an external resolver (an LLM backend in
//! production) that re-describes the relationship. On success the
//! scheduler resets the pair's counter and bumps the times-evaluated
//! counter; on failure the counters are left untouched and the pair is
//! re-submitted once they interact again.

use async_trait::async_trait;

use samsara_types::ActorState;

/// Errors that can occur during relation resolution.
#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    /// The backend failed.
    #[error("relation resolver failed: {message}")]
    Provider {
        /// Description of the failure.
        message: String,
    },
}

/// The resolver's verdict on an evolved relationship.
#[derive(Debug, Clone)]
pub struct RelationAssessment {
    /// Prose summary of where the relationship stands.
    pub summary: String,
    /// Whether the shift is worth keeping in long-term memory.
    pub major: bool,
}

/// A source of relationship assessments.
#[async_trait]
pub trait RelationResolver: Send + Sync {
    /// Assess the relationship between two actors after `interactions`
    /// dealings since the last of `times_evaluated` evaluations.
    ///
    /// # Errors
    ///
    /// Returns [`RelationError`] on failure; the scheduler leaves the
    /// pair's counters untouched.
    async fn evolve(
        &self,
        a: &ActorState,
        b: &ActorState,
        interactions: u64,
        times_evaluated: u64,
    ) -> Result<RelationAssessment, RelationError>;
}

/// A deterministic stub resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubRelationResolver;

impl StubRelationResolver {
    /// Create a new stub resolver.
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelationResolver for StubRelationResolver {
    async fn evolve(
        &self,
        a: &ActorState,
        b: &ActorState,
        interactions: u64,
        times_evaluated: u64,
    ) -> Result<RelationAssessment, RelationError> {
        Ok(RelationAssessment {
            summary: format!(
                "{} and {} have taken each other's measure after {interactions} dealings.",
                a.name, b.name
            ),
            // The first evaluation of a pair is the memorable one.
            major: times_evaluated == 0,
        })
    }
}
