//! Narrative provider seam.
//!
//! Actions that end in something worth telling hand the before/after facts
//! to a [`NarrativeProvider`] and receive prose back. The provider is
//! external (an LLM backend in production); this crate only defines the
//! seam and the fallback behavior: an *empty* result falls back to a plain
//! concatenation of the before and after text, while real failures
//! propagate to the caller -- no narrative is silently fabricated.

use async_trait::async_trait;

/// Errors from the narrative backend.
#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    /// The backend call failed.
    #[error("narrative backend failed: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// A source of narrative prose for finished actions.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Render the transition from `before` to `after` into prose.
    ///
    /// `actors` carries the display names involved, `prompt` a short hint
    /// about the kind of scene. An empty return value is a valid answer
    /// meaning "nothing to add" -- see [`narrate`].
    ///
    /// # Errors
    ///
    /// Returns [`NarrativeError`] if the backend fails.
    async fn tell_story(
        &self,
        before: &str,
        after: &str,
        actors: &[String],
        prompt: &str,
    ) -> Result<String, NarrativeError>;
}

/// A provider that never adds prose of its own.
///
/// Every call returns an empty string, so [`narrate`] always falls back to
/// the plain concatenation. Used as the default backend and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNarrative;

#[async_trait]
impl NarrativeProvider for PlainNarrative {
    async fn tell_story(
        &self,
        _before: &str,
        _after: &str,
        _actors: &[String],
        _prompt: &str,
    ) -> Result<String, NarrativeError> {
        Ok(String::new())
    }
}

/// Ask the provider for prose, falling back to `"{before} {after}"` when
/// the provider answers with an empty string.
///
/// # Errors
///
/// Propagates [`NarrativeError`] from the provider unchanged.
pub async fn narrate(
    provider: &dyn NarrativeProvider,
    before: &str,
    after: &str,
    actors: &[String],
    prompt: &str,
) -> Result<String, NarrativeError> {
    let text = provider.tell_story(before, after, actors, prompt).await?;
    if text.trim().is_empty() {
        Ok(format!("{before} {after}"))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// A provider that always fails, for exercising propagation.
    struct FailingNarrative;

    #[async_trait]
    impl NarrativeProvider for FailingNarrative {
        async fn tell_story(
            &self,
            _before: &str,
            _after: &str,
            _actors: &[String],
            _prompt: &str,
        ) -> Result<String, NarrativeError> {
            Err(NarrativeError::Backend {
                message: String::from("connection refused"),
            })
        }
    }

    #[tokio::test]
    async fn empty_result_falls_back_to_concatenation() {
        let text = narrate(&PlainNarrative, "A fought the boar.", "A won.", &[], "hunt")
            .await
            .unwrap();
        assert_eq!(text, "A fought the boar. A won.");
    }

    #[tokio::test]
    async fn failures_propagate() {
        let result = narrate(&FailingNarrative, "a", "b", &[], "c").await;
        assert!(result.is_err());
    }
}
