//! Actor state for the simulation kernel.
//!
//! [`ActorState`] carries exactly the state the scheduler phases operate on:
//! vitality for passive effects and death resolution, age and lifespan for
//! aging, spouse links for births, progression and resource stats for the
//! action catalog, and the per-pair interaction bookkeeping that feeds
//! relation evolution.
//!
//! All per-pair maps are keyed by the *other* actor's id and use
//! [`BTreeMap`] so iteration order is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::ActorId;

/// Mutable state of one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorState {
    /// The actor's unique id.
    pub id: ActorId,
    /// Display name.
    pub name: String,
    /// Age in months (one tick = one month).
    pub age_months: u64,
    /// Expected lifespan in months; mortality rolls begin near this bound.
    pub lifespan_months: u64,
    /// Current vitality. Non-positive vitality resolves to death.
    pub vitality: i64,
    /// Upper bound for vitality regeneration.
    pub max_vitality: i64,
    /// Progression stat raised by training.
    pub strength: u64,
    /// Coin purse, spent and received through trade.
    pub coins: u64,
    /// Herb satchel, filled by foraging and traded away.
    pub herbs: u64,
    /// Spouse, if married. Births are evaluated for spoused pairs.
    pub spouse: Option<ActorId>,
    /// Interactions with each other actor since the last relation
    /// evaluation, keyed by the other actor's id.
    pub interactions: BTreeMap<ActorId, u64>,
    /// How many times the relation with each other actor has been
    /// evaluated, keyed by the other actor's id.
    pub relation_evals: BTreeMap<ActorId, u64>,
}

impl ActorState {
    /// Create a new adult actor with the given name and lifespan.
    pub fn new(name: impl Into<String>, lifespan_months: u64) -> Self {
        Self {
            id: ActorId::new(),
            name: name.into(),
            age_months: 0,
            lifespan_months,
            vitality: 100,
            max_vitality: 100,
            strength: 10,
            coins: 50,
            herbs: 0,
            spouse: None,
            interactions: BTreeMap::new(),
            relation_evals: BTreeMap::new(),
        }
    }

    /// Record one interaction with another actor.
    pub fn record_interaction(&mut self, other: ActorId) {
        let count = self.interactions.entry(other).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Interactions with `other` since the last relation evaluation.
    pub fn interactions_with(&self, other: ActorId) -> u64 {
        self.interactions.get(&other).copied().unwrap_or(0)
    }

    /// Reset the interaction counter with `other` and bump the
    /// times-evaluated counter, as relation evolution requires.
    pub fn mark_relation_evaluated(&mut self, other: ActorId) {
        self.interactions.insert(other, 0);
        let evals = self.relation_evals.entry(other).or_insert(0);
        *evals = evals.saturating_add(1);
    }

    /// Apply a vitality delta, clamped to `max_vitality` from above.
    ///
    /// The lower bound is intentionally open: vitality may go negative,
    /// and death resolution archives the actor on the next sweep.
    pub fn adjust_vitality(&mut self, delta: i64) {
        self.vitality = self.vitality.saturating_add(delta).min(self.max_vitality);
    }

    /// Whether the actor's age has entered the mortality window.
    pub const fn is_elder(&self, old_age_start: u64) -> bool {
        self.age_months >= old_age_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interactions_accumulate_per_pair() {
        let mut actor = ActorState::new("Wen", 960);
        let other = ActorId::new();
        let third = ActorId::new();

        actor.record_interaction(other);
        actor.record_interaction(other);
        actor.record_interaction(third);

        assert_eq!(actor.interactions_with(other), 2);
        assert_eq!(actor.interactions_with(third), 1);
    }

    #[test]
    fn relation_evaluation_resets_counter_and_bumps_evals() {
        let mut actor = ActorState::new("Wen", 960);
        let other = ActorId::new();

        actor.record_interaction(other);
        actor.record_interaction(other);
        actor.mark_relation_evaluated(other);

        assert_eq!(actor.interactions_with(other), 0);
        assert_eq!(actor.relation_evals.get(&other), Some(&1));

        actor.record_interaction(other);
        actor.mark_relation_evaluated(other);
        assert_eq!(actor.relation_evals.get(&other), Some(&2));
    }

    #[test]
    fn vitality_clamps_at_max_but_not_below_zero() {
        let mut actor = ActorState::new("Wen", 960);
        actor.adjust_vitality(500);
        assert_eq!(actor.vitality, actor.max_vitality);

        actor.adjust_vitality(-250);
        assert!(actor.vitality < 0);
    }
}
