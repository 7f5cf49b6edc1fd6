//! Hunting in the wilds.

use async_trait::async_trait;

use samsara_types::{ActionKind, ActorState, Event};

use crate::error::ActionError;
use crate::lifecycle::{Action, ActionContext, StartCheck, StartContext};
use crate::narrative::narrate;
use crate::rules;

/// Months before the same actor may hunt again.
const HUNT_COOLDOWN: u64 = 2;

/// Minimum vitality to set out.
const MIN_VITALITY: i64 = 20;

/// Vitality committed up front by setting out.
const SETOUT_COST: i64 = 5;

/// A hunt. The class declares a positive cooldown, so the guard
/// intercepts `can_start` and `finish`. The kill report is narrated.
#[derive(Debug, Clone, Copy, Default)]
pub struct HuntAction;

#[async_trait]
impl Action for HuntAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Hunt
    }

    fn duration(&self) -> u64 {
        1
    }

    fn cooldown(&self) -> u64 {
        HUNT_COOLDOWN
    }

    fn can_start(&self, actor: &ActorState, _ctx: &StartContext<'_>) -> StartCheck {
        if actor.vitality < MIN_VITALITY {
            return StartCheck::refuse(format!(
                "too weak to hunt ({} vitality, needs {MIN_VITALITY})",
                actor.vitality
            ));
        }
        StartCheck::allow()
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError> {
        let tick = ctx.tick;
        let actor_id = ctx.actor_id;
        let name = ctx.name_of(actor_id);
        if let Some(actor) = ctx.actor_mut() {
            actor.adjust_vitality(-SETOUT_COST);
        }
        Ok(Event::new(tick, format!("{name} sets out to hunt in the wilds."))
            .with_actors([actor_id]))
    }

    async fn finish(&mut self, ctx: &mut ActionContext<'_>) -> Result<Vec<Event>, ActionError> {
        let Some((name, strength)) = ctx.actor().map(|a| (a.name.clone(), a.strength)) else {
            return Ok(Vec::new());
        };

        let outcome = rules::hunt_outcome(strength, ctx.rng);
        let after = if outcome.prize {
            format!("{name} brought down a beast worth {} coins.", outcome.loot_coins)
        } else if outcome.loot_coins == 0 {
            format!("{name} was driven off by the quarry.")
        } else {
            format!("{name} came back with small game worth {} coins.", outcome.loot_coins)
        };
        let before = format!("{name} stalked the wilds for a month.");

        // Narrate before touching any state, so a failed narration can be
        // retried without applying the outcome twice.
        let prose = narrate(
            ctx.narrative,
            &before,
            &after,
            &[name],
            "a terse hunting report",
        )
        .await?;

        let tick = ctx.tick;
        let actor_id = ctx.actor_id;
        let Some(actor) = ctx.actor_mut() else {
            return Ok(Vec::new());
        };
        actor.coins = actor.coins.saturating_add(outcome.loot_coins);
        actor.adjust_vitality(-outcome.injury);

        let mut result = Event::new(tick, after).with_actors([actor_id]);
        if outcome.prize {
            result = result.major();
        }
        let story = Event::new(tick, prose).with_actors([actor_id]).story();
        Ok(vec![result, story])
    }
}
