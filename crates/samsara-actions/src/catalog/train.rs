//! Secluded training.

use async_trait::async_trait;

use samsara_types::{ActionKind, ActorState, Event};

use crate::error::ActionError;
use crate::lifecycle::{Action, ActionContext, StartCheck, StartContext};
use crate::rules;

/// Months a training retreat lasts.
const TRAIN_DURATION: u64 = 3;

/// A multi-month training retreat. On finish the actor's strength rises;
/// crossing a rank boundary is recorded as a major event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainAction;

#[async_trait]
impl Action for TrainAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Train
    }

    fn duration(&self) -> u64 {
        TRAIN_DURATION
    }

    fn can_start(&self, _actor: &ActorState, _ctx: &StartContext<'_>) -> StartCheck {
        StartCheck::allow()
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError> {
        let name = ctx.name_of(ctx.actor_id);
        Ok(
            Event::new(ctx.tick, format!("{name} withdraws into closed-door training."))
                .with_actors([ctx.actor_id]),
        )
    }

    async fn finish(&mut self, ctx: &mut ActionContext<'_>) -> Result<Vec<Event>, ActionError> {
        let Some(strength) = ctx.actor().map(|a| a.strength) else {
            // The trainee died mid-retreat; nothing to conclude.
            return Ok(Vec::new());
        };
        let gain = rules::training_gain(strength, ctx.rng);
        let after = strength.saturating_add(gain);

        let tick = ctx.tick;
        let actor_id = ctx.actor_id;
        let name = ctx.name_of(actor_id);
        let Some(actor) = ctx.actor_mut() else {
            return Ok(Vec::new());
        };
        actor.strength = after;

        let event = if rules::is_breakthrough(strength, after) {
            Event::new(
                tick,
                format!("{name} emerges from seclusion having broken through to a new rank."),
            )
            .with_actors([actor_id])
            .major()
        } else {
            Event::new(tick, format!("{name} emerges from training, a little stronger."))
                .with_actors([actor_id])
        };
        Ok(vec![event])
    }
}
