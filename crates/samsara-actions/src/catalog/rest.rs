//! Quiet recovery.

use async_trait::async_trait;

use samsara_types::{ActionKind, ActorState, Event};

use crate::error::ActionError;
use crate::lifecycle::{Action, ActionContext, StartCheck, StartContext};
use crate::rules;

/// One month of rest. Restores vitality and leaves no mark on the log
/// beyond the announcement.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestAction;

#[async_trait]
impl Action for RestAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Rest
    }

    fn duration(&self) -> u64 {
        1
    }

    fn can_start(&self, _actor: &ActorState, _ctx: &StartContext<'_>) -> StartCheck {
        StartCheck::allow()
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError> {
        let name = ctx.name_of(ctx.actor_id);
        Ok(Event::new(ctx.tick, format!("{name} settles in for a quiet month."))
            .with_actors([ctx.actor_id]))
    }

    async fn finish(&mut self, ctx: &mut ActionContext<'_>) -> Result<Vec<Event>, ActionError> {
        if let Some(actor) = ctx.actor_mut() {
            let recovery = rules::regeneration(actor.max_vitality).saturating_mul(2);
            actor.adjust_vitality(recovery);
        }
        Ok(Vec::new())
    }
}
