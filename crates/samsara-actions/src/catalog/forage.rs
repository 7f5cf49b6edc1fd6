//! Herb gathering at the shared hollow.

use async_trait::async_trait;

use samsara_types::{ActionKind, ActorState, Event};

use crate::error::ActionError;
use crate::lifecycle::{Action, ActionContext, StartCheck, StartContext};
use crate::rules;

/// The shared gathering site this action draws from.
const SITE: &str = "verdant hollow";

/// Gather herbs at the hollow. The site closes once gathered from and
/// reopens on the ledger's interval, so foragers race for each opening.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForageAction;

#[async_trait]
impl Action for ForageAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Forage
    }

    fn duration(&self) -> u64 {
        1
    }

    fn can_start(&self, _actor: &ActorState, ctx: &StartContext<'_>) -> StartCheck {
        let wait = ctx.sites.ticks_until_open(SITE, ctx.tick);
        if wait > 0 {
            return StartCheck::refuse(format!(
                "the {SITE} is picked clean for {wait} more months"
            ));
        }
        StartCheck::allow()
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError> {
        let name = ctx.name_of(ctx.actor_id);
        Ok(
            Event::new(ctx.tick, format!("{name} sets out for the {SITE}."))
                .with_actors([ctx.actor_id]),
        )
    }

    async fn finish(&mut self, ctx: &mut ActionContext<'_>) -> Result<Vec<Event>, ActionError> {
        // Another forager may have emptied the site since this one set
        // out; they come home with nothing.
        if !ctx.sites.is_open(SITE, ctx.tick) {
            return Ok(Vec::new());
        }
        if ctx.actor().is_none() {
            return Ok(Vec::new());
        }

        let yield_herbs = rules::forage_yield(ctx.rng);
        let tick = ctx.tick;
        let actor_id = ctx.actor_id;
        let name = ctx.name_of(actor_id);

        ctx.sites.mark_opened(SITE, tick);
        if let Some(actor) = ctx.actor_mut() {
            actor.herbs = actor.herbs.saturating_add(yield_herbs);
        }

        Ok(vec![
            Event::new(
                tick,
                format!("{name} returns from the {SITE} with {yield_herbs} bundles of herbs."),
            )
            .with_actors([actor_id]),
        ])
    }
}
