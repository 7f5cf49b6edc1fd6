//! The mutual barter offer.
//!
//! A trade offer is the negotiated two-party action: the initiator escrows
//! their side of the barter on start, the target answers with a feedback
//! label, and settlement dispatches on the answer. The declared labels are
//! `"Accept"` and `"CounterOffer"`; any other answer -- including a plain
//! `"Reject"` -- takes the default rejection branch and refunds the escrow.
//!
//! A counter-offer preempts the target: their queued plan is cleared and a
//! mirrored offer (direction flipped, price adjusted) becomes their current
//! action.

use async_trait::async_trait;

use samsara_types::{ActionKind, ActionParams, ActionPlan, ActorId, ActorState, Event};

use crate::error::ActionError;
use crate::lifecycle::{
    Action, ActionContext, FollowUp, Negotiation, Settlement, StartCheck, StartContext,
};
use crate::narrative::narrate;

/// Feedback labels a trade offer declares.
const LABELS: &[&str] = &["Accept", "CounterOffer"];

/// An offer of coins against herbs made to another actor.
#[derive(Debug, Clone, Copy)]
pub struct TradeOfferAction {
    target: ActorId,
    coins: u64,
    herbs: u64,
    selling: bool,
}

impl TradeOfferAction {
    /// Create an offer. `selling = false` means the initiator pays
    /// `coins` for the target's `herbs`; `true` means the initiator
    /// offers `herbs` for the target's `coins`.
    pub const fn new(target: ActorId, coins: u64, herbs: u64, selling: bool) -> Self {
        Self {
            target,
            coins,
            herbs,
            selling,
        }
    }

    /// One line describing the offer from the initiator's side.
    fn describe(&self, initiator: &str, target: &str) -> String {
        if self.selling {
            format!(
                "{initiator} offers {target} {} bundles of herbs for {} coins.",
                self.herbs, self.coins
            )
        } else {
            format!(
                "{initiator} offers {target} {} coins for {} bundles of herbs.",
                self.coins, self.herbs
            )
        }
    }

    /// Return the escrowed goods to the initiator, if they still live.
    fn refund(&self, ctx: &mut ActionContext<'_>) {
        if let Some(actor) = ctx.actor_mut() {
            if self.selling {
                actor.herbs = actor.herbs.saturating_add(self.herbs);
            } else {
                actor.coins = actor.coins.saturating_add(self.coins);
            }
        }
    }

    /// Whether the target can honor their side of the barter.
    fn target_can_honor(&self, target: &ActorState) -> bool {
        if self.selling {
            target.coins >= self.coins
        } else {
            target.herbs >= self.herbs
        }
    }

    /// Move both sides of the barter. The initiator's side is already
    /// escrowed; the target's side is checked by the caller.
    fn transfer(&self, ctx: &mut ActionContext<'_>) {
        let initiator = ctx.actor_id;
        if self.selling {
            if let Some(t) = ctx.actors.get_mut(&self.target) {
                t.coins = t.coins.saturating_sub(self.coins);
                t.herbs = t.herbs.saturating_add(self.herbs);
            }
            if let Some(i) = ctx.actors.get_mut(&initiator) {
                i.coins = i.coins.saturating_add(self.coins);
            }
        } else {
            if let Some(t) = ctx.actors.get_mut(&self.target) {
                t.herbs = t.herbs.saturating_sub(self.herbs);
                t.coins = t.coins.saturating_add(self.coins);
            }
            if let Some(i) = ctx.actors.get_mut(&initiator) {
                i.herbs = i.herbs.saturating_add(self.herbs);
            }
        }
    }

    /// The mirrored plan a counter-offer preempts the target with:
    /// direction flipped, price nudged in the target's favor.
    fn counter_plan(&self, initiator: ActorId) -> ActionPlan {
        let coins = if self.selling {
            self.coins.saturating_sub((self.coins / 4).max(1))
        } else {
            self.coins.saturating_add((self.coins / 2).max(1))
        };
        ActionPlan::new(
            ActionParams::TradeOffer {
                target: initiator,
                coins,
                herbs: self.herbs,
                selling: !self.selling,
            },
            "counters the terms of the offer",
            "shrewd",
        )
    }
}

#[async_trait]
impl Action for TradeOfferAction {
    fn kind(&self) -> ActionKind {
        ActionKind::TradeOffer
    }

    fn duration(&self) -> u64 {
        1
    }

    fn is_mutual(&self) -> bool {
        true
    }

    fn can_start(&self, actor: &ActorState, ctx: &StartContext<'_>) -> StartCheck {
        if self.target == actor.id {
            return StartCheck::refuse("cannot trade with oneself");
        }
        if !ctx.actors.contains_key(&self.target) {
            return StartCheck::refuse("the other party is gone");
        }
        if self.selling && actor.herbs < self.herbs {
            return StartCheck::refuse(format!(
                "not enough herbs to offer ({} of {})",
                actor.herbs, self.herbs
            ));
        }
        if !self.selling && actor.coins < self.coins {
            return StartCheck::refuse(format!(
                "not enough coins to offer ({} of {})",
                actor.coins, self.coins
            ));
        }
        StartCheck::allow()
    }

    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError> {
        let tick = ctx.tick;
        let initiator = ctx.actor_id;
        let initiator_name = ctx.name_of(initiator);
        let target_name = ctx.name_of(self.target);

        // Escrow the initiator's side up front.
        if let Some(actor) = ctx.actor_mut() {
            if self.selling {
                actor.herbs = actor.herbs.saturating_sub(self.herbs);
            } else {
                actor.coins = actor.coins.saturating_sub(self.coins);
            }
        }

        Ok(Event::new(tick, self.describe(&initiator_name, &target_name))
            .with_actors([initiator, self.target]))
    }

    async fn finish(&mut self, _ctx: &mut ActionContext<'_>) -> Result<Vec<Event>, ActionError> {
        Err(ActionError::Lifecycle {
            kind: ActionKind::TradeOffer,
            reason: String::from("mutual action settles through feedback"),
        })
    }

    fn negotiation(&mut self) -> Option<&mut dyn Negotiation> {
        Some(self)
    }
}

#[async_trait]
impl Negotiation for TradeOfferAction {
    fn target(&self) -> ActorId {
        self.target
    }

    fn labels(&self) -> &'static [&'static str] {
        LABELS
    }

    fn prompt(&self) -> String {
        if self.selling {
            format!(
                "You are offered {} bundles of herbs for {} of your coins.",
                self.herbs, self.coins
            )
        } else {
            format!(
                "You are offered {} coins for {} of your herb bundles.",
                self.coins, self.herbs
            )
        }
    }

    async fn settle(
        &mut self,
        label: &str,
        ctx: &mut ActionContext<'_>,
    ) -> Result<Settlement, ActionError> {
        let tick = ctx.tick;
        let initiator = ctx.actor_id;

        // Both parties are re-validated here: either may have died since
        // the offer was announced.
        if ctx.actor().is_none() {
            return Ok(Settlement::empty());
        }
        let Some(target_state) = ctx.actors.get(&self.target) else {
            self.refund(ctx);
            return Ok(Settlement::empty());
        };

        let initiator_name = ctx.name_of(initiator);
        let target_name = target_state.name.clone();
        let offer_line = self.describe(&initiator_name, &target_name);

        match label {
            "Accept" if self.target_can_honor(target_state) => {
                let after = format!("{target_name} accepted, and the goods changed hands.");
                let prose = narrate(
                    ctx.narrative,
                    &offer_line,
                    &after,
                    &[initiator_name, target_name],
                    "a short scene of a bargain being struck",
                )
                .await?;

                self.transfer(ctx);
                let result = Event::new(tick, after)
                    .with_actors([initiator, self.target])
                    .major();
                let story = Event::new(tick, prose)
                    .with_actors([initiator, self.target])
                    .story();
                Ok(Settlement {
                    events: vec![result, story],
                    follow_up: None,
                })
            }
            "Accept" => {
                // Accepted in word, but the target cannot honor the barter.
                self.refund(ctx);
                let event = Event::new(
                    tick,
                    format!("{target_name} could not honor {initiator_name}'s offer."),
                )
                .with_actors([initiator, self.target]);
                Ok(Settlement {
                    events: vec![event],
                    follow_up: None,
                })
            }
            "CounterOffer" => {
                self.refund(ctx);
                let event = Event::new(
                    tick,
                    format!("{target_name} turns {initiator_name}'s offer around with new terms."),
                )
                .with_actors([initiator, self.target]);
                Ok(Settlement {
                    events: vec![event],
                    follow_up: Some(FollowUp {
                        actor: self.target,
                        plan: self.counter_plan(initiator),
                    }),
                })
            }
            other => {
                // Default rejection branch; `other` may be anything the
                // provider said, declared or not.
                tracing::debug!(label = other, "trade offer declined");
                self.refund(ctx);
                let event = Event::new(
                    tick,
                    format!("{target_name} declined {initiator_name}'s offer."),
                )
                .with_actors([initiator, self.target]);
                Ok(Settlement {
                    events: vec![event],
                    follow_up: None,
                })
            }
        }
    }
}
