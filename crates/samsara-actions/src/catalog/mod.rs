//! The concrete action catalog.
//!
//! One module per action class:
//!
//! - [`rest`] -- quiet one-tick recovery (the decision stub's default).
//! - [`train`] -- three-tick secluded training with breakthrough detection.
//! - [`forage`] -- herb gathering gated by the shared site ledger.
//! - [`hunt`] -- cooldown-guarded hunting with narrated outcomes.
//! - [`trade`] -- the mutual barter offer with the feedback protocol.
//!
//! [`build`] turns a committed plan into the matching action object.

pub mod forage;
pub mod hunt;
pub mod rest;
pub mod trade;
pub mod train;

use samsara_types::{ActionParams, ActionPlan};

use crate::lifecycle::Action;

pub use forage::ForageAction;
pub use hunt::HuntAction;
pub use rest::RestAction;
pub use trade::TradeOfferAction;
pub use train::TrainAction;

/// Instantiate the action a plan describes.
pub fn build(plan: &ActionPlan) -> Box<dyn Action> {
    match &plan.params {
        ActionParams::Rest => Box::new(RestAction),
        ActionParams::Train => Box::new(TrainAction),
        ActionParams::Forage => Box::new(ForageAction),
        ActionParams::Hunt => Box::new(HuntAction),
        ActionParams::TradeOffer {
            target,
            coins,
            herbs,
            selling,
        } => Box::new(TradeOfferAction::new(*target, *coins, *herbs, *selling)),
    }
}
