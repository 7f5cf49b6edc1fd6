//! The action lifecycle state machine.
//!
//! Every action moves through `Idle -> Started -> Running -> Finished`,
//! with mutual actions inserting `AwaitingFeedback` between Running and
//! Finished. [`ActionInstance`] owns the phase and the remaining-duration
//! counter; the concrete behavior lives behind the [`Action`] capability
//! trait, with negotiation as an optional additional capability
//! ([`Negotiation`]) rather than deeper inheritance.
//!
//! Phase rules enforced here:
//!
//! - `start` commits minimal side effects and returns one announcement
//!   event; it is called exactly once per committed plan.
//! - `step` advances duration bookkeeping once per tick and produces no
//!   events of its own.
//! - `finish` runs only when the remaining duration has reached zero; it
//!   is asynchronous (it may await the narrative provider) and must
//!   tolerate the target having died since `start` by returning an empty
//!   event list.
//! - A mutual action settles through `settle_feedback` exactly once; any
//!   label outside the declared set takes the action's default rejection
//!   branch.
//!
//! Calls outside these rules are [`ActionError::Lifecycle`] -- a kernel
//! defect, not a world condition.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rand::rngs::SmallRng;

use samsara_types::{ActionKind, ActionPlan, ActorId, ActorState, Event};

use crate::cooldown::{CooldownGuard, CooldownRecord};
use crate::error::ActionError;
use crate::narrative::NarrativeProvider;
use crate::sites::SiteLedger;

/// Lifecycle phase of an action instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    /// Created but not yet started.
    Idle,
    /// `start` is executing.
    Started,
    /// Duration is being counted down by `step` calls.
    Running,
    /// A mutual action waiting for the target's feedback label.
    AwaitingFeedback,
    /// Terminal.
    Finished,
}

/// Answer from a `can_start` check: allowed, or refused with a reason.
///
/// Validation refusals are values, never errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCheck {
    allowed: bool,
    reason: Option<String>,
}

impl StartCheck {
    /// The action may start.
    pub const fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// The action may not start, with the stated reason.
    pub fn refuse(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// Whether the action may start.
    pub const fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// The refusal reason, if refused.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

/// Read-only view for `can_start` checks.
#[derive(Debug)]
pub struct StartContext<'a> {
    /// Current tick.
    pub tick: u64,
    /// The living actors.
    pub actors: &'a BTreeMap<ActorId, ActorState>,
    /// Shared gathering-site state.
    pub sites: &'a SiteLedger,
}

/// Mutable context handed to `start`, `finish`, and settlement.
pub struct ActionContext<'a> {
    /// Current tick.
    pub tick: u64,
    /// The acting actor.
    pub actor_id: ActorId,
    /// The living actors. Dead actors are absent; every call re-validates
    /// presence instead of assuming it.
    pub actors: &'a mut BTreeMap<ActorId, ActorState>,
    /// Shared gathering-site state.
    pub sites: &'a mut SiteLedger,
    /// World RNG, seeded from configuration.
    pub rng: &'a mut SmallRng,
    /// Narrative backend for finish prose.
    pub narrative: &'a dyn NarrativeProvider,
}

impl ActionContext<'_> {
    /// The acting actor's state, if still living.
    pub fn actor(&self) -> Option<&ActorState> {
        self.actors.get(&self.actor_id)
    }

    /// Mutable access to the acting actor's state, if still living.
    pub fn actor_mut(&mut self) -> Option<&mut ActorState> {
        self.actors.get_mut(&self.actor_id)
    }

    /// Whether the given actor is still in the living set.
    pub fn is_alive(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    /// Display name for an actor, or `"Unknown"` for the departed.
    pub fn name_of(&self, id: ActorId) -> String {
        self.actors
            .get(&id)
            .map_or_else(|| String::from("Unknown"), |a| a.name.clone())
    }
}

/// The capability interface every concrete action implements.
#[async_trait]
pub trait Action: Send + Sync {
    /// The action's class identity (cooldowns are keyed by this).
    fn kind(&self) -> ActionKind;

    /// Ticks of Running before the action becomes eligible to finish.
    fn duration(&self) -> u64;

    /// Class cooldown in ticks; zero means no cooldown guard.
    fn cooldown(&self) -> u64 {
        0
    }

    /// Whether this action settles through the feedback protocol.
    fn is_mutual(&self) -> bool {
        false
    }

    /// Pure start predicate; must not mutate state.
    fn can_start(&self, actor: &ActorState, ctx: &StartContext<'_>) -> StartCheck;

    /// Commit minimal side effects and return the announcement event.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] if the commit fails.
    fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError>;

    /// Perform final effects and return the result events. May await the
    /// narrative provider. A target that died since `start` is answered
    /// with an empty event list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Narrative`] if the narrative backend fails;
    /// the call is retried on a later tick.
    async fn finish(&mut self, ctx: &mut ActionContext<'_>) -> Result<Vec<Event>, ActionError>;

    /// The negotiation capability, for mutual actions only.
    fn negotiation(&mut self) -> Option<&mut dyn Negotiation> {
        None
    }
}

/// Outcome of settling a mutual action.
#[derive(Debug)]
pub struct Settlement {
    /// Result events of the settlement.
    pub events: Vec<Event>,
    /// An immediate follow-up action for the target, if the settlement
    /// preempts them.
    pub follow_up: Option<FollowUp>,
}

impl Settlement {
    /// A settlement with no events and no follow-up.
    pub const fn empty() -> Self {
        Self {
            events: Vec::new(),
            follow_up: None,
        }
    }
}

/// A follow-up enqueued by a settlement: clears the target's queued plan
/// and substitutes this plan as their current action.
#[derive(Debug, Clone)]
pub struct FollowUp {
    /// The actor being preempted.
    pub actor: ActorId,
    /// The plan that becomes their current action.
    pub plan: ActionPlan,
}

/// What the scheduler needs to collect feedback for a mutual action.
#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    /// The actor whose answer is required.
    pub target: ActorId,
    /// The declared feedback labels. Any other answer is treated as the
    /// default rejection.
    pub labels: &'static [&'static str],
    /// Prompt text describing the pending decision.
    pub prompt: String,
}

/// The negotiation capability of a mutual action.
#[async_trait]
pub trait Negotiation: Send {
    /// The actor whose consent is required.
    fn target(&self) -> ActorId;

    /// The declared feedback labels.
    fn labels(&self) -> &'static [&'static str];

    /// Prompt text presented to the target.
    fn prompt(&self) -> String;

    /// Settle the negotiation with the received label. Dispatches on the
    /// label; anything outside [`labels`](Negotiation::labels) takes the
    /// default rejection branch.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Narrative`] if settlement prose fails; the
    /// settlement is retried on a later tick.
    async fn settle(
        &mut self,
        label: &str,
        ctx: &mut ActionContext<'_>,
    ) -> Result<Settlement, ActionError>;
}

/// One actor's action, bound to its lifecycle state.
///
/// An actor holds at most one non-finished instance at a time; the
/// scheduler enforces that invariant by keying instances per actor.
pub struct ActionInstance {
    actor: ActorId,
    phase: ActionPhase,
    remaining: u64,
    action: Box<dyn Action>,
}

impl core::fmt::Debug for ActionInstance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActionInstance")
            .field("actor", &self.actor)
            .field("kind", &self.action.kind())
            .field("phase", &self.phase)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl ActionInstance {
    /// Bind an action to an actor, starting in `Idle`.
    pub fn new(actor: ActorId, action: Box<dyn Action>) -> Self {
        Self {
            actor,
            phase: ActionPhase::Idle,
            remaining: 0,
            action,
        }
    }

    /// The bound actor.
    pub const fn actor(&self) -> ActorId {
        self.actor
    }

    /// The action's class identity.
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    /// Current lifecycle phase.
    pub const fn phase(&self) -> ActionPhase {
        self.phase
    }

    /// Remaining Running ticks before finish eligibility.
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Whether the instance reached its terminal phase.
    pub const fn is_finished(&self) -> bool {
        matches!(self.phase, ActionPhase::Finished)
    }

    /// Whether the instance settles through the feedback protocol.
    pub fn is_mutual(&self) -> bool {
        self.action.is_mutual()
    }

    /// The actor whose consent this instance is waiting on, for mutual
    /// actions that have not yet settled.
    pub fn negotiation_target(&mut self) -> Option<ActorId> {
        if self.is_finished() {
            return None;
        }
        self.action.negotiation().map(|n| n.target())
    }

    /// Re-issue the feedback request of an instance already parked in
    /// `AwaitingFeedback`, so a settlement that failed transiently can
    /// collect the target's answer again on a later tick.
    pub fn pending_feedback(&mut self) -> Option<FeedbackRequest> {
        if !self.awaiting_feedback() {
            return None;
        }
        self.action.negotiation().map(|n| FeedbackRequest {
            target: n.target(),
            labels: n.labels(),
            prompt: n.prompt(),
        })
    }

    /// Run the start predicate, transparently applying the cooldown guard
    /// for classes that declare one.
    pub fn check_start(
        &mut self,
        actor: &ActorState,
        record: &mut CooldownRecord,
        ctx: &StartContext<'_>,
    ) -> StartCheck {
        if self.action.cooldown() > 0 {
            CooldownGuard::new(self.action.as_mut(), record).can_start(actor, ctx)
        } else {
            self.action.can_start(actor, ctx)
        }
    }

    /// Start the action: `Idle -> Started -> Running`.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Lifecycle`] if the instance is not `Idle`,
    /// or the action's own start error.
    pub fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError> {
        if self.phase != ActionPhase::Idle {
            return Err(self.violation("start outside Idle"));
        }
        self.phase = ActionPhase::Started;
        let announcement = self.action.start(ctx)?;
        self.remaining = self.action.duration();
        self.phase = ActionPhase::Running;
        Ok(announcement)
    }

    /// Advance duration bookkeeping by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Lifecycle`] if the instance is not `Running`.
    pub fn step(&mut self) -> Result<(), ActionError> {
        if self.phase != ActionPhase::Running {
            return Err(self.violation("step outside Running"));
        }
        self.remaining = self.remaining.saturating_sub(1);
        Ok(())
    }

    /// Whether the duration has elapsed and the instance can leave
    /// `Running` (via `finish`, or `begin_feedback` for mutual actions).
    pub const fn duration_elapsed(&self) -> bool {
        matches!(self.phase, ActionPhase::Running) && self.remaining == 0
    }

    /// Whether the instance is parked awaiting the target's feedback.
    pub const fn awaiting_feedback(&self) -> bool {
        matches!(self.phase, ActionPhase::AwaitingFeedback)
    }

    /// Finish a solo action: `Running -> Finished`.
    ///
    /// Routed through the cooldown guard when the class declares one, so
    /// a finish that fails leaves the cooldown record unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Lifecycle`] for wrong-phase calls or mutual
    /// actions (those settle through feedback), and propagates the
    /// action's own finish errors without changing phase.
    pub async fn finish(
        &mut self,
        record: &mut CooldownRecord,
        ctx: &mut ActionContext<'_>,
    ) -> Result<Vec<Event>, ActionError> {
        if !self.duration_elapsed() {
            return Err(self.violation("finish before duration elapsed"));
        }
        if self.action.is_mutual() {
            return Err(self.violation("mutual action settles through feedback"));
        }

        let events = if self.action.cooldown() > 0 {
            CooldownGuard::new(self.action.as_mut(), record)
                .finish(ctx)
                .await?
        } else {
            self.action.finish(ctx).await?
        };

        self.phase = ActionPhase::Finished;
        Ok(events)
    }

    /// Park a mutual action for feedback: `Running -> AwaitingFeedback`.
    ///
    /// Returns what the scheduler needs to collect the target's answer.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Lifecycle`] for wrong-phase calls or for
    /// actions without the negotiation capability.
    pub fn begin_feedback(&mut self) -> Result<FeedbackRequest, ActionError> {
        if !self.duration_elapsed() {
            return Err(self.violation("feedback before duration elapsed"));
        }
        let kind = self.action.kind();
        let Some(negotiation) = self.action.negotiation() else {
            return Err(ActionError::Lifecycle {
                kind,
                reason: String::from("feedback on an action without negotiation"),
            });
        };
        let request = FeedbackRequest {
            target: negotiation.target(),
            labels: negotiation.labels(),
            prompt: negotiation.prompt(),
        };
        self.phase = ActionPhase::AwaitingFeedback;
        Ok(request)
    }

    /// Settle a mutual action with the received label:
    /// `AwaitingFeedback -> Finished`. Runs exactly once per negotiation;
    /// a transient settlement failure leaves the phase untouched for a
    /// retry on a later tick.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::Lifecycle`] for wrong-phase calls, and
    /// propagates transient settlement errors.
    pub async fn settle_feedback(
        &mut self,
        label: &str,
        record: &mut CooldownRecord,
        ctx: &mut ActionContext<'_>,
    ) -> Result<Settlement, ActionError> {
        if self.phase != ActionPhase::AwaitingFeedback {
            return Err(self.violation("settle outside AwaitingFeedback"));
        }
        let kind = self.action.kind();
        let cooldown = self.action.cooldown();

        let settlement = match self.action.negotiation() {
            Some(negotiation) => negotiation.settle(label, ctx).await?,
            None => {
                return Err(ActionError::Lifecycle {
                    kind,
                    reason: String::from("settle on an action without negotiation"),
                });
            }
        };

        // Settlement is the mutual action's finish; record the cooldown
        // baseline only now that it has succeeded.
        if cooldown > 0 {
            record.mark_completed(kind, ctx.tick);
        }
        self.phase = ActionPhase::Finished;
        Ok(settlement)
    }

    fn violation(&self, reason: &str) -> ActionError {
        ActionError::Lifecycle {
            kind: self.action.kind(),
            reason: format!("{reason} (phase {:?})", self.phase),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::narrative::PlainNarrative;

    /// A three-tick solo action that counts its lifecycle calls.
    struct SlowAction {
        started: u32,
        finished: u32,
    }

    impl SlowAction {
        const fn new() -> Self {
            Self {
                started: 0,
                finished: 0,
            }
        }
    }

    #[async_trait]
    impl Action for SlowAction {
        fn kind(&self) -> ActionKind {
            ActionKind::Train
        }

        fn duration(&self) -> u64 {
            3
        }

        fn can_start(&self, _actor: &ActorState, _ctx: &StartContext<'_>) -> StartCheck {
            StartCheck::allow()
        }

        fn start(&mut self, ctx: &mut ActionContext<'_>) -> Result<Event, ActionError> {
            self.started += 1;
            Ok(Event::new(ctx.tick, "begins").with_actors([ctx.actor_id]))
        }

        async fn finish(
            &mut self,
            ctx: &mut ActionContext<'_>,
        ) -> Result<Vec<Event>, ActionError> {
            self.finished += 1;
            Ok(vec![Event::new(ctx.tick, "done").with_actors([ctx.actor_id])])
        }
    }

    struct TestWorld {
        actor: ActorId,
        actors: BTreeMap<ActorId, ActorState>,
        sites: SiteLedger,
        rng: SmallRng,
    }

    fn make_world() -> TestWorld {
        let state = ActorState::new("Mo", 960);
        let actor = state.id;
        let mut actors = BTreeMap::new();
        actors.insert(actor, state);
        TestWorld {
            actor,
            actors,
            sites: SiteLedger::default(),
            rng: SmallRng::seed_from_u64(1),
        }
    }

    fn ctx_at<'a>(world: &'a mut TestWorld, tick: u64) -> ActionContext<'a> {
        ActionContext {
            tick,
            actor_id: world.actor,
            actors: &mut world.actors,
            sites: &mut world.sites,
            rng: &mut world.rng,
            narrative: &PlainNarrative,
        }
    }

    #[tokio::test]
    async fn three_tick_action_finishes_only_after_duration() {
        let mut world = make_world();
        let actor = world.actor;
        let mut record = CooldownRecord::new();
        let mut instance = ActionInstance::new(actor, Box::new(SlowAction::new()));

        // Tick T: start + first step.
        let mut ctx = ctx_at(&mut world, 10);
        instance.start(&mut ctx).unwrap();
        instance.step().unwrap();
        assert!(!instance.duration_elapsed());

        // Tick T+1.
        instance.step().unwrap();
        assert!(!instance.duration_elapsed());

        // Tick T+2: eligible now.
        instance.step().unwrap();
        assert!(instance.duration_elapsed());

        let mut ctx = ctx_at(&mut world, 12);
        let events = instance.finish(&mut record, &mut ctx).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(instance.is_finished());
    }

    #[tokio::test]
    async fn finish_before_elapsed_is_a_violation() {
        let mut world = make_world();
        let actor = world.actor;
        let mut record = CooldownRecord::new();
        let mut instance = ActionInstance::new(actor, Box::new(SlowAction::new()));

        let mut ctx = ctx_at(&mut world, 10);
        instance.start(&mut ctx).unwrap();

        let mut ctx = ctx_at(&mut world, 10);
        let err = instance.finish(&mut record, &mut ctx).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn double_start_is_a_violation() {
        let mut world = make_world();
        let actor = world.actor;
        let mut instance = ActionInstance::new(actor, Box::new(SlowAction::new()));

        let mut ctx = ctx_at(&mut world, 10);
        instance.start(&mut ctx).unwrap();
        let mut ctx = ctx_at(&mut world, 10);
        let err = instance.start(&mut ctx).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn step_outside_running_is_a_violation() {
        let actor = ActorId::new();
        let mut instance = ActionInstance::new(actor, Box::new(SlowAction::new()));
        assert!(instance.step().unwrap_err().is_fatal());
    }

    #[test]
    fn feedback_on_solo_action_is_a_violation() {
        let actor = ActorId::new();
        let mut instance = ActionInstance::new(actor, Box::new(SlowAction::new()));
        // Not running yet: wrong phase fires first.
        assert!(instance.begin_feedback().is_err());
    }

    #[test]
    fn start_check_is_pure() {
        let mut world = make_world();
        let actor = world.actor;
        let mut record = CooldownRecord::new();
        let mut instance = ActionInstance::new(actor, Box::new(SlowAction::new()));

        let state = world.actors.get(&actor).cloned().unwrap();
        let ctx = StartContext {
            tick: 10,
            actors: &world.actors,
            sites: &world.sites,
        };
        let check = instance.check_start(&state, &mut record, &ctx);
        assert!(check.is_allowed());
        assert_eq!(instance.phase(), ActionPhase::Idle);
        assert_eq!(record, CooldownRecord::new());
    }
}
