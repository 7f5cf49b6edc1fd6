//! Per-actor cooldown bookkeeping and the guard that enforces it.
//!
//! A [`CooldownRecord`] maps action classes to the tick at which they last
//! *completed successfully*. The record is written only after a successful
//! finish -- never on failure, never preemptively -- and entries are never
//! deleted; the map grows for the actor's lifetime.
//!
//! The [`CooldownGuard`] is explicit composition: a wrapper holding a
//! reference to the underlying action and the actor's record, intercepting
//! the two relevant calls. `can_start` consults the record before the
//! action sees the request; `finish` awaits the wrapped call to completion
//! and records the tick only when it succeeded.

use std::collections::BTreeMap;

use samsara_types::{ActionKind, ActorState, Event};

use crate::error::ActionError;
use crate::lifecycle::{Action, ActionContext, StartCheck, StartContext};

/// Ticks of last successful completion per action class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownRecord {
    completed: BTreeMap<ActionKind, u64>,
}

impl CooldownRecord {
    /// Create an empty record.
    pub const fn new() -> Self {
        Self {
            completed: BTreeMap::new(),
        }
    }

    /// The tick at which `kind` last completed successfully, if ever.
    pub fn last_completed(&self, kind: ActionKind) -> Option<u64> {
        self.completed.get(&kind).copied()
    }

    /// Remaining ticks before `kind` may start again, given the class
    /// cooldown. Zero means ready.
    pub fn remaining(&self, kind: ActionKind, cooldown: u64, now: u64) -> u64 {
        match self.last_completed(kind) {
            None => 0,
            Some(last) => cooldown.saturating_sub(now.saturating_sub(last)),
        }
    }

    /// Record a successful completion of `kind` at `tick`.
    pub fn mark_completed(&mut self, kind: ActionKind, tick: u64) {
        self.completed.insert(kind, tick);
    }
}

/// Wrapper intercepting `can_start` and `finish` for actions with a
/// positive class cooldown.
pub struct CooldownGuard<'a> {
    action: &'a mut dyn Action,
    record: &'a mut CooldownRecord,
}

impl<'a> CooldownGuard<'a> {
    /// Wrap an action together with its actor's cooldown record.
    pub fn new(action: &'a mut dyn Action, record: &'a mut CooldownRecord) -> Self {
        Self { action, record }
    }

    /// Check the cooldown window, then defer to the wrapped action.
    ///
    /// While inside the window the refusal reason states the remaining
    /// tick count, which strictly decreases on each subsequent tick.
    pub fn can_start(&self, actor: &ActorState, ctx: &StartContext<'_>) -> StartCheck {
        let remaining = self
            .record
            .remaining(self.action.kind(), self.action.cooldown(), ctx.tick);
        if remaining > 0 {
            return StartCheck::refuse(format!(
                "{} is on cooldown for {remaining} more months",
                self.action.kind()
            ));
        }
        self.action.can_start(actor, ctx)
    }

    /// Await the wrapped finish, then record the completion tick.
    ///
    /// A finish that fails leaves the record unchanged.
    ///
    /// # Errors
    ///
    /// Propagates [`ActionError`] from the wrapped action.
    pub async fn finish(
        &mut self,
        ctx: &mut ActionContext<'_>,
    ) -> Result<Vec<Event>, ActionError> {
        let events = self.action.finish(ctx).await?;
        self.record.mark_completed(self.action.kind(), ctx.tick);
        Ok(events)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_is_ready() {
        let record = CooldownRecord::new();
        assert_eq!(record.remaining(ActionKind::Hunt, 2, 10), 0);
    }

    #[test]
    fn remaining_decreases_strictly_until_zero() {
        let mut record = CooldownRecord::new();
        record.mark_completed(ActionKind::Hunt, 5);

        assert_eq!(record.remaining(ActionKind::Hunt, 3, 5), 3);
        assert_eq!(record.remaining(ActionKind::Hunt, 3, 6), 2);
        assert_eq!(record.remaining(ActionKind::Hunt, 3, 7), 1);
        assert_eq!(record.remaining(ActionKind::Hunt, 3, 8), 0);
        assert_eq!(record.remaining(ActionKind::Hunt, 3, 9), 0);
    }

    #[test]
    fn classes_are_independent() {
        let mut record = CooldownRecord::new();
        record.mark_completed(ActionKind::Hunt, 5);
        assert_eq!(record.remaining(ActionKind::Train, 3, 5), 0);
        assert_eq!(record.last_completed(ActionKind::Hunt), Some(5));
        assert_eq!(record.last_completed(ActionKind::Train), None);
    }

    #[test]
    fn recompletion_moves_the_baseline() {
        let mut record = CooldownRecord::new();
        record.mark_completed(ActionKind::Hunt, 5);
        record.mark_completed(ActionKind::Hunt, 9);
        assert_eq!(record.remaining(ActionKind::Hunt, 3, 10), 2);
    }
}
