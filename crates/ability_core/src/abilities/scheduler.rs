//! Cooldown and trigger-condition state machine.
//!
//! ```text
//!                 elapsed >= cooldown
//!   CooldownWaiting ─────────────────▶ Ready
//!         ▲                              │ target present and cost paid
//!         └──────────── Triggered ◀──────┘
//! ```
//!
//! A failed trigger leaves the scheduler `Ready`; nothing is spent and the
//! cooldown does not restart.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, option_fixed_serde, Fixed};
use crate::resource::ResourcePool;

/// Persistent scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Misconfigured; never becomes ready.
    Disabled,
    /// Waiting for the cooldown to elapse.
    CooldownWaiting,
    /// Waiting for a trigger condition.
    Ready,
}

/// Result of one trigger attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOutcome {
    /// The ability is disabled.
    Disabled,
    /// Cooldown still running.
    CoolingDown,
    /// Ready, but nothing to act on.
    NoTarget,
    /// Ready with a target, but the pool cannot pay.
    InsufficientResource,
    /// Cost paid and cooldown restarted. The caller resolves the effect.
    Triggered,
}

impl TriggerOutcome {
    /// Check if the effect should be resolved.
    #[must_use]
    pub const fn fired(self) -> bool {
        matches!(self, Self::Triggered)
    }
}

/// Per-ability cooldown gate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityScheduler {
    #[serde(with = "fixed_serde")]
    cooldown: Fixed,
    #[serde(with = "fixed_serde")]
    cost: Fixed,
    #[serde(with = "option_fixed_serde")]
    last_use: Option<Fixed>,
    #[serde(with = "fixed_serde")]
    cooldown_start: Fixed,
    state: SchedulerState,
}

impl AbilityScheduler {
    /// Create a scheduler at simulation time `now`.
    ///
    /// Unless `starts_ready` is set, the first use waits one full cooldown.
    #[must_use]
    pub fn new(cooldown: Fixed, cost: Fixed, now: Fixed, starts_ready: bool) -> Self {
        let state = if starts_ready || cooldown <= Fixed::ZERO {
            SchedulerState::Ready
        } else {
            SchedulerState::CooldownWaiting
        };
        Self {
            cooldown,
            cost,
            last_use: None,
            cooldown_start: now,
            state,
        }
    }

    /// Create a scheduler that never becomes ready.
    #[must_use]
    pub fn disabled(cooldown: Fixed, cost: Fixed) -> Self {
        Self {
            cooldown,
            cost,
            last_use: None,
            cooldown_start: Fixed::ZERO,
            state: SchedulerState::Disabled,
        }
    }

    /// Current state, as of the last [`advance`](Self::advance).
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Time of the last successful trigger.
    #[must_use]
    pub const fn last_use(&self) -> Option<Fixed> {
        self.last_use
    }

    /// Resource cost per use.
    #[must_use]
    pub const fn cost(&self) -> Fixed {
        self.cost
    }

    /// Check if the scheduler is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.state == SchedulerState::Disabled
    }

    /// Move to `Ready` once the cooldown has elapsed at `now`.
    pub fn advance(&mut self, now: Fixed) -> SchedulerState {
        if self.state == SchedulerState::CooldownWaiting
            && now.saturating_sub(self.cooldown_start) >= self.cooldown
        {
            self.state = SchedulerState::Ready;
        }
        self.state
    }

    /// Check if a trigger attempt at `now` would get past the cooldown.
    pub fn is_ready(&mut self, now: Fixed) -> bool {
        self.advance(now) == SchedulerState::Ready
    }

    /// Attempt to fire at `now`.
    ///
    /// The target check comes first, so an attempt without a target never
    /// touches the pool. A cost-free ability needs no pool.
    pub fn try_trigger(
        &mut self,
        now: Fixed,
        has_target: bool,
        pool: Option<&mut ResourcePool>,
    ) -> TriggerOutcome {
        match self.advance(now) {
            SchedulerState::Disabled => return TriggerOutcome::Disabled,
            SchedulerState::CooldownWaiting => return TriggerOutcome::CoolingDown,
            SchedulerState::Ready => {}
        }
        if !has_target {
            return TriggerOutcome::NoTarget;
        }
        if self.cost > Fixed::ZERO {
            let paid = pool.is_some_and(|pool| pool.spend(self.cost));
            if !paid {
                return TriggerOutcome::InsufficientResource;
            }
        }

        self.last_use = Some(now);
        self.cooldown_start = now;
        self.state = SchedulerState::CooldownWaiting;
        TriggerOutcome::Triggered
    }

    /// Disable the scheduler permanently.
    pub fn disable(&mut self) {
        self.state = SchedulerState::Disabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    #[test]
    fn test_starts_cooling_down() {
        let mut scheduler = AbilityScheduler::new(fx(3), fx(0), fx(0), false);
        assert_eq!(scheduler.try_trigger(fx(2), true, None), TriggerOutcome::CoolingDown);
        assert_eq!(scheduler.try_trigger(fx(3), true, None), TriggerOutcome::Triggered);
        assert_eq!(scheduler.last_use(), Some(fx(3)));
        assert_eq!(scheduler.state(), SchedulerState::CooldownWaiting);
    }

    #[test]
    fn test_starts_ready() {
        let mut scheduler = AbilityScheduler::new(fx(3), fx(0), fx(0), true);
        assert!(scheduler.try_trigger(fx(0), true, None).fired());
        assert_eq!(scheduler.try_trigger(fx(1), true, None), TriggerOutcome::CoolingDown);
    }

    #[test]
    fn test_no_target_keeps_ready_and_pool() {
        let mut pool = ResourcePool::new(fx(100), fx(0), fx(0)).with_current(fx(50));
        let mut scheduler = AbilityScheduler::new(fx(3), fx(20), fx(0), true);

        let outcome = scheduler.try_trigger(fx(5), false, Some(&mut pool));
        assert_eq!(outcome, TriggerOutcome::NoTarget);
        assert_eq!(scheduler.state(), SchedulerState::Ready);
        assert_eq!(pool.current(), fx(50));
    }

    #[test]
    fn test_insufficient_resource_does_not_consume_cooldown() {
        let mut pool = ResourcePool::new(fx(100), fx(0), fx(0)).with_current(fx(10));
        let mut scheduler = AbilityScheduler::new(fx(3), fx(20), fx(0), true);

        let outcome = scheduler.try_trigger(fx(1), true, Some(&mut pool));
        assert_eq!(outcome, TriggerOutcome::InsufficientResource);
        assert_eq!(scheduler.state(), SchedulerState::Ready);
        assert_eq!(scheduler.last_use(), None);
        assert_eq!(pool.current(), fx(10));

        pool.restore(fx(15));
        assert!(scheduler.try_trigger(fx(2), true, Some(&mut pool)).fired());
        assert_eq!(pool.current(), fx(5));
    }

    #[test]
    fn test_cost_without_pool_never_fires() {
        let mut scheduler = AbilityScheduler::new(fx(0), fx(5), fx(0), true);
        assert_eq!(
            scheduler.try_trigger(fx(0), true, None),
            TriggerOutcome::InsufficientResource
        );
    }

    #[test]
    fn test_disabled_never_ready() {
        let mut scheduler = AbilityScheduler::disabled(fx(0), fx(0));
        assert!(!scheduler.is_ready(fx(100)));
        assert_eq!(scheduler.try_trigger(fx(100), true, None), TriggerOutcome::Disabled);

        let mut scheduler = AbilityScheduler::new(fx(1), fx(0), fx(0), true);
        scheduler.disable();
        assert!(scheduler.is_disabled());
    }

    #[test]
    fn test_zero_cooldown_fires_every_attempt() {
        let mut scheduler = AbilityScheduler::new(fx(0), fx(0), fx(0), false);
        for now in 0..5 {
            assert!(scheduler.try_trigger(fx(now), true, None).fired());
        }
    }
}
