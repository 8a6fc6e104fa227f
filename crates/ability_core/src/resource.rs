//! Regenerating, consumable resource pools.
//!
//! A pool is a bounded scalar (mana, energy, charge, heat, water) that
//! regenerates while the unit is in its normal state. Pools with
//! thresholds also run a two-state hysteresis machine:
//!
//! ```text
//!            current >= high
//!   Normal ───────────────────▶ Overdrive
//!     ▲    (regen each tick)       │ (consume each tick)
//!     └────────────────────────────┘
//!            current < low
//! ```
//!
//! `low` defaults to `high`, in which case the same value is both the
//! entry and the exit condition.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// Transition reported by [`ResourcePool::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolTransition {
    /// State did not change.
    None,
    /// The pool crossed its high threshold while regenerating.
    EnteredOverdrive,
    /// The pool fell below its low threshold while draining.
    ExitedOverdrive,
}

/// Entry/exit thresholds of the overdrive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Thresholds {
    /// Entering overdrive requires `current >= high`.
    #[serde(with = "fixed_serde")]
    pub high: Fixed,
    /// Leaving overdrive requires `current < low`.
    #[serde(with = "fixed_serde")]
    pub low: Fixed,
}

/// A bounded resource with passive regeneration and consumption.
///
/// Invariant: `0 <= current <= max` after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePool {
    #[serde(with = "fixed_serde")]
    current: Fixed,
    #[serde(with = "fixed_serde")]
    max: Fixed,
    /// Gain per second while not in overdrive.
    #[serde(with = "fixed_serde")]
    regen_rate: Fixed,
    /// Drain per second while in overdrive.
    #[serde(with = "fixed_serde")]
    consume_rate: Fixed,
    thresholds: Option<Thresholds>,
    overdrive_active: bool,
}

impl ResourcePool {
    /// Create an empty pool without overdrive thresholds.
    #[must_use]
    pub fn new(max: Fixed, regen_rate: Fixed, consume_rate: Fixed) -> Self {
        Self {
            current: Fixed::ZERO,
            max: max.max(Fixed::ZERO),
            regen_rate,
            consume_rate,
            thresholds: None,
            overdrive_active: false,
        }
    }

    /// Builder method to enable overdrive with a single shared threshold.
    #[must_use]
    pub fn with_threshold(self, threshold: Fixed) -> Self {
        self.with_thresholds(threshold, threshold)
    }

    /// Builder method to enable overdrive with separate entry/exit thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, high: Fixed, low: Fixed) -> Self {
        self.thresholds = Some(Thresholds { high, low });
        self
    }

    /// Builder method to set the starting amount (clamped to the pool).
    #[must_use]
    pub fn with_current(mut self, current: Fixed) -> Self {
        self.current = current.clamp(Fixed::ZERO, self.max);
        self
    }

    /// Current amount.
    #[must_use]
    pub const fn current(&self) -> Fixed {
        self.current
    }

    /// Capacity.
    #[must_use]
    pub const fn max(&self) -> Fixed {
        self.max
    }

    /// Configured thresholds, if the pool drives an overdrive state.
    #[must_use]
    pub const fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    /// Whether the pool is in its overdrive state.
    #[must_use]
    pub const fn is_overdrive_active(&self) -> bool {
        self.overdrive_active
    }

    /// Advance regeneration or consumption by `dt` seconds.
    pub fn tick(&mut self, dt: Fixed) -> PoolTransition {
        if self.overdrive_active {
            let drained = self.current - self.consume_rate.saturating_mul(dt);
            self.current = drained.max(Fixed::ZERO);

            let below_exit = self
                .thresholds
                .map_or(true, |thresholds| self.current < thresholds.low);
            if below_exit {
                self.overdrive_active = false;
                return PoolTransition::ExitedOverdrive;
            }
        } else {
            let filled = self.current.saturating_add(self.regen_rate.saturating_mul(dt));
            self.current = filled.min(self.max);

            if let Some(thresholds) = self.thresholds {
                if self.current >= thresholds.high {
                    self.overdrive_active = true;
                    return PoolTransition::EnteredOverdrive;
                }
            }
        }

        PoolTransition::None
    }

    /// Deduct `amount` if the pool holds at least that much.
    ///
    /// Returns `false` and leaves the pool untouched otherwise; there is no
    /// partial spend.
    pub fn spend(&mut self, amount: Fixed) -> bool {
        if amount < Fixed::ZERO || self.current < amount {
            return false;
        }
        self.current -= amount;
        true
    }

    /// Add `amount`, clamped to the pool.
    pub fn restore(&mut self, amount: Fixed) {
        self.current = self
            .current
            .saturating_add(amount.max(Fixed::ZERO))
            .min(self.max);
    }

    /// Force the pool back to its normal state without touching `current`.
    ///
    /// Returns `true` if overdrive was active.
    pub fn reset_overdrive(&mut self) -> bool {
        std::mem::replace(&mut self.overdrive_active, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn overdrive_pool() -> ResourcePool {
        ResourcePool::new(fx(100), fx(5), fx(2)).with_threshold(fx(80))
    }

    #[test]
    fn test_regen_clamps_to_max() {
        let mut pool = ResourcePool::new(fx(10), fx(4), fx(0));
        for _ in 0..5 {
            pool.tick(fx(1));
        }
        assert_eq!(pool.current(), fx(10));
        assert!(!pool.is_overdrive_active());
    }

    #[test]
    fn test_zero_rates_never_change() {
        let mut pool = ResourcePool::new(fx(50), fx(0), fx(0)).with_current(fx(20));
        for _ in 0..10 {
            assert_eq!(pool.tick(fx(1)), PoolTransition::None);
        }
        assert_eq!(pool.current(), fx(20));
    }

    #[test]
    fn test_spend_is_all_or_nothing() {
        let mut pool = ResourcePool::new(fx(100), fx(0), fx(0)).with_current(fx(30));
        assert!(!pool.spend(fx(31)));
        assert_eq!(pool.current(), fx(30));
        assert!(pool.spend(fx(30)));
        assert_eq!(pool.current(), fx(0));
        assert!(!pool.spend(fx(-1)));
    }

    #[test]
    fn test_overdrive_cycle_tick_indices() {
        let mut pool = overdrive_pool();
        let mut entered_at = None;
        let mut exited_at = None;

        for tick in 1..=20u32 {
            match pool.tick(fx(1)) {
                PoolTransition::EnteredOverdrive if entered_at.is_none() => entered_at = Some(tick),
                PoolTransition::ExitedOverdrive if exited_at.is_none() => exited_at = Some(tick),
                _ => {}
            }
            if tick == 16 {
                assert_eq!(pool.current(), fx(80));
                assert!(pool.is_overdrive_active());
            }
        }

        assert_eq!(entered_at, Some(16));
        // 80 - 2 = 78 < 80 on the very next tick.
        assert_eq!(exited_at, Some(17));
    }

    #[test]
    fn test_hysteresis_stays_active_above_low_threshold() {
        let mut pool = ResourcePool::new(fx(100), fx(10), fx(5))
            .with_thresholds(fx(80), fx(60))
            .with_current(fx(75));

        assert_eq!(pool.tick(fx(1)), PoolTransition::EnteredOverdrive);
        assert_eq!(pool.current(), fx(85));

        // 85 -> 80 -> 75 -> 70 -> 65 -> 60 all stay active (not below 60)
        for _ in 0..5 {
            assert_eq!(pool.tick(fx(1)), PoolTransition::None);
            assert!(pool.is_overdrive_active());
        }
        assert_eq!(pool.current(), fx(60));
        assert_eq!(pool.tick(fx(1)), PoolTransition::ExitedOverdrive);
        assert_eq!(pool.current(), fx(55));
    }

    #[test]
    fn test_threshold_at_max_requires_full_pool() {
        let mut pool = ResourcePool::new(fx(100), fx(30), fx(10)).with_threshold(fx(100));
        assert_eq!(pool.tick(fx(1)), PoolTransition::None);
        assert_eq!(pool.tick(fx(1)), PoolTransition::None);
        assert_eq!(pool.tick(fx(1)), PoolTransition::None);
        assert_eq!(pool.tick(fx(1)), PoolTransition::EnteredOverdrive);
        assert_eq!(pool.current(), fx(100));
    }

    #[test]
    fn test_pool_without_thresholds_never_enters_overdrive() {
        let mut pool = ResourcePool::new(fx(10), fx(10), fx(1));
        assert_eq!(pool.tick(fx(5)), PoolTransition::None);
        assert!(!pool.is_overdrive_active());
    }

    proptest! {
        #[test]
        fn prop_pool_stays_in_bounds(
            max in 1i32..500,
            regen in 0i32..50,
            consume in 0i32..50,
            threshold_pct in 0i32..=100,
            ops in proptest::collection::vec((any::<bool>(), 0i32..200), 0..100),
        ) {
            let threshold = Fixed::from_num(max) * Fixed::from_num(threshold_pct) / Fixed::from_num(100);
            let mut pool = ResourcePool::new(fx(max), fx(regen), fx(consume)).with_threshold(threshold);

            for (is_tick, amount) in ops {
                if is_tick {
                    pool.tick(Fixed::from_num(amount) / Fixed::from_num(20));
                } else {
                    pool.spend(fx(amount));
                }
                prop_assert!(pool.current() >= Fixed::ZERO);
                prop_assert!(pool.current() <= pool.max());
            }
        }
    }
}
