//! The unit record and its stat mutation rules.
//!
//! A unit carries its authored stats, the baseline captured at spawn, two
//! additive bonus accumulators and two multiplicative overrides. All stat
//! changes go through buffs so that every application has exactly one
//! matching reversal:
//!
//! - `damage_bonus` / `health_bonus` are sums of the active buffs' additive
//!   parts; removing a buff subtracts exactly what it added.
//! - `current_attack` / `current_move_speed` are recomputed from the
//!   baseline and the product of active multipliers whenever the buff set
//!   changes, so overlapping multiplicative buffs never drift.

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityInstance;
use crate::buffs::{Buff, BuffId, BuffSource, BuffSpec, BuffStack};
use crate::components::{
    Allegiance, Baseline, DamageOverTime, EntityId, UnitStats, UnitStatus,
};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::resource::ResourcePool;
use crate::timers::{DotId, TimedEvent, TimerQueue};

/// Anything the engine can damage.
pub trait DamageSink {
    /// Apply `amount` of damage and return the damage actually taken.
    ///
    /// The sink clamps: negative amounts deal nothing, and a sink never
    /// takes more than it has left.
    fn take_damage(&mut self, amount: Fixed) -> Fixed;

    /// Check if the sink has been defeated.
    fn is_defeated(&self) -> bool;
}

/// A combat unit driven by the ability engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Unit {
    /// Stable identifier.
    pub id: EntityId,
    /// Catalog id of the unit type.
    pub type_id: String,
    /// Side the unit fights for.
    pub allegiance: Allegiance,
    /// World position, owned by the host's placement system.
    pub position: Vec2Fixed,
    /// Normalized facing, used when an effect has no target to aim at.
    pub facing: Vec2Fixed,
    /// Current target chosen by the host, if any.
    pub target: Option<EntityId>,
    /// Lifecycle state.
    pub status: UnitStatus,
    stats: UnitStats,
    baseline: Baseline,
    #[serde(with = "fixed_serde")]
    health: Fixed,
    #[serde(with = "fixed_serde")]
    damage_bonus: Fixed,
    #[serde(with = "fixed_serde")]
    health_bonus: Fixed,
    #[serde(with = "fixed_serde")]
    current_attack: Fixed,
    #[serde(with = "fixed_serde")]
    current_move_speed: Fixed,
    buffs: BuffStack,
    timers: TimerQueue,
    dots: Vec<DamageOverTime>,
    next_dot_id: DotId,
    /// Resource pool, if the unit type declares one.
    pub resource: Option<ResourcePool>,
    /// Ability instances in slot order.
    pub abilities: Vec<AbilityInstance>,
}

impl Unit {
    /// Create an active unit at full health with its baseline captured.
    #[must_use]
    pub fn new(
        id: EntityId,
        type_id: impl Into<String>,
        allegiance: Allegiance,
        position: Vec2Fixed,
        stats: UnitStats,
    ) -> Self {
        let baseline = Baseline::capture(&stats);
        Self {
            id,
            type_id: type_id.into(),
            allegiance,
            position,
            facing: Vec2Fixed::UNIT_X,
            target: None,
            status: UnitStatus::Active,
            stats,
            baseline,
            health: stats.max_health,
            damage_bonus: Fixed::ZERO,
            health_bonus: Fixed::ZERO,
            current_attack: baseline.attack,
            current_move_speed: baseline.move_speed,
            buffs: BuffStack::new(),
            timers: TimerQueue::new(),
            dots: Vec::new(),
            next_dot_id: 1,
            resource: None,
            abilities: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Stat accessors
    // ------------------------------------------------------------------

    /// Authored stats.
    #[must_use]
    pub const fn stats(&self) -> &UnitStats {
        &self.stats
    }

    /// Baseline captured at spawn.
    #[must_use]
    pub const fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> Fixed {
        self.health
    }

    /// Authored maximum health, without bonuses.
    #[must_use]
    pub const fn max_health(&self) -> Fixed {
        self.stats.max_health
    }

    /// Maximum health including the additive health bonus.
    #[must_use]
    pub fn effective_max_health(&self) -> Fixed {
        (self.stats.max_health + self.health_bonus).max(Fixed::ZERO)
    }

    /// Additive damage bonus accumulator.
    #[must_use]
    pub const fn damage_bonus(&self) -> Fixed {
        self.damage_bonus
    }

    /// Additive health bonus accumulator.
    #[must_use]
    pub const fn health_bonus(&self) -> Fixed {
        self.health_bonus
    }

    /// Attack after multiplicative buffs.
    #[must_use]
    pub const fn current_attack(&self) -> Fixed {
        self.current_attack
    }

    /// Move speed after multiplicative buffs.
    #[must_use]
    pub const fn current_move_speed(&self) -> Fixed {
        self.current_move_speed
    }

    /// Damage this unit deals per hit: multiplied attack plus the additive bonus.
    #[must_use]
    pub fn effective_attack(&self) -> Fixed {
        (self.current_attack + self.damage_bonus).max(Fixed::ZERO)
    }

    /// Health as a fraction of effective maximum health (0 when max is 0).
    #[must_use]
    pub fn health_fraction(&self) -> Fixed {
        let max = self.effective_max_health();
        if max == Fixed::ZERO {
            Fixed::ZERO
        } else {
            self.health / max
        }
    }

    /// Check if the unit is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Set current health, clamped to `[0, effective max]`.
    pub fn set_health(&mut self, health: Fixed) {
        self.health = health.clamp(Fixed::ZERO, self.effective_max_health());
    }

    /// Set authored maximum health, clamping current health to the new bound.
    pub fn set_max_health(&mut self, max_health: Fixed) {
        self.stats.max_health = max_health.max(Fixed::ZERO);
        self.clamp_health();
    }

    /// Replace the authored attack and move speed.
    ///
    /// This also moves the baseline, so active multiplicative buffs are
    /// re-evaluated against the new values.
    pub fn rebase_stats(&mut self, attack: Fixed, move_speed: Fixed) {
        self.stats.base_attack = attack.max(Fixed::ZERO);
        self.stats.base_move_speed = move_speed.max(Fixed::ZERO);
        self.baseline = Baseline::capture(&self.stats);
        self.recompute_overrides();
    }

    // ------------------------------------------------------------------
    // Buffs
    // ------------------------------------------------------------------

    /// Active buffs.
    #[must_use]
    pub const fn buffs(&self) -> &BuffStack {
        &self.buffs
    }

    /// Apply a buff and mutate stats once.
    ///
    /// A timed buff (`expires_at` is `Some`) schedules its own expiry.
    pub fn apply_buff(
        &mut self,
        source: BuffSource,
        spec: BuffSpec,
        expires_at: Option<Fixed>,
    ) -> BuffId {
        let buff = self.buffs.push(source, spec, expires_at);

        self.damage_bonus += buff.damage_bonus;
        self.health_bonus += buff.health_bonus;
        if buff.health_bonus > Fixed::ZERO {
            self.health += buff.health_bonus;
        }
        self.recompute_overrides();
        self.clamp_health();

        if let Some(at) = expires_at {
            self.timers
                .schedule(at, TimedEvent::BuffExpiry { buff: buff.id });
        }

        tracing::trace!(unit = self.id, buff = buff.id, caster = source.caster, "buff applied");
        buff.id
    }

    /// Remove a buff, reverting exactly the delta it applied.
    ///
    /// Returns `false` (and changes nothing) if the buff is already gone.
    pub fn remove_buff(&mut self, id: BuffId) -> bool {
        let Some(buff) = self.buffs.remove(id) else {
            return false;
        };
        self.timers
            .cancel_where(|event| *event == TimedEvent::BuffExpiry { buff: id });
        self.revert(&[buff]);
        true
    }

    /// Remove every buff granted by `source`.
    pub fn remove_buffs_from_source(&mut self, source: BuffSource) -> usize {
        let removed = self.buffs.remove_from_source(source);
        self.forget_buffs(&removed)
    }

    /// Remove every buff granted by any ability of `caster`.
    pub fn remove_buffs_from_caster(&mut self, caster: EntityId) -> usize {
        let removed = self.buffs.remove_from_caster(caster);
        self.forget_buffs(&removed)
    }

    fn forget_buffs(&mut self, removed: &[Buff]) -> usize {
        if removed.is_empty() {
            return 0;
        }
        self.timers.cancel_where(|event| match event {
            TimedEvent::BuffExpiry { buff } => removed.iter().any(|b| b.id == *buff),
            _ => false,
        });
        self.revert(removed);
        removed.len()
    }

    fn revert(&mut self, removed: &[Buff]) {
        for buff in removed {
            self.damage_bonus -= buff.damage_bonus;
            self.health_bonus -= buff.health_bonus;
            if buff.health_bonus > Fixed::ZERO && self.health > Fixed::ZERO {
                // Take back the granted health, but never defeat the unit.
                let floor = self.health.min(Fixed::ONE);
                self.health = (self.health - buff.health_bonus).max(floor);
            }
            tracing::trace!(unit = self.id, buff = buff.id, "buff reverted");
        }
        self.recompute_overrides();
        self.clamp_health();
    }

    fn recompute_overrides(&mut self) {
        self.current_attack = self
            .baseline
            .attack
            .saturating_mul(self.buffs.damage_multiplier())
            .max(Fixed::ZERO);
        self.current_move_speed = self
            .baseline
            .move_speed
            .saturating_mul(self.buffs.speed_multiplier())
            .max(Fixed::ZERO);
    }

    fn clamp_health(&mut self) {
        self.health = self.health.clamp(Fixed::ZERO, self.effective_max_health());
    }

    // ------------------------------------------------------------------
    // Timers and damage over time
    // ------------------------------------------------------------------

    /// Pending timed events.
    #[must_use]
    pub const fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub(crate) fn timers_mut(&mut self) -> &mut TimerQueue {
        &mut self.timers
    }

    /// Damage-over-time effects currently riding on this unit.
    #[must_use]
    pub fn dots(&self) -> &[DamageOverTime] {
        &self.dots
    }

    /// Start a damage-over-time effect, or refresh the one `source` already has here.
    ///
    /// The first tick lands one `interval` from `now`.
    pub fn apply_dot(
        &mut self,
        source: BuffSource,
        damage_per_tick: Fixed,
        interval: Fixed,
        now: Fixed,
        duration: Fixed,
    ) -> DotId {
        let expires_at = now + duration;

        if let Some(existing) = self.dots.iter_mut().find(|dot| dot.source == source) {
            existing.damage_per_tick = damage_per_tick;
            existing.expires_at = expires_at;
            return existing.id;
        }

        let id = self.next_dot_id;
        self.next_dot_id += 1;
        self.dots.push(DamageOverTime {
            id,
            source,
            damage_per_tick,
            interval,
            expires_at,
        });
        self.timers
            .schedule(now + interval, TimedEvent::DotTick { dot: id });
        id
    }

    /// Run one damage-over-time tick that is due at `now`.
    ///
    /// Reschedules the next tick while the effect lasts and drops the record
    /// once it has run out. Returns the source and the damage taken.
    pub fn fire_dot(&mut self, id: DotId, now: Fixed) -> Option<(BuffSource, Fixed)> {
        let index = self.dots.iter().position(|dot| dot.id == id)?;
        let dot = self.dots[index];

        let dealt = if now <= dot.expires_at {
            self.take_damage(dot.damage_per_tick)
        } else {
            Fixed::ZERO
        };

        let next = now + dot.interval;
        if next <= dot.expires_at && self.is_active() {
            self.timers.schedule(next, TimedEvent::DotTick { dot: id });
        } else {
            self.dots.remove(index);
        }

        Some((dot.source, dealt))
    }

    /// Cancel every damage-over-time effect applied by `caster`.
    pub fn cancel_dots_from(&mut self, caster: EntityId) -> usize {
        let (removed, kept): (Vec<DamageOverTime>, Vec<DamageOverTime>) = self
            .dots
            .drain(..)
            .partition(|dot| dot.source.caster == caster);
        self.dots = kept;
        self.timers.cancel_where(|event| match event {
            TimedEvent::DotTick { dot } => removed.iter().any(|d| d.id == *dot),
            _ => false,
        });
        removed.len()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Restore health, clamped to effective max. Returns the amount healed.
    ///
    /// A revived unit healed back to full keeps living: its lapse timer is
    /// cancelled.
    pub fn heal(&mut self, amount: Fixed) -> Fixed {
        if !self.is_active() || amount <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let before = self.health;
        self.set_health(self.health.saturating_add(amount));
        let healed = self.health - before;

        if self.health >= self.effective_max_health()
            && self.timers.cancel_where(|event| *event == TimedEvent::RevivalLapse) > 0
        {
            tracing::debug!(unit = self.id, "revival made permanent by healing");
        }
        healed
    }

    /// Bring a defeated unit back with `health`.
    ///
    /// With `lapse_at` set, the unit is defeated again at that time unless
    /// something else happens to it first. Returns `false` if the unit was
    /// not defeated.
    pub fn revive(&mut self, health: Fixed, lapse_at: Option<Fixed>) -> bool {
        if !self.status.is_defeated() {
            return false;
        }
        self.status = UnitStatus::Active;
        self.set_health(health.max(Fixed::from_bits(1)));
        if let Some(at) = lapse_at {
            self.timers.schedule(at, TimedEvent::RevivalLapse);
        }
        true
    }

    /// Check if the unit is on a revival countdown.
    #[must_use]
    pub fn is_revived(&self) -> bool {
        self.timers.contains(&TimedEvent::RevivalLapse)
    }

    /// Mark the unit defeated and drop everything scheduled on it.
    ///
    /// Clears incoming damage over time, every pending timer and every buff
    /// (reverting their stat deltas), and resets the pool's overdrive state.
    pub fn mark_defeated(&mut self) {
        self.status = UnitStatus::Defeated;
        self.health = Fixed::ZERO;
        self.target = None;
        self.timers.clear();
        self.dots.clear();
        let removed = self.buffs.clear();
        self.revert(&removed);
        if let Some(pool) = self.resource.as_mut() {
            pool.reset_overdrive();
        }
    }

    /// Take the unit out of play on behalf of `absorbed_by`.
    pub fn disable(&mut self, absorbed_by: EntityId) {
        self.status = UnitStatus::Disabled { absorbed_by };
        self.target = None;
    }

    /// Return a disabled unit to play. Returns `false` if it was not disabled.
    pub fn enable(&mut self) -> bool {
        if matches!(self.status, UnitStatus::Disabled { .. }) {
            self.status = UnitStatus::Active;
            true
        } else {
            false
        }
    }
}

impl DamageSink for Unit {
    fn take_damage(&mut self, amount: Fixed) -> Fixed {
        if !self.is_active() || amount <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let actual = amount.min(self.health);
        self.health -= actual;
        actual
    }

    fn is_defeated(&self) -> bool {
        self.status.is_defeated() || (self.is_active() && self.health <= Fixed::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn test_unit() -> Unit {
        Unit::new(
            1,
            "test",
            Allegiance::Friendly,
            Vec2Fixed::ZERO,
            UnitStats::new(fx(10), fx(4), fx(100)),
        )
    }

    const SOURCE: BuffSource = BuffSource::new(9, 0);

    #[test]
    fn test_new_unit_full_health_and_baseline() {
        let unit = test_unit();
        assert_eq!(unit.health(), fx(100));
        assert_eq!(unit.current_attack(), fx(10));
        assert_eq!(unit.baseline().move_speed, fx(4));
        assert!(unit.is_active());
    }

    #[test]
    fn test_additive_buff_round_trip() {
        let mut unit = test_unit();
        let id = unit.apply_buff(SOURCE, BuffSpec::bonuses(fx(50), fx(20)), None);
        assert_eq!(unit.damage_bonus(), fx(20));
        assert_eq!(unit.effective_max_health(), fx(150));
        assert_eq!(unit.health(), fx(150));
        assert_eq!(unit.effective_attack(), fx(30));

        assert!(unit.remove_buff(id));
        assert_eq!(unit.damage_bonus(), fx(0));
        assert_eq!(unit.health(), fx(100));

        // Double removal is a no-op.
        assert!(!unit.remove_buff(id));
        assert_eq!(unit.damage_bonus(), fx(0));
    }

    #[test]
    fn test_multiplicative_buffs_restore_baseline_in_any_order() {
        let mut unit = test_unit();
        let pack = unit.apply_buff(SOURCE, BuffSpec::multipliers(fx(2), fx(2)), None);
        let formation = unit.apply_buff(
            BuffSource::new(9, 1),
            BuffSpec::multipliers(Fixed::from_num(1.5), Fixed::from_num(1.25)),
            None,
        );
        assert_eq!(unit.current_move_speed(), fx(12));
        assert_eq!(unit.current_attack(), Fixed::from_num(25));

        unit.remove_buff(pack);
        assert_eq!(unit.current_move_speed(), fx(6));
        unit.remove_buff(formation);
        assert_eq!(unit.current_move_speed(), fx(4));
        assert_eq!(unit.current_attack(), fx(10));
    }

    #[test]
    fn test_timed_buff_schedules_expiry() {
        let mut unit = test_unit();
        let id = unit.apply_buff(SOURCE, BuffSpec::damage(fx(5)), Some(fx(3)));
        assert!(unit
            .timers()
            .contains(&TimedEvent::BuffExpiry { buff: id }));

        unit.remove_buff(id);
        assert!(unit.timers().is_empty());
    }

    #[test]
    fn test_take_damage_clamps() {
        let mut unit = test_unit();
        assert_eq!(unit.take_damage(fx(30)), fx(30));
        assert_eq!(unit.take_damage(fx(-5)), fx(0));
        assert_eq!(unit.take_damage(fx(500)), fx(70));
        assert!(unit.is_defeated());
    }

    #[test]
    fn test_removing_health_buff_takes_back_granted_health() {
        let mut unit = test_unit();
        unit.take_damage(fx(75));
        let id = unit.apply_buff(SOURCE, BuffSpec::bonuses(fx(100), fx(0)), None);
        assert_eq!(unit.health(), fx(125));
        unit.take_damage(fx(20));

        unit.remove_buff(id);
        assert_eq!(unit.health(), fx(5));
        assert_eq!(unit.effective_max_health(), fx(100));

        // Toggling again is not a heal.
        let id = unit.apply_buff(SOURCE, BuffSpec::bonuses(fx(100), fx(0)), None);
        unit.remove_buff(id);
        assert_eq!(unit.health(), fx(5));
    }

    #[test]
    fn test_removing_health_buff_never_defeats() {
        let mut unit = test_unit();
        let id = unit.apply_buff(SOURCE, BuffSpec::bonuses(fx(100), fx(0)), None);
        unit.take_damage(fx(195));
        assert_eq!(unit.health(), fx(5));

        unit.remove_buff(id);
        assert_eq!(unit.health(), fx(1));
        assert!(unit.is_active());
        assert!(!unit.is_defeated());
    }

    #[test]
    fn test_mark_defeated_clears_everything() {
        let mut unit = test_unit();
        unit.apply_buff(SOURCE, BuffSpec::damage(fx(5)), Some(fx(10)));
        unit.apply_dot(SOURCE, fx(3), fx(1), fx(0), fx(5));
        unit.mark_defeated();

        assert!(unit.status.is_defeated());
        assert!(unit.buffs().is_empty());
        assert!(unit.timers().is_empty());
        assert!(unit.dots().is_empty());
        assert_eq!(unit.damage_bonus(), fx(0));
        assert_eq!(unit.health(), fx(0));
    }

    #[test]
    fn test_dot_refreshes_instead_of_stacking() {
        let mut unit = test_unit();
        let first = unit.apply_dot(SOURCE, fx(3), fx(1), fx(0), fx(3));
        let second = unit.apply_dot(SOURCE, fx(3), fx(1), fx(2), fx(3));
        assert_eq!(first, second);
        assert_eq!(unit.dots().len(), 1);
        assert_eq!(unit.dots()[0].expires_at, fx(5));
    }

    #[test]
    fn test_fire_dot_runs_until_expiry() {
        let mut unit = test_unit();
        let id = unit.apply_dot(SOURCE, fx(4), fx(1), fx(0), fx(3));

        for now in 1..=3 {
            let event = unit.timers_mut().pop_due(fx(now)).unwrap();
            assert_eq!(event.event, TimedEvent::DotTick { dot: id });
            let (_, dealt) = unit.fire_dot(id, fx(now)).unwrap();
            assert_eq!(dealt, fx(4));
        }
        assert!(unit.dots().is_empty());
        assert!(unit.timers().is_empty());
        assert_eq!(unit.health(), fx(88));
    }

    #[test]
    fn test_cancel_dots_from_caster() {
        let mut unit = test_unit();
        unit.apply_dot(BuffSource::new(5, 0), fx(4), fx(1), fx(0), fx(3));
        unit.apply_dot(BuffSource::new(6, 0), fx(4), fx(1), fx(0), fx(3));
        assert_eq!(unit.cancel_dots_from(5), 1);
        assert_eq!(unit.dots().len(), 1);
        assert_eq!(unit.timers().len(), 1);
    }

    #[test]
    fn test_revive_and_heal_to_full_cancels_lapse() {
        let mut unit = test_unit();
        unit.mark_defeated();
        assert!(unit.revive(fx(30), Some(fx(10))));
        assert!(unit.is_revived());
        assert!(!unit.revive(fx(30), None));

        unit.heal(fx(20));
        assert!(unit.is_revived());
        unit.heal(fx(100));
        assert_eq!(unit.health(), fx(100));
        assert!(!unit.is_revived());
    }

    #[test]
    fn test_disabled_unit_takes_no_damage() {
        let mut unit = test_unit();
        unit.disable(7);
        assert_eq!(unit.take_damage(fx(10)), fx(0));
        assert!(unit.enable());
        assert!(!unit.enable());
    }

    proptest! {
        /// Additive buffs commute: whatever else is applied and removed in
        /// between, expiring a buff restores the accumulator exactly.
        #[test]
        fn prop_additive_buff_symmetry(
            amount in -50i32..50,
            others in proptest::collection::vec((-100i32..100, any::<bool>()), 0..20),
        ) {
            let mut unit = test_unit();
            let before = unit.damage_bonus();
            let buff = unit.apply_buff(SOURCE, BuffSpec::damage(fx(amount)), None);

            let mut pending = Vec::new();
            for (magnitude, remove_now) in others {
                let id = unit.apply_buff(BuffSource::new(2, 0), BuffSpec::damage(fx(magnitude)), None);
                if remove_now {
                    unit.remove_buff(id);
                } else {
                    pending.push(id);
                }
            }
            unit.remove_buff(buff);
            for id in pending {
                unit.remove_buff(id);
            }

            prop_assert_eq!(unit.damage_bonus(), before);
            prop_assert_eq!(unit.current_attack(), unit.baseline().attack);
        }
    }
}
