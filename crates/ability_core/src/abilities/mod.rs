//! Ability instances bound to units.
//!
//! An [`AbilityInstance`] pairs immutable [`AbilityData`] with the runtime
//! state the engine keeps for it: the cooldown [`AbilityScheduler`], the
//! standing buffs it currently grants, and the allies it has absorbed.
//! Everything an instance grants carries its [`BuffSource`], so
//! deactivating the instance can strip it from every unit at once.

mod scheduler;

use serde::{Deserialize, Serialize};

use crate::buffs::{BuffId, BuffSource};
use crate::components::EntityId;
use crate::data::{AbilityCategory, AbilityData};
use crate::math::Fixed;

pub use scheduler::{AbilityScheduler, SchedulerState, TriggerOutcome};

/// Whether an instance currently holds standing effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    /// Nothing granted.
    Idle,
    /// At least one standing buff or absorbed ally.
    Active,
}

/// A standing buff an ability instance keeps on one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    /// Unit carrying the buff.
    pub target: EntityId,
    /// Buff on that unit.
    pub buff: BuffId,
}

/// One ability on one unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityInstance {
    /// Index on the owning unit.
    pub slot: u8,
    /// Authored definition.
    pub config: AbilityData,
    /// Cooldown gate. Only triggered abilities consult it.
    pub scheduler: AbilityScheduler,
    grants: Vec<Grant>,
    absorbed: Vec<EntityId>,
}

impl AbilityInstance {
    /// Bind `config` to a slot at simulation time `now`.
    #[must_use]
    pub fn new(slot: u8, config: AbilityData, now: Fixed) -> Self {
        let scheduler =
            AbilityScheduler::new(config.cooldown, config.cost, now, config.starts_ready);
        Self {
            slot,
            config,
            scheduler,
            grants: Vec::new(),
            absorbed: Vec::new(),
        }
    }

    /// Bind `config` to a slot with its scheduler disabled.
    #[must_use]
    pub fn disabled(slot: u8, config: AbilityData) -> Self {
        let scheduler = AbilityScheduler::disabled(config.cooldown, config.cost);
        Self {
            slot,
            config,
            scheduler,
            grants: Vec::new(),
            absorbed: Vec::new(),
        }
    }

    /// Source tag for everything this instance grants on behalf of `caster`.
    #[must_use]
    pub const fn source(&self, caster: EntityId) -> BuffSource {
        BuffSource::new(caster, self.slot)
    }

    /// How the engine drives this ability.
    #[must_use]
    pub const fn category(&self) -> AbilityCategory {
        self.config.kind.category()
    }

    /// Check if the instance is disabled by a configuration error.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.scheduler.is_disabled()
    }

    /// Whether the instance holds standing effects.
    #[must_use]
    pub fn activation(&self) -> Activation {
        if self.grants.is_empty() && self.absorbed.is_empty() {
            Activation::Idle
        } else {
            Activation::Active
        }
    }

    /// Standing buffs, in grant order.
    #[must_use]
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// The standing buff on `target`, if any.
    #[must_use]
    pub fn grant_for(&self, target: EntityId) -> Option<BuffId> {
        self.grants
            .iter()
            .find(|grant| grant.target == target)
            .map(|grant| grant.buff)
    }

    /// Record a standing buff.
    pub fn add_grant(&mut self, target: EntityId, buff: BuffId) {
        self.grants.push(Grant { target, buff });
    }

    /// Forget the standing buff on `target` and return it.
    pub fn take_grant(&mut self, target: EntityId) -> Option<BuffId> {
        let index = self.grants.iter().position(|grant| grant.target == target)?;
        Some(self.grants.remove(index).buff)
    }

    /// Forget every standing buff and return them.
    pub fn take_grants(&mut self) -> Vec<Grant> {
        std::mem::take(&mut self.grants)
    }

    /// Absorbed allies, in absorption order.
    #[must_use]
    pub fn absorbed(&self) -> &[EntityId] {
        &self.absorbed
    }

    /// Record an absorbed ally.
    pub fn absorb(&mut self, ally: EntityId) {
        if !self.absorbed.contains(&ally) {
            self.absorbed.push(ally);
        }
    }

    /// Forget every absorbed ally and return them.
    pub fn take_absorbed(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.absorbed)
    }

    /// Forget every reference to `unit` (grants and absorption).
    pub fn forget_unit(&mut self, unit: EntityId) {
        self.grants.retain(|grant| grant.target != unit);
        self.absorbed.retain(|ally| *ally != unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffs::BuffSpec;
    use crate::data::AbilityKind;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn aura() -> AbilityInstance {
        let config = AbilityData::new(
            "pack_tactics",
            AbilityKind::Aura {
                range: fx(5),
                buff: BuffSpec::damage(fx(3)),
                heal_per_second: fx(0),
            },
        );
        AbilityInstance::new(2, config, fx(0))
    }

    #[test]
    fn test_source_uses_slot() {
        assert_eq!(aura().source(7), BuffSource::new(7, 2));
    }

    #[test]
    fn test_activation_follows_grants() {
        let mut instance = aura();
        assert_eq!(instance.activation(), Activation::Idle);

        instance.add_grant(4, 11);
        assert_eq!(instance.activation(), Activation::Active);
        assert_eq!(instance.grant_for(4), Some(11));

        assert_eq!(instance.take_grant(4), Some(11));
        assert_eq!(instance.take_grant(4), None);
        assert_eq!(instance.activation(), Activation::Idle);
    }

    #[test]
    fn test_absorb_is_unique() {
        let mut instance = aura();
        instance.absorb(3);
        instance.absorb(3);
        assert_eq!(instance.absorbed(), &[3]);
        instance.forget_unit(3);
        assert!(instance.absorbed().is_empty());
    }

    #[test]
    fn test_disabled_instance() {
        let instance = AbilityInstance::disabled(0, aura().config);
        assert!(instance.is_disabled());
    }
}
