//! Timed, stacked, reversible stat modifiers.
//!
//! A [`BuffStack`] only records which modifiers are active. The owning
//! [`Unit`](crate::unit::Unit) applies and reverts the stat deltas so that
//! every additive application has exactly one matching removal, and
//! multiplicative modifiers are always re-evaluated against the unit's
//! spawn baseline.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::math::{decimal_serde, fixed_serde, option_fixed_serde, Fixed};

/// Per-unit buff identifier.
pub type BuffId = u64;

/// The ability instance a buff came from.
///
/// Deactivating an ability strips every buff carrying its source, on every
/// unit, without waiting for timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuffSource {
    /// Unit that owns the ability.
    pub caster: EntityId,
    /// Index of the ability on the caster.
    pub slot: u8,
}

impl BuffSource {
    /// Create a buff source.
    #[must_use]
    pub const fn new(caster: EntityId, slot: u8) -> Self {
        Self { caster, slot }
    }
}

const fn one() -> Fixed {
    Fixed::ONE
}

/// Authored magnitudes of a buff.
///
/// Additive fields stack by summation; multipliers stack by product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuffSpec {
    /// Added to the unit's damage bonus accumulator.
    #[serde(default, with = "decimal_serde")]
    pub damage_bonus: Fixed,
    /// Added to the unit's health bonus accumulator (and current health).
    #[serde(default, with = "decimal_serde")]
    pub health_bonus: Fixed,
    /// Multiplies the baseline attack.
    #[serde(default = "one", with = "decimal_serde")]
    pub damage_multiplier: Fixed,
    /// Multiplies the baseline move speed.
    #[serde(default = "one", with = "decimal_serde")]
    pub speed_multiplier: Fixed,
}

impl Default for BuffSpec {
    fn default() -> Self {
        Self {
            damage_bonus: Fixed::ZERO,
            health_bonus: Fixed::ZERO,
            damage_multiplier: Fixed::ONE,
            speed_multiplier: Fixed::ONE,
        }
    }
}

impl BuffSpec {
    /// Additive damage-only buff.
    #[must_use]
    pub fn damage(amount: Fixed) -> Self {
        Self {
            damage_bonus: amount,
            ..Self::default()
        }
    }

    /// Additive health and damage buff.
    #[must_use]
    pub fn bonuses(health: Fixed, damage: Fixed) -> Self {
        Self {
            health_bonus: health,
            damage_bonus: damage,
            ..Self::default()
        }
    }

    /// Multiplicative speed and damage buff.
    #[must_use]
    pub fn multipliers(speed: Fixed, damage: Fixed) -> Self {
        Self {
            speed_multiplier: speed,
            damage_multiplier: damage,
            ..Self::default()
        }
    }

    /// Scale the additive parts by `factor`, leaving multipliers untouched.
    #[must_use]
    pub fn scaled_additive(self, factor: Fixed) -> Self {
        Self {
            damage_bonus: self.damage_bonus * factor,
            health_bonus: self.health_bonus * factor,
            ..self
        }
    }

    /// Check if applying this spec would change nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.damage_bonus == Fixed::ZERO
            && self.health_bonus == Fixed::ZERO
            && self.damage_multiplier == Fixed::ONE
            && self.speed_multiplier == Fixed::ONE
    }
}

/// An active buff on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Buff {
    /// Identifier, unique per unit.
    pub id: BuffId,
    /// Ability that granted it.
    pub source: BuffSource,
    /// Additive damage applied.
    #[serde(with = "fixed_serde")]
    pub damage_bonus: Fixed,
    /// Additive health applied.
    #[serde(with = "fixed_serde")]
    pub health_bonus: Fixed,
    /// Attack multiplier.
    #[serde(with = "fixed_serde")]
    pub damage_multiplier: Fixed,
    /// Move speed multiplier.
    #[serde(with = "fixed_serde")]
    pub speed_multiplier: Fixed,
    /// Simulation time the buff lapses, if timed.
    #[serde(with = "option_fixed_serde")]
    pub expires_at: Option<Fixed>,
}

impl Buff {
    /// Magnitudes this buff was applied with.
    #[must_use]
    pub fn spec(&self) -> BuffSpec {
        BuffSpec {
            damage_bonus: self.damage_bonus,
            health_bonus: self.health_bonus,
            damage_multiplier: self.damage_multiplier,
            speed_multiplier: self.speed_multiplier,
        }
    }
}

/// The active buffs of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct BuffStack {
    active: Vec<Buff>,
    next_id: BuffId,
}

impl BuffStack {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            next_id: 1,
        }
    }

    /// Record a new buff and return it.
    pub fn push(&mut self, source: BuffSource, spec: BuffSpec, expires_at: Option<Fixed>) -> Buff {
        // Default-constructed stacks start at 0; skip it so 0 is never a live id.
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let buff = Buff {
            id: self.next_id,
            source,
            damage_bonus: spec.damage_bonus,
            health_bonus: spec.health_bonus,
            damage_multiplier: spec.damage_multiplier,
            speed_multiplier: spec.speed_multiplier,
            expires_at,
        };
        self.next_id += 1;
        self.active.push(buff);
        buff
    }

    /// Remove a buff. Removing an id twice returns `None` the second time.
    pub fn remove(&mut self, id: BuffId) -> Option<Buff> {
        let index = self.active.iter().position(|buff| buff.id == id)?;
        Some(self.active.remove(index))
    }

    /// Remove every buff granted by `source`.
    pub fn remove_from_source(&mut self, source: BuffSource) -> Vec<Buff> {
        self.drain_where(|buff| buff.source == source)
    }

    /// Remove every buff granted by any ability of `caster`.
    pub fn remove_from_caster(&mut self, caster: EntityId) -> Vec<Buff> {
        self.drain_where(|buff| buff.source.caster == caster)
    }

    /// Remove every buff.
    pub fn clear(&mut self) -> Vec<Buff> {
        std::mem::take(&mut self.active)
    }

    fn drain_where(&mut self, predicate: impl Fn(&Buff) -> bool) -> Vec<Buff> {
        let (removed, kept): (Vec<Buff>, Vec<Buff>) =
            self.active.drain(..).partition(|buff| predicate(buff));
        self.active = kept;
        removed
    }

    /// Look up a buff.
    #[must_use]
    pub fn get(&self, id: BuffId) -> Option<&Buff> {
        self.active.iter().find(|buff| buff.id == id)
    }

    /// Check if any buff from `source` is active.
    #[must_use]
    pub fn has_source(&self, source: BuffSource) -> bool {
        self.active.iter().any(|buff| buff.source == source)
    }

    /// Product of all attack multipliers, in application order.
    #[must_use]
    pub fn damage_multiplier(&self) -> Fixed {
        self.active
            .iter()
            .fold(Fixed::ONE, |acc, buff| acc.saturating_mul(buff.damage_multiplier))
    }

    /// Product of all move speed multipliers, in application order.
    #[must_use]
    pub fn speed_multiplier(&self) -> Fixed {
        self.active
            .iter()
            .fold(Fixed::ONE, |acc, buff| acc.saturating_mul(buff.speed_multiplier))
    }

    /// Iterate over active buffs in application order.
    pub fn iter(&self) -> impl Iterator<Item = &Buff> {
        self.active.iter()
    }

    /// Number of active buffs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Check if no buff is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
