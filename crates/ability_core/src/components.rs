//! Plain data shared by units, queries and resolvers.
//!
//! Components are pure data with no behavior beyond small helpers.

use serde::{Deserialize, Serialize};

use crate::buffs::BuffSource;
use crate::math::{fixed_serde, Fixed};
use crate::timers::DotId;

/// Unique identifier for units.
///
/// Ids are assigned in registration order, which is also the tie-break
/// order for targeting.
pub type EntityId = u64;

/// Which side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Allegiance {
    /// Player-controlled side.
    Friendly,
    /// Opposing side.
    Enemy,
}

impl Allegiance {
    /// The opposing allegiance.
    #[must_use]
    pub const fn opposing(self) -> Self {
        match self {
            Self::Friendly => Self::Enemy,
            Self::Enemy => Self::Friendly,
        }
    }
}

/// Relation a query filters candidates by, relative to the caster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// Same allegiance as the caster.
    Ally,
    /// Opposing allegiance.
    Enemy,
    /// Either side.
    Any,
}

impl Relation {
    /// Check whether `other` satisfies this relation from `caster`'s side.
    #[must_use]
    pub fn matches(self, caster: Allegiance, other: Allegiance) -> bool {
        match self {
            Self::Ally => caster == other,
            Self::Enemy => caster != other,
            Self::Any => true,
        }
    }
}

/// Lifecycle state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Alive, targetable and running its abilities.
    Active,
    /// Absorbed by another unit: inactive and non-targetable.
    Disabled {
        /// The unit that absorbed this one.
        absorbed_by: EntityId,
    },
    /// Health reached zero. May be revived.
    Defeated,
}

impl UnitStatus {
    /// Check if the unit is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if the unit is defeated.
    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        matches!(self, Self::Defeated)
    }
}

/// Authored base stats of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitStats {
    /// Attack damage before any buff.
    #[serde(with = "fixed_serde")]
    pub base_attack: Fixed,
    /// Movement speed before any buff.
    #[serde(with = "fixed_serde")]
    pub base_move_speed: Fixed,
    /// Maximum health before bonuses.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
}

impl UnitStats {
    /// Create a stat block.
    #[must_use]
    pub const fn new(base_attack: Fixed, base_move_speed: Fixed, max_health: Fixed) -> Self {
        Self {
            base_attack,
            base_move_speed,
            max_health,
        }
    }
}

/// Stat values recorded once at spawn.
///
/// Multiplicative buffs are always evaluated against this record, never
/// against the current (possibly already modified) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Baseline {
    /// Attack damage at spawn.
    #[serde(with = "fixed_serde")]
    pub attack: Fixed,
    /// Movement speed at spawn.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,
}

impl Baseline {
    /// Capture the baseline from authored stats.
    #[must_use]
    pub const fn capture(stats: &UnitStats) -> Self {
        Self {
            attack: stats.base_attack,
            move_speed: stats.base_move_speed,
        }
    }
}

/// A damage-over-time effect riding on the unit that receives it.
///
/// Each tick is a [`TimedEvent::DotTick`](crate::timers::TimedEvent) in the
/// receiving unit's timer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DamageOverTime {
    /// Identifier, unique per receiving unit.
    pub id: DotId,
    /// Ability that applied it.
    pub source: BuffSource,
    /// Damage dealt on every tick.
    #[serde(with = "fixed_serde")]
    pub damage_per_tick: Fixed,
    /// Seconds between ticks.
    #[serde(with = "fixed_serde")]
    pub interval: Fixed,
    /// No tick fires after this time.
    #[serde(with = "fixed_serde")]
    pub expires_at: Fixed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_matches() {
        use Allegiance::*;
        assert!(Relation::Ally.matches(Friendly, Friendly));
        assert!(!Relation::Ally.matches(Friendly, Enemy));
        assert!(Relation::Enemy.matches(Enemy, Friendly));
        assert!(!Relation::Enemy.matches(Enemy, Enemy));
        assert!(Relation::Any.matches(Enemy, Friendly));
    }

    #[test]
    fn test_opposing() {
        assert_eq!(Allegiance::Friendly.opposing(), Allegiance::Enemy);
        assert_eq!(Allegiance::Enemy.opposing(), Allegiance::Friendly);
    }

    #[test]
    fn test_status_helpers() {
        assert!(UnitStatus::Active.is_active());
        assert!(UnitStatus::Defeated.is_defeated());
        assert!(!UnitStatus::Disabled { absorbed_by: 1 }.is_active());
    }
}
