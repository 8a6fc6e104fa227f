//! Ability data structures for data-driven ability definitions.

use serde::{Deserialize, Serialize};

use crate::buffs::BuffSpec;
use crate::components::Relation;
use crate::error::{EngineError, Result};
use crate::math::{decimal_serde, Fixed};

/// What drives an overdrive-class combat mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverdriveTrigger {
    /// Follows the unit's resource pool transitions.
    Resource,
    /// Follows the unit's health fraction.
    HealthBelow {
        /// Enter when health fraction is at or below this value.
        #[serde(with = "decimal_serde")]
        enter: Fixed,
        /// Leave when health fraction rises above this value.
        #[serde(with = "decimal_serde")]
        exit: Fixed,
    },
}

const fn default_heal() -> Fixed {
    Fixed::ZERO
}

/// Effect an ability resolves to, with its tuning.
///
/// Triggered kinds run through the cooldown scheduler; the remaining kinds
/// are continuous and re-evaluated every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Instant damage to every enemy in `radius`, then a burn on each.
    BurstBurn {
        /// Area radius around the caster.
        #[serde(with = "decimal_serde")]
        radius: Fixed,
        /// Instant damage.
        #[serde(with = "decimal_serde")]
        damage: Fixed,
        /// Damage per burn tick.
        #[serde(with = "decimal_serde")]
        burn_damage: Fixed,
        /// Seconds between burn ticks.
        #[serde(with = "decimal_serde")]
        burn_interval: Fixed,
        /// Seconds the burn lasts.
        #[serde(with = "decimal_serde")]
        burn_duration: Fixed,
    },

    /// Damage that hops to the nearest unvisited enemy, decaying each hop.
    Chain {
        /// Range from the caster to the first target.
        #[serde(with = "decimal_serde")]
        range: Fixed,
        /// Range of each hop from the last unit hit.
        #[serde(with = "decimal_serde")]
        chain_range: Fixed,
        /// Damage to the first target.
        #[serde(with = "decimal_serde")]
        damage: Fixed,
        /// Total number of units hit, the first target included.
        max_chain_targets: u32,
        /// Multiplier applied to the damage on every hop.
        #[serde(with = "decimal_serde")]
        chain_damage_reduction: Fixed,
    },

    /// Damage to every enemy inside a box extending from the caster toward its target.
    Wave {
        /// Range at which a target makes the wave fire.
        #[serde(with = "decimal_serde")]
        range: Fixed,
        /// Box length along the wave direction.
        #[serde(with = "decimal_serde")]
        length: Fixed,
        /// Box width across the wave direction.
        #[serde(with = "decimal_serde")]
        width: Fixed,
        /// Damage to each unit hit.
        #[serde(with = "decimal_serde")]
        damage: Fixed,
    },

    /// Timed buff (or debuff) on every matching unit in `radius`.
    TimedBuff {
        /// Area radius around the caster.
        #[serde(with = "decimal_serde")]
        radius: Fixed,
        /// Who receives the buff.
        relation: Relation,
        /// Whether the caster receives it too.
        #[serde(default)]
        include_self: bool,
        /// Magnitudes.
        buff: BuffSpec,
        /// Seconds until it lapses.
        #[serde(with = "decimal_serde")]
        duration: Fixed,
    },

    /// Absorb a nearby ally for additive bonuses.
    Sacrifice {
        /// Range to the ally.
        #[serde(with = "decimal_serde")]
        range: Fixed,
        /// Health bonus per absorbed ally.
        #[serde(with = "decimal_serde")]
        health_bonus: Fixed,
        /// Damage bonus per absorbed ally.
        #[serde(with = "decimal_serde")]
        damage_bonus: Fixed,
        /// Cap on simultaneously absorbed allies.
        max_absorbed: u32,
    },

    /// Bring a defeated ally back for a limited time.
    Revival {
        /// Range to the fallen ally.
        #[serde(with = "decimal_serde")]
        range: Fixed,
        /// Fraction of max health restored.
        #[serde(with = "decimal_serde")]
        revival_fraction: Fixed,
        /// Seconds before the revived unit falls again.
        #[serde(with = "decimal_serde")]
        revival_duration: Fixed,
    },

    /// Buff every ally within `range`, tracked as a diffed member set.
    Aura {
        /// Membership range.
        #[serde(with = "decimal_serde")]
        range: Fixed,
        /// Magnitudes granted to members.
        buff: BuffSpec,
        /// Healing per second to members.
        #[serde(default = "default_heal", with = "decimal_serde")]
        heal_per_second: Fixed,
    },

    /// Self buff scaled by the number of allies within `range`.
    PackBonus {
        /// Counting range.
        #[serde(with = "decimal_serde")]
        range: Fixed,
        /// Additive magnitudes per counted ally.
        per_ally: BuffSpec,
        /// Cap on counted allies.
        max_allies: u32,
    },

    /// Self buff while at least `min_allies` allies are within `range`.
    FormationBonus {
        /// Counting range.
        #[serde(with = "decimal_serde")]
        range: Fixed,
        /// Allies required.
        min_allies: u32,
        /// Magnitudes while in formation.
        buff: BuffSpec,
    },

    /// Standing self buff toggled by a resource or health threshold.
    Overdrive {
        /// What toggles it.
        trigger: OverdriveTrigger,
        /// Magnitudes while active.
        buff: BuffSpec,
    },
}

/// How the engine drives an ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbilityCategory {
    /// Cooldown-gated, fires on a target.
    Triggered,
    /// Re-evaluated every tick.
    Continuous,
    /// Toggled by threshold transitions.
    Threshold,
}

impl AbilityKind {
    /// How the engine drives this kind.
    #[must_use]
    pub const fn category(&self) -> AbilityCategory {
        match self {
            Self::BurstBurn { .. }
            | Self::Chain { .. }
            | Self::Wave { .. }
            | Self::TimedBuff { .. }
            | Self::Sacrifice { .. }
            | Self::Revival { .. } => AbilityCategory::Triggered,
            Self::Aura { .. } | Self::PackBonus { .. } | Self::FormationBonus { .. } => {
                AbilityCategory::Continuous
            }
            Self::Overdrive { .. } => AbilityCategory::Threshold,
        }
    }

    /// Short name for logs and events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BurstBurn { .. } => "burst_burn",
            Self::Chain { .. } => "chain",
            Self::Wave { .. } => "wave",
            Self::TimedBuff { .. } => "timed_buff",
            Self::Sacrifice { .. } => "sacrifice",
            Self::Revival { .. } => "revival",
            Self::Aura { .. } => "aura",
            Self::PackBonus { .. } => "pack_bonus",
            Self::FormationBonus { .. } => "formation_bonus",
            Self::Overdrive { .. } => "overdrive",
        }
    }

    /// Check if this kind needs the unit's resource pool.
    #[must_use]
    pub const fn requires_pool(&self) -> bool {
        matches!(
            self,
            Self::Overdrive {
                trigger: OverdriveTrigger::Resource,
                ..
            }
        )
    }
}

/// Data-driven ability definition.
///
/// # Example RON
///
/// ```ron
/// AbilityData(
///     id: "chain_lightning",
///     cooldown: 4.0,
///     cost: 25.0,
///     kind: Chain(
///         range: 8.0,
///         chain_range: 5.0,
///         damage: 40.0,
///         max_chain_targets: 3,
///         chain_damage_reduction: 0.7,
///     ),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityData {
    /// Identifier, unique within a unit type.
    pub id: String,

    /// Seconds between uses.
    #[serde(default, with = "decimal_serde")]
    pub cooldown: Fixed,

    /// Resource spent per use (0 = free).
    #[serde(default, with = "decimal_serde")]
    pub cost: Fixed,

    /// Whether the first use is available immediately after spawn.
    #[serde(default)]
    pub starts_ready: bool,

    /// Effect and tuning.
    pub kind: AbilityKind,
}

impl AbilityData {
    /// Create an ability with no cooldown and no cost.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: AbilityKind) -> Self {
        Self {
            id: id.into(),
            cooldown: Fixed::ZERO,
            cost: Fixed::ZERO,
            starts_ready: true,
            kind,
        }
    }

    /// Builder method to set the cooldown.
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Fixed) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Builder method to set the cost.
    #[must_use]
    pub fn with_cost(mut self, cost: Fixed) -> Self {
        self.cost = cost;
        self
    }

    /// Builder method to set whether the ability starts ready.
    #[must_use]
    pub fn starting_ready(mut self, ready: bool) -> Self {
        self.starts_ready = ready;
        self
    }

    /// Check if the ability spends resources.
    #[must_use]
    pub fn has_cost(&self) -> bool {
        self.cost > Fixed::ZERO
    }

    /// Reject invalid numeric configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(EngineError::config(&self.id, reason));

        if self.id.is_empty() {
            return fail("ability id is empty".to_string());
        }
        if self.cooldown < Fixed::ZERO {
            return fail(format!("negative cooldown {}", self.cooldown));
        }
        if self.cost < Fixed::ZERO {
            return fail(format!("negative cost {}", self.cost));
        }

        let mut checks: Vec<(&str, Fixed)> = Vec::new();
        let mut buffs: Vec<BuffSpec> = Vec::new();

        match self.kind {
            AbilityKind::BurstBurn {
                radius,
                damage,
                burn_damage,
                burn_interval,
                burn_duration,
            } => {
                checks.extend([
                    ("radius", radius),
                    ("damage", damage),
                    ("burn_damage", burn_damage),
                    ("burn_duration", burn_duration),
                ]);
                if burn_duration > Fixed::ZERO && burn_interval <= Fixed::ZERO {
                    return fail("burn_interval must be positive".to_string());
                }
            }
            AbilityKind::Chain {
                range,
                chain_range,
                damage,
                max_chain_targets,
                chain_damage_reduction,
            } => {
                checks.extend([("range", range), ("chain_range", chain_range), ("damage", damage)]);
                if max_chain_targets == 0 {
                    return fail("max_chain_targets must be at least 1".to_string());
                }
                if chain_damage_reduction <= Fixed::ZERO || chain_damage_reduction > Fixed::ONE {
                    return fail(format!(
                        "chain_damage_reduction {chain_damage_reduction} outside (0, 1]"
                    ));
                }
            }
            AbilityKind::Wave {
                range,
                length,
                width,
                damage,
            } => {
                checks.extend([
                    ("range", range),
                    ("length", length),
                    ("width", width),
                    ("damage", damage),
                ]);
            }
            AbilityKind::TimedBuff {
                radius,
                buff,
                duration,
                ..
            } => {
                checks.extend([("radius", radius), ("duration", duration)]);
                buffs.push(buff);
            }
            AbilityKind::Sacrifice {
                range,
                health_bonus,
                damage_bonus,
                max_absorbed,
            } => {
                checks.extend([
                    ("range", range),
                    ("health_bonus", health_bonus),
                    ("damage_bonus", damage_bonus),
                ]);
                if max_absorbed == 0 {
                    return fail("max_absorbed must be at least 1".to_string());
                }
            }
            AbilityKind::Revival {
                range,
                revival_fraction,
                revival_duration,
            } => {
                checks.extend([("range", range), ("revival_duration", revival_duration)]);
                if revival_fraction <= Fixed::ZERO || revival_fraction > Fixed::ONE {
                    return fail(format!("revival_fraction {revival_fraction} outside (0, 1]"));
                }
            }
            AbilityKind::Aura {
                range,
                buff,
                heal_per_second,
            } => {
                checks.extend([("range", range), ("heal_per_second", heal_per_second)]);
                buffs.push(buff);
            }
            AbilityKind::PackBonus {
                range,
                per_ally,
                max_allies,
            } => {
                checks.push(("range", range));
                if max_allies == 0 {
                    return fail("max_allies must be at least 1".to_string());
                }
                if per_ally.health_bonus != Fixed::ZERO
                    || per_ally.damage_multiplier != Fixed::ONE
                    || per_ally.speed_multiplier != Fixed::ONE
                {
                    return fail("per_ally bonus may only carry damage_bonus".to_string());
                }
            }
            AbilityKind::FormationBonus {
                range,
                min_allies,
                buff,
            } => {
                checks.push(("range", range));
                if min_allies == 0 {
                    return fail("min_allies must be at least 1".to_string());
                }
                buffs.push(buff);
            }
            AbilityKind::Overdrive { trigger, buff } => {
                if let OverdriveTrigger::HealthBelow { enter, exit } = trigger {
                    if enter <= Fixed::ZERO || enter > Fixed::ONE {
                        return fail(format!("health enter threshold {enter} outside (0, 1]"));
                    }
                    if exit < enter || exit > Fixed::ONE {
                        return fail(format!("health exit threshold {exit} outside [{enter}, 1]"));
                    }
                    if buff.health_bonus != Fixed::ZERO {
                        return fail("health-driven mode may not grant health_bonus".to_string());
                    }
                }
                buffs.push(buff);
            }
        }

        if let Some((field, value)) = checks.into_iter().find(|(_, value)| *value < Fixed::ZERO) {
            return fail(format!("negative {field} {value}"));
        }
        for buff in buffs {
            if buff.damage_multiplier <= Fixed::ZERO || buff.speed_multiplier <= Fixed::ZERO {
                return fail("buff multipliers must be positive".to_string());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn chain(max_chain_targets: u32, reduction: Fixed) -> AbilityData {
        AbilityData::new(
            "chain",
            AbilityKind::Chain {
                range: fx(8),
                chain_range: fx(5),
                damage: fx(40),
                max_chain_targets,
                chain_damage_reduction: reduction,
            },
        )
    }

    #[test]
    fn test_valid_chain() {
        assert!(chain(3, Fixed::from_num(0.7)).validate().is_ok());
    }

    #[test]
    fn test_zero_chain_count_rejected() {
        assert!(chain(0, Fixed::from_num(0.7)).validate().is_err());
    }

    #[test]
    fn test_decay_outside_unit_interval_rejected() {
        assert!(chain(3, fx(0)).validate().is_err());
        assert!(chain(3, Fixed::from_num(1.5)).validate().is_err());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let ability = AbilityData::new(
            "war_cry",
            AbilityKind::TimedBuff {
                radius: fx(5),
                relation: Relation::Ally,
                include_self: true,
                buff: BuffSpec::damage(fx(5)),
                duration: fx(-1),
            },
        );
        let err = ability.validate().unwrap_err();
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let ability = chain(3, Fixed::from_num(0.7)).with_cooldown(fx(-2));
        assert!(ability.validate().is_err());
    }

    #[test]
    fn test_health_trigger_thresholds() {
        let overdrive = |enter: f64, exit: f64| {
            AbilityData::new(
                "primal",
                AbilityKind::Overdrive {
                    trigger: OverdriveTrigger::HealthBelow {
                        enter: Fixed::from_num(enter),
                        exit: Fixed::from_num(exit),
                    },
                    buff: BuffSpec::multipliers(fx(2), fx(2)),
                },
            )
        };
        assert!(overdrive(0.3, 0.5).validate().is_ok());
        assert!(overdrive(0.5, 0.3).validate().is_err());
        assert!(overdrive(0.0, 0.3).validate().is_err());
    }

    #[test]
    fn test_health_mode_rejects_health_bonus() {
        let ability = AbilityData::new(
            "primal",
            AbilityKind::Overdrive {
                trigger: OverdriveTrigger::HealthBelow {
                    enter: Fixed::from_num(0.3),
                    exit: Fixed::from_num(0.5),
                },
                buff: BuffSpec::bonuses(fx(100), fx(0)),
            },
        );
        let err = ability.validate().unwrap_err();
        assert!(err.to_string().contains("health_bonus"));

        let pooled = AbilityData::new(
            "overdrive",
            AbilityKind::Overdrive {
                trigger: OverdriveTrigger::Resource,
                buff: BuffSpec::bonuses(fx(100), fx(0)),
            },
        );
        assert!(pooled.validate().is_ok());
    }

    #[test]
    fn test_categories() {
        assert_eq!(chain(3, Fixed::ONE).kind.category(), AbilityCategory::Triggered);
        let aura = AbilityKind::Aura {
            range: fx(4),
            buff: BuffSpec::damage(fx(2)),
            heal_per_second: fx(0),
        };
        assert_eq!(aura.category(), AbilityCategory::Continuous);
        assert!(!aura.requires_pool());
    }

    #[test]
    fn test_parse_from_ron() {
        let text = r#"
            AbilityData(
                id: "chain_lightning",
                cooldown: 4.0,
                cost: 25.0,
                kind: Chain(
                    range: 8.0,
                    chain_range: 5.0,
                    damage: 40.0,
                    max_chain_targets: 3,
                    chain_damage_reduction: 0.7,
                ),
            )
        "#;
        let ability: AbilityData = ron::from_str(text).unwrap();
        assert_eq!(ability.cooldown, fx(4));
        assert!(!ability.starts_ready);
        assert!(ability.validate().is_ok());
    }
}
