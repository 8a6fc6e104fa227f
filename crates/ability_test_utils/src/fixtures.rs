//! Test fixtures and helpers.
//!
//! Pre-built unit types and battle setups for consistent testing.

use ability_core::buffs::BuffSpec;
use ability_core::components::{Allegiance, EntityId};
use ability_core::data::{
    AbilityData, AbilityKind, Catalog, OverdriveTrigger, ResourcePoolData, UnitTypeData,
};
use ability_core::math::{Fixed, Vec2Fixed};
use ability_core::simulation::{Simulation, SpawnParams};
use serde::de::DeserializeOwned;

/// The catalog shipped in `assets/data`.
pub const BUNDLED_CATALOG: &str = include_str!("../../../assets/data/monsters.ron");

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// Check that two values differ by at most `tolerance`.
#[must_use]
pub fn approx_eq(a: Fixed, b: Fixed, tolerance: Fixed) -> bool {
    (a - b).abs() <= tolerance
}

/// Spawn parameters at integer coordinates.
#[must_use]
pub fn at(allegiance: Allegiance, x: i32, y: i32) -> SpawnParams {
    SpawnParams::new(allegiance, Vec2Fixed::from_int(x, y))
}

/// Parse any authored record from inline RON.
///
/// # Panics
///
/// Panics if the text does not parse.
#[must_use]
pub fn from_ron<T: DeserializeOwned>(text: &str) -> T {
    match ron::from_str(text) {
        Ok(value) => value,
        Err(err) => panic!("fixture RON failed to parse: {err}\n{text}"),
    }
}

/// Load and validate the bundled catalog.
///
/// # Panics
///
/// Panics if the bundled catalog is malformed or invalid.
#[must_use]
pub fn bundled_catalog() -> Catalog {
    match Catalog::from_ron_str(BUNDLED_CATALOG, "assets/data/monsters.ron") {
        Ok(catalog) => catalog,
        Err(err) => panic!("bundled catalog is invalid: {err}"),
    }
}

/// A unit with no abilities: 10 attack, 3 move speed.
#[must_use]
pub fn dummy(id: &str, health: i32) -> UnitTypeData {
    UnitTypeData::new(id, fixed(health), fixed(10), fixed(3))
}

/// Pool from the overdrive cycle scenario: max 100, regen 5/s, drain 2/s,
/// one threshold at 80, starting empty.
#[must_use]
pub fn overdrive_pool() -> ResourcePoolData {
    ResourcePoolData {
        max: fixed(100),
        regen_rate: fixed(5),
        consume_rate: fixed(2),
        high_threshold: Some(fixed(80)),
        low_threshold: None,
        starting: Fixed::ZERO,
    }
}

/// Machine: resource-driven overdrive doubling attack and speed.
#[must_use]
pub fn machine() -> UnitTypeData {
    UnitTypeData::new("machine", fixed(150), fixed(12), fixed(3))
        .with_resource(overdrive_pool())
        .with_ability(AbilityData::new(
            "overdrive",
            AbilityKind::Overdrive {
                trigger: OverdriveTrigger::Resource,
                buff: BuffSpec::multipliers(fixed(2), fixed(2)),
            },
        ))
}

/// Thunder: chain lightning for 40, decaying by 0.7, three targets.
#[must_use]
pub fn thunder() -> UnitTypeData {
    UnitTypeData::new("thunder", fixed(90), fixed(12), fixed(4)).with_ability(
        AbilityData::new(
            "chain_lightning",
            AbilityKind::Chain {
                range: fixed(8),
                chain_range: fixed(5),
                damage: fixed(40),
                max_chain_targets: 3,
                chain_damage_reduction: fixed_f(0.7),
            },
        )
        .with_cooldown(fixed(4)),
    )
}

/// Pyro: burst for 20, then 4 burn per second for 4 seconds.
#[must_use]
pub fn pyro() -> UnitTypeData {
    UnitTypeData::new("pyro", fixed(90), fixed(15), fixed(4)).with_ability(
        AbilityData::new(
            "incendiary_burst",
            AbilityKind::BurstBurn {
                radius: fixed(4),
                damage: fixed(20),
                burn_damage: fixed(4),
                burn_interval: fixed(1),
                burn_duration: fixed(4),
            },
        )
        .with_cooldown(fixed(6)),
    )
}

/// Fiend: absorbs one ally for +100 health and +20 damage.
#[must_use]
pub fn fiend() -> UnitTypeData {
    UnitTypeData::new("fiend", fixed(110), fixed(16), fixed(4)).with_ability(
        AbilityData::new(
            "soul_feast",
            AbilityKind::Sacrifice {
                range: fixed(4),
                health_bonus: fixed(100),
                damage_bonus: fixed(20),
                max_absorbed: 1,
            },
        )
        .with_cooldown(fixed(8)),
    )
}

/// Zombie: revives a fallen ally at half health for `duration` seconds.
#[must_use]
pub fn zombie(duration: i32) -> UnitTypeData {
    UnitTypeData::new("zombie", fixed(100), fixed(9), fixed(2)).with_ability(
        AbilityData::new(
            "raise_dead",
            AbilityKind::Revival {
                range: fixed(6),
                revival_fraction: fixed_f(0.5),
                revival_duration: fixed(duration),
            },
        )
        .with_cooldown(fixed(12)),
    )
}

/// Plant: aura granting +10 max health to allies within 5.
#[must_use]
pub fn plant() -> UnitTypeData {
    UnitTypeData::new("plant", fixed(100), fixed(6), fixed(1)).with_ability(AbilityData::new(
        "regeneration",
        AbilityKind::Aura {
            range: fixed(5),
            buff: BuffSpec::bonuses(fixed(10), Fixed::ZERO),
            heal_per_second: Fixed::ZERO,
        },
    ))
}

/// A line of `count` dummies spaced two units apart along +X,
/// starting at `x`. Returns their ids in spawn order.
///
/// # Panics
///
/// Panics if a spawn fails.
pub fn spawn_line(
    sim: &mut Simulation,
    allegiance: Allegiance,
    count: usize,
    x: i32,
    y: i32,
) -> Vec<EntityId> {
    (0..count)
        .map(|index| {
            let offset = i32::try_from(index).unwrap_or(i32::MAX).saturating_mul(2);
            match sim.spawn(&dummy("dummy", 100), at(allegiance, x.saturating_add(offset), y)) {
                Ok(id) => id,
                Err(err) => panic!("failed to spawn dummy: {err}"),
            }
        })
        .collect()
}

/// Every bundled unit type on both sides, close enough that most
/// abilities find targets.
///
/// Friendly units stand on `y = 0` and enemies on `y = 4`, two units apart.
/// `copies` repeats the whole roster on each side.
///
/// # Panics
///
/// Panics if the bundled catalog is invalid.
#[must_use]
pub fn skirmish(copies: usize) -> Simulation {
    let catalog = bundled_catalog();
    let mut sim = Simulation::new();

    for copy in 0..copies {
        let row = i32::try_from(copy).unwrap_or(i32::MAX).saturating_mul(10);
        for (column, unit_type) in (0i32..).zip(catalog.iter()) {
            for (allegiance, y) in [(Allegiance::Friendly, row), (Allegiance::Enemy, row + 4)] {
                if let Err(err) = sim.spawn(unit_type, at(allegiance, column * 2, y)) {
                    panic!("failed to spawn {}: {err}", unit_type.id);
                }
            }
        }
    }
    sim
}

/// Advance `sim` by `ticks` steps of `dt` seconds.
pub fn run_for(sim: &mut Simulation, ticks: u64, dt: Fixed) {
    for _ in 0..ticks {
        sim.tick(dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_has_every_monster() {
        let catalog = bundled_catalog();
        assert_eq!(catalog.len(), 11);
        for id in [
            "beast",
            "fiend",
            "machine",
            "pyro",
            "thunder",
            "sea_serpent",
            "rock",
            "plant",
            "spellcaster",
            "warrior",
            "zombie",
        ] {
            assert!(catalog.get(id).is_some(), "missing {id}");
        }
    }

    #[test]
    fn test_fixture_types_validate() {
        for unit_type in [machine(), thunder(), pyro(), fiend(), zombie(10), plant()] {
            assert!(unit_type.validate().is_ok(), "{} is invalid", unit_type.id);
        }
    }

    #[test]
    fn test_skirmish_spawns_both_sides() {
        let sim = skirmish(2);
        assert_eq!(sim.units().len(), 44);
    }

    #[test]
    fn test_from_ron_reads_buff_spec() {
        let spec: BuffSpec = from_ron("(damage_bonus: 2.5)");
        assert_eq!(spec.damage_bonus, fixed_f(2.5));
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(fixed_f(19.6), fixed_f(19.600_001), fixed_f(0.001)));
        assert!(!approx_eq(fixed(19), fixed(20), fixed_f(0.5)));
    }
}
