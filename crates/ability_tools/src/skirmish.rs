//! Headless skirmish runs.
//!
//! A skirmish places catalog unit types on the field, ticks the engine a
//! fixed number of times and summarizes what happened. Units never move;
//! only abilities act, which makes a run a quick balance check for a
//! catalog.
//!
//! # Example RON
//!
//! ```ron
//! Skirmish(
//!     name: "thunder vs rocks",
//!     dt: 0.5,
//!     ticks: 40,
//!     placements: [
//!         (unit_type: "thunder", side: Friendly, x: 0.0, y: 0.0),
//!         (unit_type: "rock", side: Enemy, x: 4.0, y: 0.0),
//!     ],
//! )
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use ability_core::components::{Allegiance, EntityId};
use ability_core::data::Catalog;
use ability_core::events::{EffectNotification, EffectSpawnNotifier, TickEvents};
use ability_core::math::{decimal_serde, Fixed, Vec2Fixed};
use ability_core::simulation::{Simulation, SpawnParams};
use serde::{Deserialize, Serialize};

use crate::{read_file, Result, ToolError};

const fn default_dt() -> Fixed {
    Fixed::ONE
}

const fn default_ticks() -> u64 {
    60
}

/// One unit placed at the start of a skirmish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Catalog id.
    pub unit_type: String,
    /// Side it fights for.
    pub side: Allegiance,
    /// X coordinate.
    #[serde(with = "decimal_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "decimal_serde")]
    pub y: Fixed,
}

/// A scripted skirmish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skirmish {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Seconds per tick.
    #[serde(default = "default_dt", with = "decimal_serde")]
    pub dt: Fixed,
    /// Number of ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Starting units, spawned in order.
    pub placements: Vec<Placement>,
}

impl Skirmish {
    /// Load a skirmish from a RON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_file(path)?;
        Self::from_ron_str(&text, &path.display().to_string())
    }

    /// Parse a skirmish from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Scenario`] if the text does not parse.
    pub fn from_ron_str(text: &str, label: &str) -> Result<Self> {
        ron::from_str(text).map_err(|err| ToolError::Scenario {
            path: label.to_string(),
            message: err.to_string(),
        })
    }

    /// Every catalog type on both sides, facing each other in two rows.
    #[must_use]
    pub fn full_roster(catalog: &Catalog, ticks: u64, dt: Fixed) -> Self {
        let mut placements = Vec::with_capacity(catalog.len() * 2);
        for (column, unit_type) in (0i32..).zip(catalog.iter()) {
            for (side, y) in [(Allegiance::Friendly, 0), (Allegiance::Enemy, 4)] {
                placements.push(Placement {
                    unit_type: unit_type.id.clone(),
                    side,
                    x: Fixed::from_num(column * 2),
                    y: Fixed::from_num(y),
                });
            }
        }
        Self {
            name: "full roster".to_string(),
            dt,
            ticks,
            placements,
        }
    }
}

/// Enum variant name without its fields.
fn variant_name(value: &impl std::fmt::Debug) -> String {
    let debug = format!("{value:?}");
    debug
        .split([' ', '{', '('])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Counts effect cues by name.
#[derive(Debug, Default)]
pub struct CueCounter {
    counts: BTreeMap<String, u64>,
}

impl CueCounter {
    /// Counts so far, keyed by cue name.
    #[must_use]
    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}

impl EffectSpawnNotifier for CueCounter {
    fn spawn_effect(&mut self, notification: &EffectNotification) {
        *self.counts.entry(variant_name(&notification.cue)).or_default() += 1;
    }
}

/// Per-unit state at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSummary {
    /// Unit id.
    pub id: EntityId,
    /// Catalog id.
    pub unit_type: String,
    /// Side.
    pub side: Allegiance,
    /// Lifecycle state.
    pub status: String,
    /// Remaining health.
    #[serde(with = "decimal_serde")]
    pub health: Fixed,
    /// Total damage dealt by this unit's abilities.
    #[serde(with = "decimal_serde")]
    pub damage_dealt: Fixed,
}

/// Events of one tick, kept only if something happened.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedTick {
    /// Tick number (1-based).
    pub tick: u64,
    /// What happened.
    pub events: TickEvents,
}

/// Outcome of a skirmish.
#[derive(Debug, Clone, Serialize)]
pub struct SkirmishReport {
    /// Skirmish name.
    pub name: String,
    /// Ticks run.
    pub ticks: u64,
    /// Final simulation time in seconds.
    #[serde(with = "decimal_serde")]
    pub time: Fixed,
    /// Final state hash.
    pub state_hash: u64,
    /// Abilities fired, keyed by ability id.
    pub triggers: BTreeMap<String, u64>,
    /// Effect cues played, keyed by cue.
    pub cues: BTreeMap<String, u64>,
    /// Every unit, in id order.
    pub units: Vec<UnitSummary>,
    /// Non-empty ticks, if the log was requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<LoggedTick>,
}

impl SkirmishReport {
    /// Units still standing on `side`.
    #[must_use]
    pub fn survivors(&self, side: Allegiance) -> usize {
        self.units
            .iter()
            .filter(|unit| unit.side == side && unit.status == "Active")
            .count()
    }
}

/// Run `skirmish` against `catalog`.
///
/// With `keep_log` set, every non-empty tick's events are kept in the
/// report.
///
/// # Errors
///
/// Returns an error if a placement names an unknown unit type.
pub fn run(catalog: &Catalog, skirmish: &Skirmish, keep_log: bool) -> Result<SkirmishReport> {
    let mut sim = Simulation::new();
    for placement in &skirmish.placements {
        let position = Vec2Fixed::new(placement.x, placement.y);
        sim.spawn_from_catalog(
            catalog,
            &placement.unit_type,
            SpawnParams::new(placement.side, position),
        )?;
    }
    tracing::info!(
        name = %skirmish.name,
        units = sim.units().len(),
        ticks = skirmish.ticks,
        "skirmish started"
    );

    let mut cues = CueCounter::default();
    let mut triggers: BTreeMap<String, u64> = BTreeMap::new();
    let mut dealt: BTreeMap<EntityId, Fixed> = BTreeMap::new();
    let mut log = Vec::new();

    for tick in 1..=skirmish.ticks {
        let events = sim.tick(skirmish.dt);
        events.dispatch(&mut cues);

        for trigger in &events.triggered {
            *triggers.entry(trigger.ability.clone()).or_default() += 1;
        }
        for hit in &events.damage {
            let total = dealt.entry(hit.source.caster).or_insert(Fixed::ZERO);
            *total = total.saturating_add(hit.amount);
        }
        for diagnostic in &events.diagnostics {
            tracing::warn!(
                unit = diagnostic.unit,
                ability = %diagnostic.ability,
                "{}",
                diagnostic.message
            );
        }
        if !events.defeated.is_empty() {
            tracing::debug!(tick, defeated = ?events.defeated, "units defeated");
        }

        if keep_log && !events.is_empty() {
            log.push(LoggedTick { tick, events });
        }
    }

    let units = sim
        .units()
        .sorted_ids()
        .into_iter()
        .filter_map(|id| sim.unit(id))
        .map(|unit| UnitSummary {
            id: unit.id,
            unit_type: unit.type_id.clone(),
            side: unit.allegiance,
            status: variant_name(&unit.status),
            health: unit.health(),
            damage_dealt: dealt.get(&unit.id).copied().unwrap_or(Fixed::ZERO),
        })
        .collect();

    Ok(SkirmishReport {
        name: skirmish.name.clone(),
        ticks: skirmish.ticks,
        time: sim.time(),
        state_hash: sim.state_hash(),
        triggers,
        cues: cues.counts().clone(),
        units,
        log,
    })
}

/// Render a report as plain text.
#[must_use]
pub fn render_summary(report: &SkirmishReport) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} - {} ticks, {}s, hash {:016x}",
        report.name, report.ticks, report.time, report.state_hash
    );
    let _ = writeln!(
        out,
        "survivors: friendly {} / enemy {}",
        report.survivors(Allegiance::Friendly),
        report.survivors(Allegiance::Enemy)
    );
    for (ability, count) in &report.triggers {
        let _ = writeln!(out, "  {ability:<20} fired {count}");
    }
    for unit in &report.units {
        let _ = writeln!(
            out,
            "  #{:<3} {:<12} {:<9} {:<9} hp {:>8.2} dealt {:>8.2}",
            unit.id,
            unit.unit_type,
            format!("{:?}", unit.side),
            unit.status,
            unit.health.to_num::<f64>(),
            unit.damage_dealt.to_num::<f64>()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ability_test_utils::fixtures::{bundled_catalog, fixed};

    #[test]
    fn test_parse_skirmish_ron() {
        let skirmish = Skirmish::from_ron_str(
            r#"Skirmish(
                name: "duel",
                dt: 0.5,
                placements: [
                    (unit_type: "thunder", side: Friendly, x: 0.0, y: 0.0),
                    (unit_type: "rock", side: Enemy, x: 4.0, y: 0.0),
                ],
            )"#,
            "inline",
        )
        .unwrap();
        assert_eq!(skirmish.ticks, 60);
        assert_eq!(skirmish.dt, Fixed::from_num(0.5));
        assert_eq!(skirmish.placements.len(), 2);
    }

    #[test]
    fn test_unknown_unit_type_fails() {
        let skirmish = Skirmish {
            name: "bad".to_string(),
            dt: Fixed::ONE,
            ticks: 1,
            placements: vec![Placement {
                unit_type: "dragon".to_string(),
                side: Allegiance::Enemy,
                x: Fixed::ZERO,
                y: Fixed::ZERO,
            }],
        };
        assert!(run(&bundled_catalog(), &skirmish, false).is_err());
    }

    #[test]
    fn test_full_roster_run_is_reproducible() {
        let catalog = bundled_catalog();
        let skirmish = Skirmish::full_roster(&catalog, 40, fixed(1));
        let first = run(&catalog, &skirmish, true).unwrap();
        let second = run(&catalog, &skirmish, false).unwrap();

        assert_eq!(first.state_hash, second.state_hash);
        assert_eq!(first.units.len(), 22);
        assert!(!first.triggers.is_empty());
        assert!(!first.log.is_empty());
        assert!(second.log.is_empty());
        assert!(render_summary(&first).contains("survivors"));
    }

    #[test]
    fn test_report_encodes_as_json() {
        let catalog = bundled_catalog();
        let skirmish = Skirmish::full_roster(&catalog, 10, fixed(1));
        let report = run(&catalog, &skirmish, true).unwrap();
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"state_hash\""));
    }
}
