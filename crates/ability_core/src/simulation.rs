//! Core simulation loop.
//!
//! The simulation owns every unit and advances all per-unit state machines
//! deterministically. This module is where the pieces meet: timers, pools,
//! ability schedulers and effect resolvers.
//!
//! # Determinism
//!
//! All operations in this module are fully deterministic:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - No system randomness
//! - Consistent iteration order (sorted unit ids)
//! - Every query reads a snapshot taken at the start of the tick
//!
//! # Example
//!
//! ```
//! use ability_core::components::Allegiance;
//! use ability_core::data::UnitTypeData;
//! use ability_core::math::{Fixed, Vec2Fixed};
//! use ability_core::simulation::{Simulation, SpawnParams};
//!
//! let rock = UnitTypeData::new("rock", Fixed::from_num(200), Fixed::from_num(8), Fixed::from_num(2));
//!
//! let mut sim = Simulation::new();
//! let id = sim
//!     .spawn(&rock, SpawnParams::new(Allegiance::Friendly, Vec2Fixed::ZERO))
//!     .unwrap();
//!
//! let events = sim.tick(Fixed::ONE);
//! assert!(events.damage.is_empty());
//! assert_eq!(sim.unit(id).unwrap().health(), Fixed::from_num(200));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityInstance;
use crate::components::{Allegiance, EntityId};
use crate::data::{AbilityData, Catalog, UnitTypeData};
use crate::effects::{self, EffectContext};
use crate::error::{EngineError, Result};
use crate::events::{DamageEvent, DamageKind, Diagnostic, PoolEvent, TickEvents};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::resource::{PoolTransition, ResourcePool};
use crate::targeting::{LinearScanProvider, SpatialQueryProvider, TargetQuery, WorldSnapshot};
use crate::timers::TimedEvent;
use crate::unit::{DamageSink, Unit};

/// Parameters for spawning a unit.
#[derive(Debug, Clone, Copy)]
pub struct SpawnParams {
    /// Side the unit fights for.
    pub allegiance: Allegiance,
    /// Initial position.
    pub position: Vec2Fixed,
    /// Initial facing. Defaults to +X.
    pub facing: Option<Vec2Fixed>,
}

impl SpawnParams {
    /// Spawn at `position` facing +X.
    #[must_use]
    pub const fn new(allegiance: Allegiance, position: Vec2Fixed) -> Self {
        Self {
            allegiance,
            position,
            facing: None,
        }
    }
}

/// Storage for all units in the simulation.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration via
/// sorted keys when processing a tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitStorage {
    units: HashMap<EntityId, Unit>,
    next_id: EntityId,
}

impl UnitStorage {
    /// Create empty unit storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a unit, assign it the next id and return that id.
    pub fn insert(&mut self, mut unit: Unit) -> EntityId {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit by id.
    pub fn remove(&mut self, id: EntityId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.units.contains_key(&id)
    }

    /// Get the number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Get sorted unit ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all units (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }
}

/// The ability engine.
///
/// # Tick Order
///
/// Each tick runs these steps:
/// 1. **Clock** - advance simulation time by `dt`
/// 2. **Snapshot** - capture positions and states for every query
/// 3. **Timers** - fire due buff expiries, burn ticks and revival lapses
/// 4. **Units** - in id order: pool regen/drain, then every ability in
///    slot order
///
/// Defeats are settled after the timer step and after every unit's turn,
/// so a unit defeated mid-tick never acts or lingers into the next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Current simulation time in seconds.
    #[serde(with = "fixed_serde")]
    time: Fixed,
    /// Number of ticks run.
    tick: u64,
    /// All units.
    units: UnitStorage,
    /// Events raised between ticks, reported with the next tick.
    #[serde(skip)]
    pending: TickEvents,
}

impl Simulation {
    /// Create an empty simulation at time 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            time: Fixed::ZERO,
            tick: 0,
            units: UnitStorage::new(),
            pending: TickEvents::default(),
        }
    }

    /// Current simulation time in seconds.
    #[must_use]
    pub const fn time(&self) -> Fixed {
        self.time
    }

    /// Number of ticks run.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// All units.
    #[must_use]
    pub fn units(&self) -> &UnitStorage {
        &self.units
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(id)
    }

    fn unit_mut(&mut self, id: EntityId) -> Result<&mut Unit> {
        self.units.get_mut(id).ok_or(EngineError::EntityNotFound(id))
    }

    // ------------------------------------------------------------------
    // Host operations
    // ------------------------------------------------------------------

    /// Spawn a unit of `unit_type`.
    ///
    /// Abilities that reference a resource pool the type does not declare
    /// are disabled, and a [`Diagnostic`] is reported with the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the unit type fails
    /// validation.
    pub fn spawn(&mut self, unit_type: &UnitTypeData, params: SpawnParams) -> Result<EntityId> {
        unit_type.validate()?;

        let mut unit = Unit::new(
            0,
            unit_type.id.clone(),
            params.allegiance,
            params.position,
            unit_type.stats(),
        );
        if let Some(facing) = params.facing {
            unit.facing = facing.normalize();
        }
        unit.resource = unit_type.resource.as_ref().map(|data| data.build());
        let pool = unit.resource.clone();

        let id = self.units.insert(unit);

        let mut abilities = Vec::with_capacity(unit_type.abilities.len());
        for (slot, config) in (0u8..).zip(&unit_type.abilities) {
            let instance = match missing_reference(config, pool.as_ref()) {
                Some(message) => {
                    tracing::warn!(unit = id, ability = %config.id, %message, "ability disabled");
                    self.pending.diagnostics.push(Diagnostic {
                        unit: id,
                        slot,
                        ability: config.id.clone(),
                        message,
                    });
                    AbilityInstance::disabled(slot, config.clone())
                }
                None => AbilityInstance::new(slot, config.clone(), self.time),
            };
            abilities.push(instance);
        }
        if let Some(unit) = self.units.get_mut(id) {
            unit.abilities = abilities;
        }

        tracing::debug!(unit = id, unit_type = %unit_type.id, "unit spawned");
        Ok(id)
    }

    /// Spawn a unit by catalog id.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownUnitType`] if the catalog has no such type.
    pub fn spawn_from_catalog(
        &mut self,
        catalog: &Catalog,
        type_id: &str,
        params: SpawnParams,
    ) -> Result<EntityId> {
        let unit_type = catalog.require(type_id)?;
        self.spawn(unit_type, params)
    }

    /// Remove a unit, running the defeat cancellation path first.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntityNotFound`] if the unit does not exist.
    pub fn despawn(&mut self, id: EntityId) -> Result<Unit> {
        if !self.units.contains(id) {
            return Err(EngineError::EntityNotFound(id));
        }
        let mut events = std::mem::take(&mut self.pending);
        effects::deactivate_unit(&mut self.units, id, &mut events);
        effects::release_references(&mut self.units, id);
        self.pending = events;
        self.units.remove(id).ok_or(EngineError::EntityNotFound(id))
    }

    /// Set the unit's current target (or clear it).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntityNotFound`] if either unit does not exist.
    pub fn set_target(&mut self, id: EntityId, target: Option<EntityId>) -> Result<()> {
        if let Some(target) = target {
            if !self.units.contains(target) {
                return Err(EngineError::EntityNotFound(target));
            }
        }
        self.unit_mut(id)?.target = target;
        Ok(())
    }

    /// Move a unit. Takes effect from the next tick's snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntityNotFound`] if the unit does not exist.
    pub fn set_position(&mut self, id: EntityId, position: Vec2Fixed) -> Result<()> {
        self.unit_mut(id)?.position = position;
        Ok(())
    }

    /// Deal host-originated damage (basic attacks, hazards).
    ///
    /// A unit brought to zero is defeated immediately; the defeat is
    /// reported with the next tick. Returns the damage actually taken.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntityNotFound`] if the unit does not exist.
    pub fn apply_damage(&mut self, id: EntityId, amount: Fixed) -> Result<Fixed> {
        let dealt = self.unit_mut(id)?.take_damage(amount);
        let mut events = std::mem::take(&mut self.pending);
        settle_defeats(&mut self.units, &mut events);
        self.pending = events;
        Ok(dealt)
    }

    /// Heal a unit. Returns the amount actually healed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EntityNotFound`] if the unit does not exist.
    pub fn heal(&mut self, id: EntityId, amount: Fixed) -> Result<Fixed> {
        Ok(self.unit_mut(id)?.heal(amount))
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by `dt` seconds using a linear-scan provider.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        let snapshot = WorldSnapshot::capture(self.units.iter());
        let provider = LinearScanProvider::from_snapshot(&snapshot);
        self.advance(dt, &snapshot, &provider)
    }

    /// Advance the simulation by `dt` seconds using the host's spatial index.
    pub fn tick_with(&mut self, dt: Fixed, spatial: &dyn SpatialQueryProvider) -> TickEvents {
        let snapshot = WorldSnapshot::capture(self.units.iter());
        self.advance(dt, &snapshot, spatial)
    }

    /// The tick loop over a snapshot captured before anything moved.
    fn advance(
        &mut self,
        dt: Fixed,
        snapshot: &WorldSnapshot,
        spatial: &dyn SpatialQueryProvider,
    ) -> TickEvents {
        let dt = dt.max(Fixed::ZERO);
        let mut events = std::mem::take(&mut self.pending);

        self.time = self.time.saturating_add(dt);
        self.tick += 1;

        let query = TargetQuery::new(snapshot, spatial);
        let ids = self.units.sorted_ids();

        for &id in &ids {
            run_timers(&mut self.units, id, self.time, &mut events);
        }
        settle_defeats(&mut self.units, &mut events);

        for &id in &ids {
            self.run_unit(id, dt, query, &mut events);
            settle_defeats(&mut self.units, &mut events);
        }

        events.time = self.time;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// One unit's turn: pool, then every ability in slot order.
    fn run_unit(&mut self, id: EntityId, dt: Fixed, query: TargetQuery<'_>, events: &mut TickEvents) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if !unit.is_active() {
            return;
        }

        if let Some(pool) = unit.resource.as_mut() {
            let transition = pool.tick(dt);
            if transition != PoolTransition::None {
                tracing::debug!(unit = id, ?transition, current = %pool.current(), "pool transition");
                events.pool_transitions.push(PoolEvent {
                    unit: id,
                    transition,
                });
            }
        }

        let mut abilities = std::mem::take(&mut unit.abilities);
        {
            let mut ctx = EffectContext {
                now: self.time,
                dt,
                caster: id,
                query,
                units: &mut self.units,
                events,
            };
            for instance in &mut abilities {
                effects::run(instance, &mut ctx);
            }
        }
        if let Some(unit) = self.units.get_mut(id) {
            unit.abilities = abilities;
        }
    }

    // ------------------------------------------------------------------
    // Determinism
    // ------------------------------------------------------------------

    /// Compute a hash of the complete simulation state.
    ///
    /// Covers the clock and every unit in id order: stats, buffs, pending
    /// timers, pools and ability schedulers.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.time.to_bits().hash(&mut hasher);

        let ids = self.units.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(unit) = self.units.get(id) {
                unit.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the simulation state to bytes.
    ///
    /// Scheduled timers are plain data and survive the round-trip. Events
    /// not yet reported by a tick are not part of the state.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| EngineError::InvalidState(format!("Failed to serialize simulation: {e}")))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            EngineError::InvalidState(format!("Failed to deserialize simulation: {e}"))
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

/// Describe a reference `config` needs but the unit does not provide.
fn missing_reference(config: &AbilityData, pool: Option<&ResourcePool>) -> Option<String> {
    if config.has_cost() && pool.is_none() {
        return Some(format!("costs {} but the unit has no resource pool", config.cost));
    }
    if config.kind.requires_pool() {
        match pool {
            None => return Some("resource-driven mode without a resource pool".to_string()),
            Some(pool) if pool.thresholds().is_none() => {
                return Some("resource pool has no overdrive threshold".to_string());
            }
            Some(_) => {}
        }
    }
    None
}

/// Fire every timer on `id` that is due at `now`.
fn run_timers(units: &mut UnitStorage, id: EntityId, now: Fixed, events: &mut TickEvents) {
    loop {
        let Some(unit) = units.get_mut(id) else {
            return;
        };
        let Some(entry) = unit.timers_mut().pop_due(now) else {
            return;
        };

        match entry.event {
            TimedEvent::BuffExpiry { buff } => {
                if unit.remove_buff(buff) {
                    tracing::trace!(unit = id, buff, "buff expired");
                }
            }
            TimedEvent::DotTick { dot } => {
                if let Some((source, amount)) = unit.fire_dot(dot, entry.at) {
                    events.damage.push(DamageEvent {
                        source,
                        target: id,
                        amount,
                        kind: DamageKind::Burn,
                    });
                }
            }
            TimedEvent::RevivalLapse => {
                tracing::debug!(unit = id, "revival lapsed");
                defeat(units, id, events);
            }
        }
    }
}

/// Defeat every active unit with no health left, in id order.
fn settle_defeats(units: &mut UnitStorage, events: &mut TickEvents) {
    for id in units.sorted_ids() {
        let fallen = units
            .get(id)
            .is_some_and(|unit| unit.is_active() && unit.health() <= Fixed::ZERO);
        if fallen {
            defeat(units, id, events);
        }
    }
}

/// Defeat `id` and cancel everything it is involved in.
fn defeat(units: &mut UnitStorage, id: EntityId, events: &mut TickEvents) {
    let Some(unit) = units.get_mut(id) else {
        return;
    };
    if unit.status.is_defeated() {
        return;
    }
    unit.mark_defeated();
    effects::deactivate_unit(units, id, events);
    effects::release_references(units, id);

    tracing::debug!(unit = id, "unit defeated");
    events.defeated.push(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffs::BuffSpec;
    use crate::components::UnitStatus;
    use crate::data::{AbilityKind, OverdriveTrigger, ResourcePoolData};
    use crate::events::EffectCue;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn plain(id: &str, health: i32) -> UnitTypeData {
        UnitTypeData::new(id, fx(health), fx(10), fx(3))
    }

    fn at(allegiance: Allegiance, x: i32, y: i32) -> SpawnParams {
        SpawnParams::new(allegiance, Vec2Fixed::from_int(x, y))
    }

    #[test]
    fn test_simulation_new() {
        let sim = Simulation::new();
        assert_eq!(sim.get_tick(), 0);
        assert_eq!(sim.time(), fx(0));
        assert!(sim.units().is_empty());
    }

    #[test]
    fn test_spawn_assigns_sequential_ids() {
        let mut sim = Simulation::new();
        let a = sim.spawn(&plain("a", 10), at(Allegiance::Friendly, 0, 0)).unwrap();
        let b = sim.spawn(&plain("b", 10), at(Allegiance::Enemy, 1, 0)).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(sim.unit(b).unwrap().type_id, "b");
    }

    #[test]
    fn test_spawn_rejects_invalid_type() {
        let mut sim = Simulation::new();
        let err = sim.spawn(&plain("bad", -1), at(Allegiance::Friendly, 0, 0));
        assert!(matches!(err, Err(EngineError::InvalidConfig { .. })));
    }

    #[test]
    fn test_cost_without_pool_disables_with_diagnostic() {
        let chain = AbilityData::new(
            "zap",
            AbilityKind::Chain {
                range: fx(5),
                chain_range: fx(5),
                damage: fx(10),
                max_chain_targets: 2,
                chain_damage_reduction: Fixed::from_num(0.5),
            },
        )
        .with_cost(fx(10));
        let mut sim = Simulation::new();
        let id = sim
            .spawn(&plain("thunder", 50).with_ability(chain), at(Allegiance::Friendly, 0, 0))
            .unwrap();
        sim.spawn(&plain("dummy", 50), at(Allegiance::Enemy, 1, 0)).unwrap();

        assert!(sim.unit(id).unwrap().abilities[0].is_disabled());
        let events = sim.tick(fx(1));
        assert_eq!(events.diagnostics.len(), 1);
        assert_eq!(events.diagnostics[0].ability, "zap");
        assert!(events.damage.is_empty());

        // Reported once.
        assert!(sim.tick(fx(1)).diagnostics.is_empty());
    }

    #[test]
    fn test_resource_mode_without_threshold_is_diagnosed() {
        let mode = AbilityData::new(
            "overdrive",
            AbilityKind::Overdrive {
                trigger: OverdriveTrigger::Resource,
                buff: BuffSpec::multipliers(fx(2), fx(2)),
            },
        );
        let unit_type = plain("machine", 50)
            .with_resource(ResourcePoolData {
                max: fx(100),
                regen_rate: fx(5),
                consume_rate: fx(2),
                high_threshold: None,
                low_threshold: None,
                starting: fx(0),
            })
            .with_ability(mode);
        let mut sim = Simulation::new();
        sim.spawn(&unit_type, at(Allegiance::Friendly, 0, 0)).unwrap();
        assert_eq!(sim.tick(fx(1)).diagnostics.len(), 1);
    }

    #[test]
    fn test_host_damage_defeats_and_reports_next_tick() {
        let mut sim = Simulation::new();
        let id = sim.spawn(&plain("a", 10), at(Allegiance::Friendly, 0, 0)).unwrap();

        assert_eq!(sim.apply_damage(id, fx(25)).unwrap(), fx(10));
        assert_eq!(sim.unit(id).unwrap().status, UnitStatus::Defeated);
        assert_eq!(sim.tick(fx(1)).defeated, vec![id]);
        assert!(sim.apply_damage(99, fx(1)).is_err());
    }

    #[test]
    fn test_burn_ticks_and_expires() {
        let burst = AbilityData::new(
            "incendiary",
            AbilityKind::BurstBurn {
                radius: fx(3),
                damage: fx(10),
                burn_damage: fx(2),
                burn_interval: fx(1),
                burn_duration: fx(3),
            },
        )
        .with_cooldown(fx(100));
        let mut sim = Simulation::new();
        sim.spawn(&plain("pyro", 50).with_ability(burst), at(Allegiance::Friendly, 0, 0))
            .unwrap();
        let target = sim.spawn(&plain("dummy", 100), at(Allegiance::Enemy, 2, 0)).unwrap();

        let first = sim.tick(fx(1));
        assert_eq!(first.damage_to(target), fx(10));
        assert!(first.effects.iter().any(|e| e.cue == EffectCue::Burst));

        for _ in 0..3 {
            let events = sim.tick(fx(1));
            assert_eq!(events.damage_to(target), fx(2));
        }
        assert_eq!(sim.tick(fx(1)).damage_to(target), fx(0));
        assert_eq!(sim.unit(target).unwrap().health(), fx(84));
        assert!(sim.unit(target).unwrap().dots().is_empty());
    }

    /// Broad phase that returns every unit it knows about.
    struct EveryUnit(Vec<EntityId>);

    impl SpatialQueryProvider for EveryUnit {
        fn query_radius(&self, _center: Vec2Fixed, _radius: Fixed) -> Vec<EntityId> {
            self.0.clone()
        }

        fn query_box(&self, _: Vec2Fixed, _: Vec2Fixed, _: Vec2Fixed) -> Vec<EntityId> {
            self.0.clone()
        }
    }

    #[test]
    fn test_host_broad_phase_matches_linear_scan() {
        let burst = AbilityData::new(
            "incendiary",
            AbilityKind::BurstBurn {
                radius: fx(3),
                damage: fx(10),
                burn_damage: fx(2),
                burn_interval: fx(1),
                burn_duration: fx(3),
            },
        )
        .with_cooldown(fx(2));
        let mut linear = Simulation::new();
        linear
            .spawn(&plain("pyro", 50).with_ability(burst), at(Allegiance::Friendly, 0, 0))
            .unwrap();
        linear.spawn(&plain("near", 100), at(Allegiance::Enemy, 2, 0)).unwrap();
        linear.spawn(&plain("far", 100), at(Allegiance::Enemy, 9, 0)).unwrap();
        let mut hosted = linear.clone();
        let everyone = EveryUnit(linear.units().sorted_ids());

        for _ in 0..5 {
            assert_eq!(linear.tick(fx(1)), hosted.tick_with(fx(1), &everyone));
        }
        assert_eq!(linear.state_hash(), hosted.state_hash());
        assert_eq!(hosted.unit(3).unwrap().health(), fx(100));
    }

    #[test]
    fn test_despawn_cancels_burns_it_applied() {
        let burst = AbilityData::new(
            "incendiary",
            AbilityKind::BurstBurn {
                radius: fx(3),
                damage: fx(1),
                burn_damage: fx(2),
                burn_interval: fx(1),
                burn_duration: fx(10),
            },
        )
        .with_cooldown(fx(100));
        let mut sim = Simulation::new();
        let pyro = sim
            .spawn(&plain("pyro", 50).with_ability(burst), at(Allegiance::Friendly, 0, 0))
            .unwrap();
        let target = sim.spawn(&plain("dummy", 100), at(Allegiance::Enemy, 2, 0)).unwrap();

        sim.tick(fx(1));
        assert_eq!(sim.unit(target).unwrap().dots().len(), 1);

        let removed = sim.despawn(pyro).unwrap();
        assert_eq!(removed.id, pyro);
        assert!(sim.unit(target).unwrap().dots().is_empty());
        assert!(sim.unit(target).unwrap().timers().is_empty());
        assert!(sim.despawn(pyro).is_err());
    }

    #[test]
    fn test_set_target_validates_ids() {
        let mut sim = Simulation::new();
        let a = sim.spawn(&plain("a", 10), at(Allegiance::Friendly, 0, 0)).unwrap();
        assert!(sim.set_target(a, Some(42)).is_err());
        assert!(sim.set_target(42, None).is_err());
        assert!(sim.set_target(a, None).is_ok());
    }

    #[test]
    fn test_serialization_round_trip_preserves_hash() {
        let mut sim = Simulation::new();
        sim.spawn(&plain("a", 10), at(Allegiance::Friendly, 0, 0)).unwrap();
        sim.tick(fx(1));

        let bytes = sim.serialize().unwrap();
        let restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(sim.state_hash(), restored.state_hash());
        assert!(Simulation::deserialize(&[1, 2, 3]).is_err());
    }
}
