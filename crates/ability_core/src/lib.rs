//! # Ability Core
//!
//! Deterministic per-unit ability, resource and timed-effect engine for
//! Monster Arena.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless battle simulation
//! - Save/restore mid-battle (timers are plain data)
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`unit`] - Unit record and stat mutation rules
//! - [`resource`] - Resource pools with hysteresis overdrive
//! - [`buffs`] - Timed, stacked, reversible stat modifiers
//! - [`timers`] - Scheduled events replacing blocking waits
//! - [`targeting`] - Snapshot queries over a host spatial index
//! - [`abilities`] - Ability instances and the cooldown scheduler
//! - [`effects`] - Effect resolvers, one per ability kind
//! - [`data`] - Authored unit type and ability configuration
//! - [`simulation`] - Core simulation loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod buffs;
pub mod components;
pub mod data;
pub mod effects;
pub mod error;
pub mod events;
pub mod math;
pub mod resource;
pub mod simulation;
pub mod targeting;
pub mod timers;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::abilities::{AbilityInstance, AbilityScheduler, SchedulerState, TriggerOutcome};
    pub use crate::buffs::{BuffSource, BuffSpec};
    pub use crate::components::*;
    pub use crate::data::{AbilityData, AbilityKind, Catalog, ResourcePoolData, UnitTypeData};
    pub use crate::error::{EngineError, Result};
    pub use crate::events::{EffectSpawnNotifier, TickEvents};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::resource::{PoolTransition, ResourcePool};
    pub use crate::simulation::{Simulation, SpawnParams};
    pub use crate::targeting::{SpatialQueryProvider, TargetQuery};
    pub use crate::unit::{DamageSink, Unit};
}
