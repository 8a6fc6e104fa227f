//! Events generated during a simulation tick.
//!
//! These events can be used by the host to trigger effects, sounds and
//! UI updates. The engine never reads them back.

use serde::{Deserialize, Serialize};

use crate::buffs::BuffSource;
use crate::components::EntityId;
use crate::math::{decimal_serde, Fixed, Vec2Fixed};
use crate::resource::PoolTransition;

/// How damage was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    /// Instant hit from a triggered ability.
    Direct,
    /// One tick of a damage-over-time effect.
    Burn,
}

/// Damage dealt to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageEvent {
    /// Ability that dealt it.
    pub source: BuffSource,
    /// Unit that received it.
    pub target: EntityId,
    /// Damage actually taken, after the sink clamped it.
    #[serde(with = "decimal_serde")]
    pub amount: Fixed,
    /// Delivery.
    pub kind: DamageKind,
}

/// A triggered ability fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Unit and slot that fired.
    pub source: BuffSource,
    /// Ability id.
    pub ability: String,
    /// Units the effect landed on, in resolution order.
    pub targets: Vec<EntityId>,
}

/// A resource pool changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvent {
    /// Pool owner.
    pub unit: EntityId,
    /// What happened.
    pub transition: PoolTransition,
}

/// A threshold-driven combat mode switched on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeEvent {
    /// Ability driving the mode.
    pub source: BuffSource,
    /// New state.
    pub active: bool,
}

/// A defeated unit came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevivalEvent {
    /// Revived unit.
    pub unit: EntityId,
    /// Ability that revived it.
    pub source: BuffSource,
    /// Health it came back with.
    #[serde(with = "decimal_serde")]
    pub health: Fixed,
}

/// Visual/audio cue the host may play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectCue {
    /// Area burst around the caster.
    Burst,
    /// Arc between two units of a chain.
    ChainArc {
        /// Previous unit in the chain (the caster for the first hop).
        from: EntityId,
        /// Unit hit.
        to: EntityId,
    },
    /// Directional wave.
    Wave,
    /// Area buff or debuff.
    Buff,
    /// An ally was absorbed.
    Absorb,
    /// An ally was revived.
    Revive,
    /// A combat mode switched on.
    ModeOn,
    /// A combat mode switched off.
    ModeOff,
}

/// One-way "play effect X at position P" notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectNotification {
    /// What to play.
    pub cue: EffectCue,
    /// Where to play it.
    pub position: Vec2Fixed,
    /// Ability that caused it.
    pub source: BuffSource,
}

/// Configuration problem surfaced to the host.
///
/// The ability named here is disabled; the simulation keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Unit carrying the ability.
    pub unit: EntityId,
    /// Ability slot.
    pub slot: u8,
    /// Ability id.
    pub ability: String,
    /// What is wrong.
    pub message: String,
}

/// Host-side sink for effect notifications.
///
/// Fire-and-forget: the engine never waits on or branches on it.
pub trait EffectSpawnNotifier {
    /// Play `notification`.
    fn spawn_effect(&mut self, notification: &EffectNotification);
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Simulation time at the end of the tick.
    #[serde(with = "decimal_serde")]
    pub time: Fixed,
    /// Damage, in application order.
    pub damage: Vec<DamageEvent>,
    /// Units defeated this tick.
    pub defeated: Vec<EntityId>,
    /// Units revived this tick.
    pub revived: Vec<RevivalEvent>,
    /// Absorbed units returned to play this tick.
    pub released: Vec<EntityId>,
    /// Triggered abilities that fired.
    pub triggered: Vec<TriggerEvent>,
    /// Resource pool transitions.
    pub pool_transitions: Vec<PoolEvent>,
    /// Combat mode switches.
    pub modes: Vec<ModeEvent>,
    /// Effect notifications for the host.
    pub effects: Vec<EffectNotification>,
    /// Configuration diagnostics.
    pub diagnostics: Vec<Diagnostic>,
}

impl TickEvents {
    /// Forward every effect notification to `notifier`, in order.
    pub fn dispatch(&self, notifier: &mut dyn EffectSpawnNotifier) {
        for notification in &self.effects {
            notifier.spawn_effect(notification);
        }
    }

    /// Total damage dealt to `target` this tick.
    #[must_use]
    pub fn damage_to(&self, target: EntityId) -> Fixed {
        self.damage
            .iter()
            .filter(|event| event.target == target)
            .fold(Fixed::ZERO, |acc, event| acc.saturating_add(event.amount))
    }

    /// Check if nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.damage.is_empty()
            && self.defeated.is_empty()
            && self.revived.is_empty()
            && self.released.is_empty()
            && self.triggered.is_empty()
            && self.pool_transitions.is_empty()
            && self.modes.is_empty()
            && self.effects.is_empty()
            && self.diagnostics.is_empty()
    }

    /// Append another tick's events.
    pub fn merge(&mut self, other: Self) {
        self.time = other.time;
        self.damage.extend(other.damage);
        self.defeated.extend(other.defeated);
        self.revived.extend(other.revived);
        self.released.extend(other.released);
        self.triggered.extend(other.triggered);
        self.pool_transitions.extend(other.pool_transitions);
        self.modes.extend(other.modes);
        self.effects.extend(other.effects);
        self.diagnostics.extend(other.diagnostics);
    }
}
