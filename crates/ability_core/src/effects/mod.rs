//! Effect resolvers, one per [`AbilityKind`].
//!
//! Every ability is driven through [`run`] once per tick, during its
//! caster's turn. Triggered kinds go through two phases:
//!
//! 1. [`select`] reads the start-of-tick snapshot and decides whether
//!    there is anything to act on. It mutates nothing.
//! 2. Only if the scheduler accepts the trigger (target present, cost
//!    paid) does [`resolve`] apply damage, buffs and status changes.
//!
//! Continuous and threshold kinds are maintained every tick instead, as
//! diffs against the standing grants their instance already holds.

mod auras;
mod damage;
mod support;

use std::collections::BTreeSet;

use crate::abilities::AbilityInstance;
use crate::buffs::BuffSource;
use crate::components::{Allegiance, EntityId};
use crate::data::{AbilityCategory, AbilityKind};
use crate::events::{DamageEvent, DamageKind, EffectCue, EffectNotification, TickEvents, TriggerEvent};
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::UnitStorage;
use crate::targeting::{TargetFilter, TargetQuery};
use crate::unit::DamageSink;

pub use support::{deactivate_unit, release_references};

/// Everything a resolver may touch during one caster's turn.
pub struct EffectContext<'a> {
    /// Simulation time of this tick.
    pub now: Fixed,
    /// Length of this tick.
    pub dt: Fixed,
    /// Unit whose abilities are running.
    pub caster: EntityId,
    /// Read-only queries over the start-of-tick snapshot.
    pub query: TargetQuery<'a>,
    /// Live units. The caster's own ability list is detached while it runs.
    pub units: &'a mut UnitStorage,
    /// Output for this tick.
    pub events: &'a mut TickEvents,
}

/// Targets chosen for a triggered ability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Every enemy caught in the burst.
    Burst(Vec<EntityId>),
    /// First unit of the chain.
    Chain(EntityId),
    /// Direction of the wave and every enemy inside it.
    Wave {
        /// Normalized direction from the caster.
        direction: Vec2Fixed,
        /// Enemies inside the box.
        targets: Vec<EntityId>,
    },
    /// Units receiving a timed buff.
    Buff(Vec<EntityId>),
    /// Ally to absorb.
    Absorb(EntityId),
    /// Defeated ally to revive.
    Revive(EntityId),
}

impl EffectContext<'_> {
    /// Caster position and side at the start of the tick.
    fn caster_view(&self) -> Option<(Vec2Fixed, Allegiance)> {
        self.query
            .snapshot()
            .get(self.caster)
            .map(|entry| (entry.position, entry.allegiance))
    }

    /// Check if the caster is still in play.
    #[must_use]
    pub fn caster_active(&self) -> bool {
        self.is_live(self.caster)
    }

    /// Check if a unit is active and has health left right now, not just
    /// in the snapshot.
    fn is_live(&self, id: EntityId) -> bool {
        self.units
            .get(id)
            .is_some_and(|unit| unit.is_active() && unit.health() > Fixed::ZERO)
    }

    /// Units active in the snapshot that have left play since.
    fn fallen(&self) -> BTreeSet<EntityId> {
        self.query
            .snapshot()
            .iter()
            .filter(|entry| entry.status.is_active() && !self.is_live(entry.id))
            .map(|entry| entry.id)
            .collect()
    }

    /// Drop ids that have left play earlier in this tick.
    fn retain_live(&self, mut ids: Vec<EntityId>) -> Vec<EntityId> {
        ids.retain(|&id| self.is_live(id));
        ids
    }

    /// Enemy to aim at: the caster's current target while it is a live
    /// enemy within `range`, otherwise the nearest live enemy within `range`.
    fn preferred_enemy(&self, range: Fixed) -> Option<EntityId> {
        let (position, allegiance) = self.caster_view()?;
        let filter = TargetFilter::enemies(self.caster, allegiance);

        let current = self.units.get(self.caster).and_then(|unit| unit.target);
        let valid_current = current.filter(|&target| {
            self.is_live(target)
                && self.query.snapshot().get(target).is_some_and(|entry| {
                    filter.accepts(entry)
                        && entry.position.distance_squared(position) <= range.saturating_mul(range)
                })
        });

        valid_current.or_else(|| {
            self.query
                .nearest_unvisited(position, range, &self.fallen(), &filter)
        })
    }

    /// Apply damage to a live unit and record it.
    fn deal_damage(
        &mut self,
        source: BuffSource,
        target: EntityId,
        amount: Fixed,
        kind: DamageKind,
    ) -> Fixed {
        let Some(unit) = self.units.get_mut(target) else {
            return Fixed::ZERO;
        };
        if !unit.is_active() {
            return Fixed::ZERO;
        }
        let dealt = unit.take_damage(amount);
        self.events.damage.push(DamageEvent {
            source,
            target,
            amount: dealt,
            kind,
        });
        dealt
    }

    fn notify(&mut self, cue: EffectCue, position: Vec2Fixed, source: BuffSource) {
        self.events.effects.push(EffectNotification {
            cue,
            position,
            source,
        });
    }

    fn position_of(&self, id: EntityId) -> Vec2Fixed {
        self.query.position(id).unwrap_or(Vec2Fixed::ZERO)
    }
}

/// Drive one ability instance for the current tick.
pub fn run(instance: &mut AbilityInstance, ctx: &mut EffectContext<'_>) {
    if instance.is_disabled() || !ctx.caster_active() {
        return;
    }
    match instance.category() {
        AbilityCategory::Triggered => trigger(instance, ctx),
        AbilityCategory::Continuous => auras::maintain(instance, ctx),
        AbilityCategory::Threshold => auras::maintain_mode(instance, ctx),
    }
}

fn trigger(instance: &mut AbilityInstance, ctx: &mut EffectContext<'_>) {
    if !instance.scheduler.is_ready(ctx.now) {
        return;
    }

    let plan = select(instance, ctx);
    let outcome = {
        let pool = ctx
            .units
            .get_mut(ctx.caster)
            .and_then(|unit| unit.resource.as_mut());
        instance
            .scheduler
            .try_trigger(ctx.now, plan.is_some(), pool)
    };
    let Some(plan) = plan.filter(|_| outcome.fired()) else {
        tracing::trace!(
            caster = ctx.caster,
            ability = %instance.config.id,
            ?outcome,
            "ability held"
        );
        return;
    };

    let targets = resolve(instance, plan, ctx);
    tracing::debug!(
        caster = ctx.caster,
        ability = %instance.config.id,
        kind = instance.config.kind.name(),
        targets = targets.len(),
        "ability triggered"
    );
    ctx.events.triggered.push(TriggerEvent {
        source: instance.source(ctx.caster),
        ability: instance.config.id.clone(),
        targets,
    });
}

/// Choose targets for a triggered ability without mutating anything.
///
/// Returns `None` when there is nothing to act on, which keeps the
/// scheduler `Ready` and leaves the pool untouched.
#[must_use]
pub fn select(instance: &AbilityInstance, ctx: &EffectContext<'_>) -> Option<Plan> {
    let (position, allegiance) = ctx.caster_view()?;
    let caster = ctx.caster;

    match instance.config.kind {
        AbilityKind::BurstBurn { radius, .. } => {
            let targets = ctx.retain_live(ctx.query.radius(
                position,
                radius,
                &TargetFilter::enemies(caster, allegiance),
            ));
            (!targets.is_empty()).then_some(Plan::Burst(targets))
        }
        AbilityKind::Chain { range, .. } => ctx.preferred_enemy(range).map(Plan::Chain),
        AbilityKind::Wave {
            range,
            length,
            width,
            ..
        } => {
            let aim = ctx.preferred_enemy(range)?;
            let facing = ctx
                .units
                .get(caster)
                .map_or(Vec2Fixed::UNIT_X, |unit| unit.facing);
            let direction = position.direction_to(ctx.position_of(aim), facing);
            let targets =
                ctx.retain_live(damage::wave_targets(ctx, position, direction, length, width));
            (!targets.is_empty()).then_some(Plan::Wave { direction, targets })
        }
        AbilityKind::TimedBuff {
            radius,
            relation,
            include_self,
            ..
        } => {
            let filter = TargetFilter::new(caster, allegiance, relation);
            let mut targets = ctx.retain_live(ctx.query.radius(position, radius, &filter));
            if include_self {
                let index = targets.partition_point(|&id| id < caster);
                targets.insert(index, caster);
            }
            (!targets.is_empty()).then_some(Plan::Buff(targets))
        }
        AbilityKind::Sacrifice {
            range,
            max_absorbed,
            ..
        } => {
            let full = instance.absorbed().len() >= usize::try_from(max_absorbed).unwrap_or(usize::MAX);
            if full {
                return None;
            }
            ctx.query
                .nearest_unvisited(
                    position,
                    range,
                    &ctx.fallen(),
                    &TargetFilter::allies(caster, allegiance),
                )
                .map(Plan::Absorb)
        }
        AbilityKind::Revival { range, .. } => ctx
            .query
            .nearest(position, range, &TargetFilter::defeated_allies(caster, allegiance))
            .filter(|&ally| {
                ctx.units
                    .get(ally)
                    .is_some_and(|unit| unit.status.is_defeated())
            })
            .map(Plan::Revive),
        AbilityKind::Aura { .. }
        | AbilityKind::PackBonus { .. }
        | AbilityKind::FormationBonus { .. }
        | AbilityKind::Overdrive { .. } => None,
    }
}

/// Apply a triggered ability's effect. Returns the units it landed on.
pub fn resolve(
    instance: &mut AbilityInstance,
    plan: Plan,
    ctx: &mut EffectContext<'_>,
) -> Vec<EntityId> {
    match plan {
        Plan::Burst(targets) => damage::burst(instance, &targets, ctx),
        Plan::Chain(first) => damage::chain(instance, first, ctx),
        Plan::Wave { direction, targets } => damage::wave(instance, direction, &targets, ctx),
        Plan::Buff(targets) => support::timed_buff(instance, &targets, ctx),
        Plan::Absorb(ally) => support::absorb(instance, ally, ctx),
        Plan::Revive(ally) => support::revive(instance, ally, ctx),
    }
}
