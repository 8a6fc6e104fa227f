//! Supportive resolvers (timed buffs, sacrifice, revival) and the
//! deactivation path shared by defeat, absorption and despawn.

use crate::abilities::{AbilityInstance, Activation};
use crate::buffs::BuffSpec;
use crate::components::EntityId;
use crate::data::AbilityKind;
use crate::events::{EffectCue, RevivalEvent, TickEvents};
use crate::math::Fixed;
use crate::simulation::UnitStorage;

use super::EffectContext;

/// Timed buff on every target. Re-applying from the same ability replaces
/// the previous application instead of stacking on it.
pub(super) fn timed_buff(
    instance: &AbilityInstance,
    targets: &[EntityId],
    ctx: &mut EffectContext<'_>,
) -> Vec<EntityId> {
    let AbilityKind::TimedBuff { buff, duration, .. } = instance.config.kind else {
        return Vec::new();
    };
    let source = instance.source(ctx.caster);
    let expires_at = ctx.now.saturating_add(duration);

    let mut hit = Vec::with_capacity(targets.len());
    for &target in targets {
        let Some(unit) = ctx.units.get_mut(target) else {
            continue;
        };
        if !unit.is_active() {
            continue;
        }
        unit.remove_buffs_from_source(source);
        unit.apply_buff(source, buff, Some(expires_at));
        hit.push(target);
    }

    let origin = ctx.position_of(ctx.caster);
    ctx.notify(EffectCue::Buff, origin, source);
    hit
}

/// Take an ally out of play and grant the caster its bonuses.
pub(super) fn absorb(
    instance: &mut AbilityInstance,
    ally: EntityId,
    ctx: &mut EffectContext<'_>,
) -> Vec<EntityId> {
    let AbilityKind::Sacrifice {
        health_bonus,
        damage_bonus,
        ..
    } = instance.config.kind
    else {
        return Vec::new();
    };
    if !ctx.is_live(ally) {
        return Vec::new();
    }
    let caster = ctx.caster;
    let source = instance.source(caster);

    if let Some(unit) = ctx.units.get_mut(ally) {
        unit.disable(caster);
    }
    deactivate_unit(ctx.units, ally, ctx.events);

    let Some(unit) = ctx.units.get_mut(caster) else {
        return Vec::new();
    };
    let buff = unit.apply_buff(source, BuffSpec::bonuses(health_bonus, damage_bonus), None);
    instance.absorb(ally);
    instance.add_grant(caster, buff);
    tracing::debug!(caster, ally, "ally absorbed");

    let position = ctx.position_of(ally);
    ctx.notify(EffectCue::Absorb, position, source);
    vec![ally]
}

/// Bring a defeated ally back on a timer.
///
/// A `revival_duration` of zero makes the revival permanent.
pub(super) fn revive(
    instance: &AbilityInstance,
    ally: EntityId,
    ctx: &mut EffectContext<'_>,
) -> Vec<EntityId> {
    let AbilityKind::Revival {
        revival_fraction,
        revival_duration,
        ..
    } = instance.config.kind
    else {
        return Vec::new();
    };
    let source = instance.source(ctx.caster);
    let lapse_at = (revival_duration > Fixed::ZERO).then(|| ctx.now.saturating_add(revival_duration));

    let Some(unit) = ctx.units.get_mut(ally) else {
        return Vec::new();
    };
    let health = unit.max_health().saturating_mul(revival_fraction);
    if !unit.revive(health, lapse_at) {
        return Vec::new();
    }
    let health = unit.health();
    tracing::debug!(caster = ctx.caster, ally, %health, "ally revived");

    ctx.events.revived.push(RevivalEvent {
        unit: ally,
        source,
        health,
    });
    let position = ctx.position_of(ally);
    ctx.notify(EffectCue::Revive, position, source);
    vec![ally]
}

/// Strip everything `id`'s abilities maintain on other units.
///
/// Standing grants are reverted, absorbed allies return to play, and every
/// buff or burn `id` left on any unit is cancelled without waiting for its
/// timer.
pub fn deactivate_unit(units: &mut UnitStorage, id: EntityId, events: &mut TickEvents) {
    let mut abilities = units
        .get_mut(id)
        .map(|unit| std::mem::take(&mut unit.abilities))
        .unwrap_or_default();

    for instance in &mut abilities {
        if instance.activation() == Activation::Idle {
            continue;
        }
        tracing::debug!(unit = id, ability = %instance.config.id, "ability deactivated");
        for grant in instance.take_grants() {
            if let Some(target) = units.get_mut(grant.target) {
                target.remove_buff(grant.buff);
            }
        }
        for ally in instance.take_absorbed() {
            if units.get_mut(ally).is_some_and(|unit| unit.enable()) {
                tracing::debug!(unit = ally, absorbed_by = id, "absorbed unit released");
                events.released.push(ally);
            }
        }
    }

    if let Some(unit) = units.get_mut(id) {
        unit.abilities = abilities;
    }

    for other in units.sorted_ids() {
        if let Some(unit) = units.get_mut(other) {
            unit.remove_buffs_from_caster(id);
            unit.cancel_dots_from(id);
        }
    }
}

/// Drop every ability-held reference to `id` on other units.
pub fn release_references(units: &mut UnitStorage, id: EntityId) {
    for other in units.sorted_ids() {
        if let Some(unit) = units.get_mut(other) {
            for instance in &mut unit.abilities {
                instance.forget_unit(id);
            }
        }
    }
}
