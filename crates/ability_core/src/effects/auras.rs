//! Continuous and threshold-driven resolvers.
//!
//! These run every tick and keep the instance's standing grants in sync
//! with the current situation. Each one diffs desired state against what
//! is already granted, so re-running with nothing changed is a no-op.

use crate::abilities::{AbilityInstance, Activation};
use crate::buffs::BuffSpec;
use crate::components::EntityId;
use crate::data::{AbilityKind, OverdriveTrigger};
use crate::events::{EffectCue, ModeEvent};
use crate::math::Fixed;
use crate::targeting::TargetFilter;

use super::EffectContext;

/// Keep an aura, pack bonus or formation bonus in sync.
pub(super) fn maintain(instance: &mut AbilityInstance, ctx: &mut EffectContext<'_>) {
    let Some((position, allegiance)) = ctx.caster_view() else {
        return;
    };
    let allies = TargetFilter::allies(ctx.caster, allegiance);

    match instance.config.kind {
        AbilityKind::Aura {
            range,
            buff,
            heal_per_second,
        } => {
            let members = ctx.retain_live(ctx.query.radius(position, range, &allies));
            sync_members(instance, &members, buff, ctx);

            if heal_per_second > Fixed::ZERO {
                let amount = heal_per_second.saturating_mul(ctx.dt);
                for &member in &members {
                    if let Some(unit) = ctx.units.get_mut(member) {
                        unit.heal(amount);
                    }
                }
            }
        }
        AbilityKind::PackBonus {
            range,
            per_ally,
            max_allies,
        } => {
            let cap = usize::try_from(max_allies).unwrap_or(usize::MAX);
            let count = ctx
                .retain_live(ctx.query.radius(position, range, &allies))
                .len()
                .min(cap);
            let desired = (count > 0).then(|| per_ally.scaled_additive(Fixed::from_num(count)));
            set_self_grant(instance, desired, ctx);
        }
        AbilityKind::FormationBonus {
            range,
            min_allies,
            buff,
        } => {
            let needed = usize::try_from(min_allies).unwrap_or(usize::MAX);
            let in_formation =
                ctx.retain_live(ctx.query.radius(position, range, &allies)).len() >= needed;
            set_self_grant(instance, in_formation.then_some(buff), ctx);
        }
        _ => {}
    }
}

/// Grant `buff` to units entering `members` and revert it on units leaving.
fn sync_members(
    instance: &mut AbilityInstance,
    members: &[EntityId],
    buff: BuffSpec,
    ctx: &mut EffectContext<'_>,
) {
    let source = instance.source(ctx.caster);

    let leaving: Vec<EntityId> = instance
        .grants()
        .iter()
        .map(|grant| grant.target)
        .filter(|target| !members.contains(target))
        .collect();
    for target in leaving {
        if let Some(id) = instance.take_grant(target) {
            if let Some(unit) = ctx.units.get_mut(target) {
                unit.remove_buff(id);
            }
            tracing::trace!(caster = ctx.caster, unit = target, "left aura");
        }
    }

    for &member in members {
        if instance.grant_for(member).is_some() {
            continue;
        }
        if let Some(unit) = ctx.units.get_mut(member) {
            let id = unit.apply_buff(source, buff, None);
            instance.add_grant(member, id);
            tracing::trace!(caster = ctx.caster, unit = member, "entered aura");
        }
    }
}

/// Make the caster's standing self buff match `desired`.
///
/// An unchanged buff is left alone; a changed one is reverted and
/// re-applied, never stacked.
fn set_self_grant(
    instance: &mut AbilityInstance,
    desired: Option<BuffSpec>,
    ctx: &mut EffectContext<'_>,
) {
    let caster = ctx.caster;
    let source = instance.source(caster);
    let Some(unit) = ctx.units.get_mut(caster) else {
        return;
    };

    let current = instance
        .grant_for(caster)
        .and_then(|id| unit.buffs().get(id))
        .map(|buff| buff.spec());
    if current.is_some() && current == desired {
        return;
    }

    if let Some(id) = instance.take_grant(caster) {
        unit.remove_buff(id);
    }
    if let Some(spec) = desired {
        let id = unit.apply_buff(source, spec, None);
        instance.add_grant(caster, id);
    }
}

/// Switch an overdrive-class mode on or off.
///
/// Pool-driven modes follow the pool's own hysteresis. Health-driven modes
/// enter at or below `enter` and leave once health rises above `exit`.
pub(super) fn maintain_mode(instance: &mut AbilityInstance, ctx: &mut EffectContext<'_>) {
    let AbilityKind::Overdrive { trigger, buff } = instance.config.kind else {
        return;
    };
    let caster = ctx.caster;
    let Some(unit) = ctx.units.get(caster) else {
        return;
    };

    let active = instance.activation() == Activation::Active;
    let desired = match trigger {
        OverdriveTrigger::Resource => unit
            .resource
            .as_ref()
            .is_some_and(|pool| pool.is_overdrive_active()),
        OverdriveTrigger::HealthBelow { enter, exit } => {
            let fraction = unit.health_fraction();
            if active {
                fraction <= exit
            } else {
                fraction <= enter
            }
        }
    };
    if desired == active {
        return;
    }

    set_self_grant(instance, desired.then_some(buff), ctx);

    let source = instance.source(caster);
    tracing::debug!(unit = caster, ability = %instance.config.id, active = desired, "combat mode switched");
    ctx.events.modes.push(ModeEvent {
        source,
        active: desired,
    });
    let cue = if desired {
        EffectCue::ModeOn
    } else {
        EffectCue::ModeOff
    };
    let position = ctx.position_of(caster);
    ctx.notify(cue, position, source);
}
