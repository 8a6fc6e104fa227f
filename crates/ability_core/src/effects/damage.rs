//! Offensive resolvers: burst with burn, chain and wave.

use crate::abilities::AbilityInstance;
use crate::components::EntityId;
use crate::data::AbilityKind;
use crate::events::{DamageKind, EffectCue};
use crate::math::{Fixed, Vec2Fixed};
use crate::targeting::TargetFilter;

use super::EffectContext;

/// Instant damage to every target, then a burn on each survivor.
pub(super) fn burst(
    instance: &AbilityInstance,
    targets: &[EntityId],
    ctx: &mut EffectContext<'_>,
) -> Vec<EntityId> {
    let AbilityKind::BurstBurn {
        damage,
        burn_damage,
        burn_interval,
        burn_duration,
        ..
    } = instance.config.kind
    else {
        return Vec::new();
    };
    let source = instance.source(ctx.caster);
    let burns = burn_damage > Fixed::ZERO && burn_duration > Fixed::ZERO;

    let origin = ctx.position_of(ctx.caster);
    ctx.notify(EffectCue::Burst, origin, source);

    let mut hit = Vec::with_capacity(targets.len());
    for &target in targets {
        if !ctx.is_live(target) {
            continue;
        }
        ctx.deal_damage(source, target, damage, DamageKind::Direct);
        hit.push(target);

        if burns {
            if let Some(unit) = ctx.units.get_mut(target) {
                if unit.is_active() && unit.health() > Fixed::ZERO {
                    unit.apply_dot(source, burn_damage, burn_interval, ctx.now, burn_duration);
                }
            }
        }
    }
    hit
}

/// Damage that hops to the nearest unvisited enemy, decaying each hop.
///
/// `max_chain_targets` counts every unit hit, the first one included, and
/// no unit is hit twice within one invocation.
pub(super) fn chain(
    instance: &AbilityInstance,
    first: EntityId,
    ctx: &mut EffectContext<'_>,
) -> Vec<EntityId> {
    let AbilityKind::Chain {
        chain_range,
        damage,
        max_chain_targets,
        chain_damage_reduction,
        ..
    } = instance.config.kind
    else {
        return Vec::new();
    };
    let Some((_, allegiance)) = ctx.caster_view() else {
        return Vec::new();
    };
    let source = instance.source(ctx.caster);
    let filter = TargetFilter::enemies(ctx.caster, allegiance);
    let limit = usize::try_from(max_chain_targets).unwrap_or(usize::MAX);
    let query = ctx.query;

    // Units defeated earlier in the tick never take a link of the chain.
    let mut visited = ctx.fallen();
    let mut hits = Vec::new();
    let mut amount = damage;
    let mut from = ctx.caster;
    let mut next = Some(first);

    while let Some(target) = next {
        if hits.len() >= limit || !ctx.is_live(target) {
            break;
        }
        visited.insert(target);
        ctx.deal_damage(source, target, amount, DamageKind::Direct);
        ctx.notify(
            EffectCue::ChainArc { from, to: target },
            ctx.position_of(target),
            source,
        );
        hits.push(target);

        amount = amount.saturating_mul(chain_damage_reduction);
        from = target;
        next = query
            .position(target)
            .and_then(|position| query.nearest_unvisited(position, chain_range, &visited, &filter));
    }
    hits
}

/// Enemies inside a box of `length` by `width` extending from `origin`
/// along `direction`.
pub(super) fn wave_targets(
    ctx: &EffectContext<'_>,
    origin: Vec2Fixed,
    direction: Vec2Fixed,
    length: Fixed,
    width: Fixed,
) -> Vec<EntityId> {
    let Some((_, allegiance)) = ctx.caster_view() else {
        return Vec::new();
    };
    let half_length = length / Fixed::from_num(2);
    let center = origin + direction.scale(half_length);
    let half_extents = Vec2Fixed::new(half_length, width / Fixed::from_num(2));
    ctx.query.oriented_box(
        center,
        half_extents,
        direction,
        &TargetFilter::enemies(ctx.caster, allegiance),
    )
}

/// Damage every target of a wave.
pub(super) fn wave(
    instance: &AbilityInstance,
    direction: Vec2Fixed,
    targets: &[EntityId],
    ctx: &mut EffectContext<'_>,
) -> Vec<EntityId> {
    let AbilityKind::Wave { damage, .. } = instance.config.kind else {
        return Vec::new();
    };
    let source = instance.source(ctx.caster);
    if let Some(unit) = ctx.units.get_mut(ctx.caster) {
        unit.facing = direction;
    }
    let origin = ctx.position_of(ctx.caster);
    ctx.notify(EffectCue::Wave, origin, source);

    let mut hit = Vec::with_capacity(targets.len());
    for &target in targets {
        if ctx.is_live(target) {
            ctx.deal_damage(source, target, damage, DamageKind::Direct);
            hit.push(target);
        }
    }
    hit
}
