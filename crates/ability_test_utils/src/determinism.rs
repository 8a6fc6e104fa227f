//! Determinism harness for the ability engine.
//!
//! Replays, save/restore and lockstep hosts all assume that the same
//! setup ticked with the same `dt` lands on the same state, bit for bit.
//! The helpers here check that claim at increasing scope: a repeated run,
//! a tick-by-tick comparison that pinpoints the first divergent tick, runs
//! on several threads at once, and a save/load in the middle of a battle.
//!
//! Things that would break it, and what the engine does instead:
//!
//! - **Float math**: all quantities are [`ability_core::math::Fixed`].
//! - **Hash map order**: units are always visited in sorted id order.
//! - **Simultaneous timers**: entries due at the same instant fire in
//!   scheduling order.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use ability_core::math::Fixed;
use ability_core::simulation::Simulation;

/// Sorted, deduplicated copy of `hashes`.
fn distinct(hashes: &[u64]) -> Vec<u64> {
    let mut unique = hashes.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
}

fn all_equal(hashes: &[u64]) -> bool {
    hashes.windows(2).all(|pair| pair[0] == pair[1])
}

/// Final hashes of repeated sequential runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Every run ended on the same hash.
    pub is_deterministic: bool,
    /// Final hash per run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks per run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Distinct final hashes. One entry when the runs agree.
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        distinct(&self.hashes)
    }

    /// # Panics
    ///
    /// Panics with every hash listed if the runs disagree.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic,
            "{} runs of {} ticks ended on {} different states: {:?}",
            self.hashes.len(),
            self.ticks,
            self.unique_hashes().len(),
            self.hashes
        );
    }
}

/// Final hashes of simulations run side by side on threads.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final hash per thread.
    pub hashes: Vec<u64>,
    /// Ticks per simulation.
    pub ticks: u64,
    /// Threads used.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if every thread ended on the same hash.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        all_equal(&self.hashes)
    }

    /// # Panics
    ///
    /// Panics with every hash listed if the threads disagree.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "{} parallel simulations of {} ticks diverged into {} states: {:?}",
            self.num_sims,
            self.ticks,
            distinct(&self.hashes).len(),
            self.hashes
        );
    }
}

/// Build a state with `setup`, advance it `ticks` times with `step`, hash
/// it with `hash`; repeat `runs` times and compare.
///
/// Generic over the state so it also covers pieces smaller than a whole
/// [`Simulation`].
///
/// ```
/// use ability_core::math::Fixed;
/// use ability_test_utils::determinism::verify_determinism;
/// use ability_test_utils::fixtures::skirmish;
///
/// let result = verify_determinism(
///     3,
///     20,
///     || skirmish(1),
///     |sim| {
///         sim.tick(Fixed::ONE);
///     },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let hashes: Vec<u64> = (0..runs)
        .map(|_| {
            let mut state = setup();
            (0..ticks).for_each(|_| step(&mut state));
            hash(&state)
        })
        .collect();

    DeterminismResult {
        is_deterministic: all_equal(&hashes),
        hashes,
        ticks,
    }
}

/// Two runs of a [`Simulation`] at `dt` seconds per tick end on the same
/// [`Simulation::state_hash`].
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick(dt);
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run `num_sims` copies at once on scoped threads.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
    dt: Fixed,
) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let run_one = || {
        let mut sim = setup_fn();
        for _ in 0..num_ticks {
            sim.tick(dt);
        }
        sim.state_hash()
    };

    let hashes = thread::scope(|scope| {
        let handles: Vec<_> = (0..num_sims).map(|_| scope.spawn(run_one)).collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(hash) => hash,
                Err(_) => panic!("simulation thread panicked"),
            })
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Step two copies in lockstep and report the first tick whose hashes
/// differ (0 for the freshly built state), or `None` if they never do.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, dt: Fixed) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let (mut left, mut right) = (setup_fn(), setup_fn());
    if left.state_hash() != right.state_hash() {
        return Some(0);
    }

    (1..=num_ticks).find(|&tick| {
        left.tick(dt);
        right.tick(dt);
        let diverged = left.state_hash() != right.state_hash();
        if diverged {
            tracing::warn!(tick, "simulations diverged");
        }
        diverged
    })
}

/// A save/load in the middle of a battle changes nothing.
///
/// Runs `warmup` ticks, round-trips the state through bincode, then runs
/// the live and the restored copy for `after` more ticks each and
/// compares hashes at both points. Scheduled timers (burns, buff expiries,
/// revival lapses) must survive the trip.
pub fn verify_serialization_determinism<F>(setup_fn: F, warmup: u64, after: u64, dt: Fixed) -> bool
where
    F: Fn() -> Simulation,
{
    let mut live = setup_fn();
    for _ in 0..warmup {
        live.tick(dt);
    }

    let Ok(mut restored) = live.serialize().and_then(|bytes| Simulation::deserialize(&bytes)) else {
        return false;
    };
    if restored.state_hash() != live.state_hash() {
        return false;
    }

    for _ in 0..after {
        live.tick(dt);
        restored.tick(dt);
    }
    live.state_hash() == restored.state_hash()
}

/// Hash any hashable value with the standard hasher.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for pools, buffs and battlefields.
pub mod strategies {
    use ability_core::buffs::BuffSpec;
    use ability_core::components::Allegiance;
    use ability_core::math::{Fixed, Vec2Fixed};
    use proptest::prelude::*;

    /// Whole-number coordinate inside a 100 x 100 arena centred on the origin.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (-50i32..50i32).prop_map(Fixed::from_num)
    }

    /// Arena position.
    pub fn arb_vec2_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_fixed_position(), arb_fixed_position()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate a tick length between 1/16 s and 2 s, in sixteenths.
    pub fn arb_dt() -> impl Strategy<Value = Fixed> {
        (1i32..=32).prop_map(|sixteenths| Fixed::from_num(sixteenths) / Fixed::from_num(16))
    }

    /// Generate a non-negative amount (0-200).
    pub fn arb_amount() -> impl Strategy<Value = Fixed> {
        (0i32..200).prop_map(Fixed::from_num)
    }

    /// Generate an allegiance.
    pub fn arb_allegiance() -> impl Strategy<Value = Allegiance> {
        prop_oneof![Just(Allegiance::Friendly), Just(Allegiance::Enemy)]
    }

    /// Generate a buff spec with additive parts in -50..50 and multipliers
    /// in 0.25..4 (quarters).
    pub fn arb_buff_spec() -> impl Strategy<Value = BuffSpec> {
        (-50i32..50, -50i32..50, 1i32..16, 1i32..16).prop_map(|(damage, health, atk, spd)| {
            BuffSpec {
                damage_bonus: Fixed::from_num(damage),
                health_bonus: Fixed::from_num(health),
                damage_multiplier: Fixed::from_num(atk) / Fixed::from_num(4),
                speed_multiplier: Fixed::from_num(spd) / Fixed::from_num(4),
            }
        })
    }

    /// One step applied to a resource pool.
    #[derive(Debug, Clone, Copy)]
    pub enum PoolOp {
        /// Advance by `dt` seconds.
        Tick(Fixed),
        /// Try to spend an amount.
        Spend(Fixed),
        /// Restore an amount.
        Restore(Fixed),
    }

    /// Generate a pool operation.
    pub fn arb_pool_op() -> impl Strategy<Value = PoolOp> {
        prop_oneof![
            arb_dt().prop_map(PoolOp::Tick),
            arb_amount().prop_map(PoolOp::Spend),
            arb_amount().prop_map(PoolOp::Restore),
        ]
    }

    /// Generate a sequence of pool operations.
    pub fn arb_pool_ops(max_len: usize) -> impl Strategy<Value = Vec<PoolOp>> {
        proptest::collection::vec(arb_pool_op(), 0..max_len)
    }

    /// Generate `(allegiance, position)` pairs for a random battle.
    pub fn arb_placements(max_units: usize) -> impl Strategy<Value = Vec<(Allegiance, Vec2Fixed)>> {
        proptest::collection::vec((arb_allegiance(), arb_vec2_position()), 1..max_units)
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{bundled_catalog, fixed, fixed_f, skirmish};
    use ability_core::resource::ResourcePool;
    use ability_core::simulation::SpawnParams;
    use proptest::prelude::*;

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.unique_hashes(), vec![10]);
    }

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_simulation_determinism(Simulation::new, 50, fixed(1)));
    }

    #[test]
    fn test_skirmish_determinism() {
        let result = verify_determinism(
            3,
            60,
            || skirmish(1),
            |sim| {
                sim.tick(fixed_f(0.5));
            },
            |sim| sim.state_hash(),
        );
        result.assert_deterministic();
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        assert_eq!(find_first_divergence(|| skirmish(1), 40, fixed(1)), None);
    }

    #[test]
    fn test_serialization_mid_battle() {
        assert!(verify_serialization_determinism(
            || skirmish(1),
            9,
            30,
            fixed_f(0.5)
        ));
    }

    #[test]
    fn test_parallel_skirmishes() {
        run_parallel_simulations(|| skirmish(1), 4, 40, fixed(1)).assert_deterministic();
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u64, "a")), compute_hash(&(1u64, "a")));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_pool_stays_in_bounds(ops in arb_pool_ops(64)) {
            let mut pool = ResourcePool::new(fixed(100), fixed(5), fixed(2))
                .with_threshold(fixed(80));
            for op in ops {
                match op {
                    PoolOp::Tick(dt) => {
                        pool.tick(dt);
                    }
                    PoolOp::Spend(amount) => {
                        pool.spend(amount);
                    }
                    PoolOp::Restore(amount) => pool.restore(amount),
                }
                prop_assert!(pool.current() >= Fixed::ZERO);
                prop_assert!(pool.current() <= pool.max());
            }
        }

        #[test]
        fn prop_random_battles_are_deterministic(
            placements in arb_placements(12),
            dt in arb_dt(),
        ) {
            let catalog = bundled_catalog();
            let types: Vec<_> = catalog.iter().cloned().collect();
            let setup = || {
                let mut sim = Simulation::new();
                for (index, (allegiance, position)) in placements.iter().enumerate() {
                    let unit_type = &types[index % types.len()];
                    sim.spawn(unit_type, SpawnParams::new(*allegiance, *position)).unwrap();
                }
                sim
            };
            prop_assert_eq!(find_first_divergence(setup, 30, dt), None);
        }
    }
}
