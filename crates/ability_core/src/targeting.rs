//! Target selection over a start-of-tick snapshot.
//!
//! Broad-phase lookups belong to the host: a [`SpatialQueryProvider`]
//! returns candidate ids for a shape, possibly over-inclusive (grid cells,
//! bounding boxes). [`TargetQuery`] then refines those candidates against a
//! [`WorldSnapshot`] captured once at the start of the tick, so every
//! unit's abilities observe the same positions and states no matter which
//! units already acted this tick.
//!
//! Results are deterministic: lists come back in id order, and ties on
//! distance go to the lower (earlier registered) id.

use std::collections::BTreeSet;

use crate::components::{Allegiance, EntityId, Relation, UnitStatus};
use crate::math::{Fixed, Vec2Fixed};
use crate::unit::Unit;

/// Broad-phase spatial lookups implemented by the host.
pub trait SpatialQueryProvider {
    /// Candidate ids whose position may lie within `radius` of `center`.
    fn query_radius(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId>;

    /// Candidate ids whose position may lie inside the oriented box.
    ///
    /// `half_extents.x` runs along `orientation`, `half_extents.y` across it.
    fn query_box(
        &self,
        center: Vec2Fixed,
        half_extents: Vec2Fixed,
        orientation: Vec2Fixed,
    ) -> Vec<EntityId>;
}

/// One unit as seen at the start of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Unit id.
    pub id: EntityId,
    /// Position.
    pub position: Vec2Fixed,
    /// Side.
    pub allegiance: Allegiance,
    /// Lifecycle state.
    pub status: UnitStatus,
}

/// Immutable view of every unit, sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldSnapshot {
    entries: Vec<SnapshotEntry>,
}

impl WorldSnapshot {
    /// Capture a snapshot from units in any order.
    pub fn capture<'a>(units: impl IntoIterator<Item = &'a Unit>) -> Self {
        let mut entries: Vec<SnapshotEntry> = units
            .into_iter()
            .map(|unit| SnapshotEntry {
                id: unit.id,
                position: unit.position,
                allegiance: unit.allegiance,
                status: unit.status,
            })
            .collect();
        entries.sort_unstable_by_key(|entry| entry.id);
        Self { entries }
    }

    /// Look up a unit.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&SnapshotEntry> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Iterate entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.iter()
    }

    /// Number of units captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reference provider that scans every unit.
///
/// Adequate for headless runs and tests; hosts with many units plug in
/// their own spatial index instead.
#[derive(Debug, Clone, Default)]
pub struct LinearScanProvider {
    points: Vec<(EntityId, Vec2Fixed)>,
}

impl LinearScanProvider {
    /// Build from explicit points.
    #[must_use]
    pub fn new(points: Vec<(EntityId, Vec2Fixed)>) -> Self {
        Self { points }
    }

    /// Build from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &WorldSnapshot) -> Self {
        Self::new(
            snapshot
                .iter()
                .map(|entry| (entry.id, entry.position))
                .collect(),
        )
    }
}

impl SpatialQueryProvider for LinearScanProvider {
    fn query_radius(&self, center: Vec2Fixed, radius: Fixed) -> Vec<EntityId> {
        let radius_sq = radius.saturating_mul(radius);
        self.points
            .iter()
            .filter(|(_, position)| position.distance_squared(center) <= radius_sq)
            .map(|(id, _)| *id)
            .collect()
    }

    fn query_box(
        &self,
        center: Vec2Fixed,
        half_extents: Vec2Fixed,
        orientation: Vec2Fixed,
    ) -> Vec<EntityId> {
        self.points
            .iter()
            .filter(|(_, position)| in_oriented_box(*position, center, half_extents, orientation))
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Check if `point` lies inside an oriented box.
#[must_use]
pub fn in_oriented_box(
    point: Vec2Fixed,
    center: Vec2Fixed,
    half_extents: Vec2Fixed,
    orientation: Vec2Fixed,
) -> bool {
    let axis = orientation.normalize();
    let axis = if axis == Vec2Fixed::ZERO {
        Vec2Fixed::UNIT_X
    } else {
        axis
    };
    let offset = point - center;
    let along = offset.dot(axis);
    let across = offset.dot(axis.perp());
    along.abs() <= half_extents.x && across.abs() <= half_extents.y
}

/// Which lifecycle state a query is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Active units only.
    Active,
    /// Defeated units only (revival).
    Defeated,
}

/// Allegiance and state filter for a query, relative to a caster.
///
/// The caster itself is always excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFilter {
    /// Unit issuing the query.
    pub caster: EntityId,
    /// Caster's side.
    pub allegiance: Allegiance,
    /// Required relation to the caster.
    pub relation: Relation,
    /// Required lifecycle state.
    pub state: TargetState,
}

impl TargetFilter {
    /// Active units matching `relation`.
    #[must_use]
    pub const fn new(caster: EntityId, allegiance: Allegiance, relation: Relation) -> Self {
        Self {
            caster,
            allegiance,
            relation,
            state: TargetState::Active,
        }
    }

    /// Active enemies of the caster.
    #[must_use]
    pub const fn enemies(caster: EntityId, allegiance: Allegiance) -> Self {
        Self::new(caster, allegiance, Relation::Enemy)
    }

    /// Active allies of the caster.
    #[must_use]
    pub const fn allies(caster: EntityId, allegiance: Allegiance) -> Self {
        Self::new(caster, allegiance, Relation::Ally)
    }

    /// Defeated allies of the caster.
    #[must_use]
    pub const fn defeated_allies(caster: EntityId, allegiance: Allegiance) -> Self {
        Self {
            caster,
            allegiance,
            relation: Relation::Ally,
            state: TargetState::Defeated,
        }
    }

    /// Check a snapshot entry against the filter.
    #[must_use]
    pub fn accepts(&self, entry: &SnapshotEntry) -> bool {
        if entry.id == self.caster || !self.relation.matches(self.allegiance, entry.allegiance) {
            return false;
        }
        match self.state {
            TargetState::Active => entry.status.is_active(),
            TargetState::Defeated => entry.status.is_defeated(),
        }
    }
}

/// Read-only queries for one tick.
#[derive(Clone, Copy)]
pub struct TargetQuery<'a> {
    snapshot: &'a WorldSnapshot,
    spatial: &'a dyn SpatialQueryProvider,
}

impl<'a> TargetQuery<'a> {
    /// Create a query over a snapshot and a broad-phase provider.
    #[must_use]
    pub fn new(snapshot: &'a WorldSnapshot, spatial: &'a dyn SpatialQueryProvider) -> Self {
        Self { snapshot, spatial }
    }

    /// The snapshot the query reads.
    #[must_use]
    pub const fn snapshot(&self) -> &'a WorldSnapshot {
        self.snapshot
    }

    /// Position of a unit at the start of the tick.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.snapshot.get(id).map(|entry| entry.position)
    }

    fn candidates(&self, mut ids: Vec<EntityId>, filter: &TargetFilter) -> Vec<&'a SnapshotEntry> {
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.snapshot.get(id))
            .filter(|entry| filter.accepts(entry))
            .collect()
    }

    /// Every matching unit within Euclidean distance `radius`, in id order.
    #[must_use]
    pub fn radius(&self, center: Vec2Fixed, radius: Fixed, filter: &TargetFilter) -> Vec<EntityId> {
        let radius_sq = radius.saturating_mul(radius);
        self.candidates(self.spatial.query_radius(center, radius), filter)
            .into_iter()
            .filter(|entry| entry.position.distance_squared(center) <= radius_sq)
            .map(|entry| entry.id)
            .collect()
    }

    /// Every matching unit inside an oriented box, in id order.
    #[must_use]
    pub fn oriented_box(
        &self,
        center: Vec2Fixed,
        half_extents: Vec2Fixed,
        orientation: Vec2Fixed,
        filter: &TargetFilter,
    ) -> Vec<EntityId> {
        self.candidates(
            self.spatial.query_box(center, half_extents, orientation),
            filter,
        )
        .into_iter()
        .filter(|entry| in_oriented_box(entry.position, center, half_extents, orientation))
        .map(|entry| entry.id)
        .collect()
    }

    /// Nearest matching unit within `radius`.
    #[must_use]
    pub fn nearest(&self, origin: Vec2Fixed, radius: Fixed, filter: &TargetFilter) -> Option<EntityId> {
        self.nearest_unvisited(origin, radius, &BTreeSet::new(), filter)
    }

    /// Nearest matching unit within `radius` that is not in `exclude`.
    ///
    /// Ties on distance go to the lowest id.
    #[must_use]
    pub fn nearest_unvisited(
        &self,
        origin: Vec2Fixed,
        radius: Fixed,
        exclude: &BTreeSet<EntityId>,
        filter: &TargetFilter,
    ) -> Option<EntityId> {
        let radius_sq = radius.saturating_mul(radius);
        self.candidates(self.spatial.query_radius(origin, radius), filter)
            .into_iter()
            .filter(|entry| !exclude.contains(&entry.id))
            .map(|entry| (entry.position.distance_squared(origin), entry.id))
            .filter(|(distance_sq, _)| *distance_sq <= radius_sq)
            .min()
            .map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitStats;

    fn fx(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn unit(id: EntityId, allegiance: Allegiance, x: i32, y: i32) -> Unit {
        Unit::new(
            id,
            "test",
            allegiance,
            Vec2Fixed::from_int(x, y),
            UnitStats::new(fx(10), fx(1), fx(100)),
        )
    }

    fn world() -> Vec<Unit> {
        vec![
            unit(1, Allegiance::Friendly, 0, 0),
            unit(2, Allegiance::Enemy, 3, 0),
            unit(3, Allegiance::Enemy, 0, 3),
            unit(4, Allegiance::Enemy, 10, 0),
            unit(5, Allegiance::Friendly, 1, 1),
        ]
    }

    #[test]
    fn test_radius_filters_allegiance_and_excludes_caster() {
        let units = world();
        let snapshot = WorldSnapshot::capture(&units);
        let spatial = LinearScanProvider::from_snapshot(&snapshot);
        let query = TargetQuery::new(&snapshot, &spatial);

        let enemies = query.radius(Vec2Fixed::ZERO, fx(5), &TargetFilter::enemies(1, Allegiance::Friendly));
        assert_eq!(enemies, vec![2, 3]);

        let allies = query.radius(Vec2Fixed::ZERO, fx(5), &TargetFilter::allies(1, Allegiance::Friendly));
        assert_eq!(allies, vec![5]);
    }

    #[test]
    fn test_nearest_tie_breaks_on_lowest_id() {
        let units = world();
        let snapshot = WorldSnapshot::capture(&units);
        let spatial = LinearScanProvider::from_snapshot(&snapshot);
        let query = TargetQuery::new(&snapshot, &spatial);
        let filter = TargetFilter::enemies(1, Allegiance::Friendly);

        // 2 and 3 are both at distance 3.
        assert_eq!(query.nearest(Vec2Fixed::ZERO, fx(5), &filter), Some(2));

        let visited: BTreeSet<EntityId> = [2].into_iter().collect();
        assert_eq!(query.nearest_unvisited(Vec2Fixed::ZERO, fx(5), &visited, &filter), Some(3));

        let visited: BTreeSet<EntityId> = [2, 3].into_iter().collect();
        assert_eq!(query.nearest_unvisited(Vec2Fixed::ZERO, fx(5), &visited, &filter), None);
    }

    #[test]
    fn test_oriented_box_along_facing() {
        let units = world();
        let snapshot = WorldSnapshot::capture(&units);
        let spatial = LinearScanProvider::from_snapshot(&snapshot);
        let query = TargetQuery::new(&snapshot, &spatial);
        let filter = TargetFilter::enemies(1, Allegiance::Friendly);

        // Box from x=0 to x=12 along +X, one unit wide either side.
        let hits = query.oriented_box(
            Vec2Fixed::from_int(6, 0),
            Vec2Fixed::from_int(6, 1),
            Vec2Fixed::UNIT_X,
            &filter,
        );
        assert_eq!(hits, vec![2, 4]);

        // Same box rotated to point along +Y.
        let hits = query.oriented_box(
            Vec2Fixed::from_int(0, 6),
            Vec2Fixed::from_int(6, 1),
            Vec2Fixed::from_int(0, 1),
            &filter,
        );
        assert_eq!(hits, vec![3]);
    }

    #[test]
    fn test_defeated_filter() {
        let mut units = world();
        units[4].mark_defeated();
        let snapshot = WorldSnapshot::capture(&units);
        let spatial = LinearScanProvider::from_snapshot(&snapshot);
        let query = TargetQuery::new(&snapshot, &spatial);

        let live = query.radius(Vec2Fixed::ZERO, fx(5), &TargetFilter::allies(1, Allegiance::Friendly));
        assert!(live.is_empty());
        let fallen = query.radius(
            Vec2Fixed::ZERO,
            fx(5),
            &TargetFilter::defeated_allies(1, Allegiance::Friendly),
        );
        assert_eq!(fallen, vec![5]);
    }

    #[test]
    fn test_coarse_provider_results_are_refined() {
        struct Everything(Vec<EntityId>);
        impl SpatialQueryProvider for Everything {
            fn query_radius(&self, _: Vec2Fixed, _: Fixed) -> Vec<EntityId> {
                let mut ids = self.0.clone();
                ids.extend(self.0.iter().copied());
                ids
            }
            fn query_box(&self, _: Vec2Fixed, _: Vec2Fixed, _: Vec2Fixed) -> Vec<EntityId> {
                self.0.clone()
            }
        }

        let units = world();
        let snapshot = WorldSnapshot::capture(&units);
        let spatial = Everything(vec![4, 3, 2, 1, 99]);
        let query = TargetQuery::new(&snapshot, &spatial);

        let enemies = query.radius(Vec2Fixed::ZERO, fx(5), &TargetFilter::enemies(1, Allegiance::Friendly));
        assert_eq!(enemies, vec![2, 3]);
    }
}
