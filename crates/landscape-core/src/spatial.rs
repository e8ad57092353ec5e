use rstar::{RTree, RTreeObject, AABB};

/// Capability contract for records the mating rule can place in space.
///
/// Anything that exposes a per-generation index and a position on the unit
/// square can be handed to [`crate::MatingRule::w`]; the genetic payload
/// stays opaque.
pub trait Located {
    /// Index of the individual within its generation, `0..N`.
    fn id(&self) -> usize;
    /// Coordinates in `[0,1] x [0,1]`.
    fn position(&self) -> [f64; 2];
}

/// Position-only record stored in the spatial index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionRecord {
    pub id: usize,
    pub position: [f64; 2],
}

impl PositionRecord {
    pub fn new(id: usize, position: [f64; 2]) -> Self {
        Self { id, position }
    }

    pub fn distance_squared(&self, point: [f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

impl Located for PositionRecord {
    fn id(&self) -> usize {
        self.id
    }

    fn position(&self) -> [f64; 2] {
        self.position
    }
}

impl RTreeObject for PositionRecord {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Rebuildable R*-tree over position records.
#[derive(Clone, Debug, Default)]
pub struct SpatialIndex {
    tree: RTree<PositionRecord>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load an index from a snapshot of records.
    pub fn from_records(records: Vec<PositionRecord>) -> Self {
        Self {
            tree: RTree::bulk_load(records),
        }
    }

    /// Replace all contents with `records` using packed construction.
    pub fn rebuild(&mut self, records: Vec<PositionRecord>) {
        self.tree = RTree::bulk_load(records);
    }

    /// Add a single record. Query results stay sorted by id, so insertion
    /// order never leaks into callers.
    pub fn insert(&mut self, record: PositionRecord) {
        self.tree.insert(record);
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionRecord> {
        self.tree.iter()
    }

    /// All records whose Euclidean distance to `center` is `<= radius`,
    /// sorted by id.
    ///
    /// The axis-aligned box of side `2 * radius` only narrows candidates;
    /// the distance predicate decides membership. A negative or non-finite
    /// radius, or a non-finite center, yields an empty result.
    pub fn query_radius(&self, center: [f64; 2], radius: f64) -> Vec<PositionRecord> {
        let mut result = Vec::new();
        self.for_each_within(center, radius, |record| result.push(*record));
        result.sort_unstable_by_key(|record| record.id);
        result
    }

    /// Count records within `radius` of `center` without allocating.
    pub fn count_within(&self, center: [f64; 2], radius: f64) -> usize {
        let mut count = 0usize;
        self.for_each_within(center, radius, |_| count += 1);
        count
    }

    /// Whether a record with exactly this id and position is stored.
    pub fn contains(&self, record: &PositionRecord) -> bool {
        let envelope = AABB::from_point(record.position);
        self.tree
            .locate_in_envelope(&envelope)
            .any(|candidate| candidate.id == record.id)
    }

    fn for_each_within(
        &self,
        center: [f64; 2],
        radius: f64,
        mut visitor: impl FnMut(&PositionRecord),
    ) {
        if !(radius.is_finite() && radius >= 0.0) || !center.iter().all(|c| c.is_finite()) {
            return;
        }
        let envelope = AABB::from_corners(
            [center[0] - radius, center[1] - radius],
            [center[0] + radius, center[1] + radius],
        );
        let r_sq = radius * radius;
        for record in self.tree.locate_in_envelope(&envelope) {
            if record.distance_squared(center) <= r_sq {
                visitor(record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, x: f64, y: f64) -> PositionRecord {
        PositionRecord::new(id, [x, y])
    }

    fn grid(n: usize) -> Vec<PositionRecord> {
        (0..n * n)
            .map(|i| {
                let x = (i % n) as f64 / (n - 1) as f64;
                let y = (i / n) as f64 / (n - 1) as f64;
                record(i, x, y)
            })
            .collect()
    }

    #[test]
    fn query_finds_records_within_radius() {
        let index = SpatialIndex::from_records(vec![
            record(0, 0.5, 0.5),
            record(1, 0.6, 0.5),
            record(2, 0.9, 0.9),
        ]);
        let ids: Vec<usize> = index
            .query_radius([0.5, 0.5], 0.2)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn box_corner_outside_euclidean_radius_is_excluded() {
        // (0.09, 0.09) lies inside the 0.2-wide box but ~0.127 from center.
        let index = SpatialIndex::from_records(vec![record(0, 0.0, 0.0), record(1, 0.09, 0.09)]);
        let ids: Vec<usize> = index
            .query_radius([0.0, 0.0], 0.1)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn boundary_distance_is_inclusive() {
        let index = SpatialIndex::from_records(vec![record(0, 0.0, 0.0), record(1, 0.5, 0.0)]);
        assert_eq!(index.count_within([0.0, 0.0], 0.5), 2);
    }

    #[test]
    fn zero_radius_returns_only_coincident_points() {
        let index = SpatialIndex::from_records(vec![
            record(0, 0.3, 0.3),
            record(1, 0.3, 0.3),
            record(2, 0.3, 0.300001),
        ]);
        let ids: Vec<usize> = index
            .query_radius([0.3, 0.3], 0.0)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn query_always_includes_center_record() {
        let records = grid(12);
        let index = SpatialIndex::from_records(records.clone());
        for r in &records {
            for radius in [0.0, 1e-9, 0.05, 0.3] {
                assert!(
                    index.query_radius(r.position, radius).contains(r),
                    "record {} missing at radius {radius}",
                    r.id
                );
            }
        }
    }

    #[test]
    fn bulk_and_incremental_indexes_agree() {
        let records = grid(9);
        let bulk = SpatialIndex::from_records(records.clone());
        let mut incremental = SpatialIndex::new();
        for r in records.iter().rev() {
            incremental.insert(*r);
        }
        assert_eq!(bulk.len(), incremental.len());
        for center in [[0.0, 0.0], [0.5, 0.5], [0.93, 0.12]] {
            for radius in [0.0, 0.1, 0.25, 2.0] {
                assert_eq!(
                    bulk.query_radius(center, radius),
                    incremental.query_radius(center, radius)
                );
            }
        }
    }

    #[test]
    fn query_matches_brute_force() {
        let records = grid(10);
        let index = SpatialIndex::from_records(records.clone());
        let center = [0.41, 0.57];
        let radius = 0.23;
        let expected: Vec<usize> = records
            .iter()
            .filter(|r| r.distance_squared(center) <= radius * radius)
            .map(|r| r.id)
            .collect();
        let found: Vec<usize> = index
            .query_radius(center, radius)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn rebuild_replaces_contents() {
        let mut index = SpatialIndex::from_records(grid(4));
        index.rebuild(vec![record(0, 0.1, 0.1)]);
        assert_eq!(index.len(), 1);
        assert!(index.contains(&record(0, 0.1, 0.1)));
        assert!(!index.contains(&record(1, 0.1, 0.1)));
    }

    #[test]
    fn invalid_query_returns_nothing() {
        let index = SpatialIndex::from_records(grid(3));
        assert!(index.query_radius([0.5, 0.5], -1.0).is_empty());
        assert!(index.query_radius([f64::NAN, 0.5], 0.5).is_empty());
        assert_eq!(index.count_within([0.5, 0.5], f64::INFINITY), 0);
    }
}
