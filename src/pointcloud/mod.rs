pub mod coordinate;

use nalgebra::Vector3;
use rayon::prelude::*;
use std::collections::HashSet;

pub use coordinate::{centroid, midpoint, CoordKey, Coordinate};

/// Clouds above this size are filtered in parallel.
const PARALLEL_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudKind {
    Ct,
    ProposedElectrode,
    MissingElectrode,
    ConfirmedElectrode,
    Selected,
}

/// A labeled set of voxel coordinates.
///
/// Membership is decided on [`CoordKey`], so two coordinates closer than the
/// key resolution are the same point. The vector keeps first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub label: String,
    coordinates: Vec<Coordinate>,
    keys: HashSet<CoordKey>,
}

impl PointCloud {
    pub fn new(label: impl Into<String>, coordinates: impl IntoIterator<Item = Coordinate>) -> Self {
        let mut cloud = Self::empty(label);
        cloud.add_coordinates(coordinates);
        cloud
    }

    pub fn empty(label: impl Into<String>) -> Self {
        PointCloud {
            label: label.into(),
            coordinates: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coordinate> {
        self.coordinates.iter()
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.keys.contains(&CoordKey::from(coordinate))
    }

    pub fn clear(&mut self) {
        self.coordinates.clear();
        self.keys.clear();
    }

    /// Set union with `coordinates`, in place.
    pub fn add_coordinates(&mut self, coordinates: impl IntoIterator<Item = Coordinate>) {
        for c in coordinates {
            if self.keys.insert(CoordKey::from(&c)) {
                self.coordinates.push(c);
            }
        }
    }

    /// Set subtraction of `coordinates`, in place.
    pub fn remove_coordinates<'a>(&mut self, coordinates: impl IntoIterator<Item = &'a Coordinate>) {
        let removed: HashSet<CoordKey> = coordinates.into_iter().map(CoordKey::from).collect();
        if removed.is_empty() {
            return;
        }
        self.coordinates
            .retain(|c| !removed.contains(&CoordKey::from(c)));
        self.keys.retain(|k| !removed.contains(k));
    }

    pub fn intersect(&self, other: &PointCloud) -> PointCloud {
        PointCloud::new(
            self.label.clone(),
            self.coordinates
                .iter()
                .filter(|c| other.contains(c))
                .copied(),
        )
    }

    pub fn union(&self, other: &PointCloud) -> PointCloud {
        let mut out = self.clone();
        out.add_coordinates(other.coordinates.iter().copied());
        out
    }

    pub fn subtract(&self, other: &PointCloud) -> PointCloud {
        PointCloud::new(
            self.label.clone(),
            self.coordinates
                .iter()
                .filter(|c| !other.contains(c))
                .copied(),
        )
    }

    /// Moves `coordinates` out of this cloud and into `target`.
    pub fn move_points_to(&mut self, coordinates: &[Coordinate], target: &mut PointCloud) {
        self.remove_coordinates(coordinates);
        target.add_coordinates(coordinates.iter().copied());
    }

    /// All points strictly closer than `radius` to `center`.
    pub fn get_points_in_range(&self, center: &Coordinate, radius: f64) -> Vec<Coordinate> {
        let r2 = radius * radius;
        let in_range = |c: &&Coordinate| (*c - center).norm_squared() < r2;
        if self.coordinates.len() >= PARALLEL_THRESHOLD {
            self.coordinates
                .par_iter()
                .filter(in_range)
                .copied()
                .collect()
        } else {
            self.coordinates.iter().filter(in_range).copied().collect()
        }
    }

    /// Drops every point with no other point within city-block distance 1.
    ///
    /// Pairwise over the whole cloud, so quadratic in its size.
    pub fn remove_isolated_points(&mut self) -> usize {
        let coords = &self.coordinates;
        let keep: Vec<bool> = coords
            .par_iter()
            .enumerate()
            .map(|(i, a)| {
                coords
                    .iter()
                    .enumerate()
                    .any(|(j, b)| i != j && cityblock(a, b) <= 1.0)
            })
            .collect();

        let before = self.coordinates.len();
        let kept: Vec<Coordinate> = self
            .coordinates
            .iter()
            .zip(keep)
            .filter_map(|(c, k)| if k { Some(*c) } else { None })
            .collect();
        self.clear();
        self.add_coordinates(kept);
        let removed = before - self.coordinates.len();
        log::debug!("cloud {}: removed {} isolated points", self.label, removed);
        removed
    }

    /// Arithmetic mean of the cloud; NaN on every axis when empty.
    pub fn centroid(&self) -> Coordinate {
        centroid(&self.coordinates)
    }

    /// Splits the cloud into per-axis vectors.
    pub fn xyz(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let x = self.coordinates.iter().map(|c| c.x).collect();
        let y = self.coordinates.iter().map(|c| c.y).collect();
        let z = self.coordinates.iter().map(|c| c.z).collect();
        (x, y, z)
    }

    /// Rewrites every coordinate with `f`, rebuilding the membership keys.
    pub fn map_in_place(&mut self, f: impl Fn(&Coordinate) -> Coordinate) {
        let mapped: Vec<Coordinate> = self.coordinates.iter().map(f).collect();
        self.clear();
        self.add_coordinates(mapped);
    }
}

impl std::ops::Index<usize> for PointCloud {
    type Output = Coordinate;

    fn index(&self, index: usize) -> &Self::Output {
        &self.coordinates[index]
    }
}

fn cityblock(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).abs().sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(x: f64, y: f64, z: f64) -> Coordinate {
        Vector3::new(x, y, z)
    }

    fn sorted(cloud: &PointCloud) -> Vec<CoordKey> {
        let mut keys: Vec<CoordKey> = cloud.iter().map(CoordKey::from).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_new_removes_duplicates() {
        let cloud = PointCloud::new("a", vec![c(1.0, 2.0, 3.0), c(1.0, 2.0, 3.0), c(0.0, 0.0, 0.0)]);
        assert_eq!(cloud.len(), 2);
    }

    #[test]
    fn test_union_is_commutative_set_union() {
        let a = PointCloud::new("a", vec![c(0.0, 0.0, 0.0), c(1.0, 0.0, 0.0)]);
        let b = PointCloud::new("b", vec![c(1.0, 0.0, 0.0), c(2.0, 0.0, 0.0)]);

        let ab = a.union(&b);
        let ba = b.union(&a);

        assert_eq!(ab.len(), 3);
        assert_eq!(sorted(&ab), sorted(&ba));
        assert_eq!(ab.label, "a");
        assert_eq!(ba.label, "b");
    }

    #[test]
    fn test_intersect_and_subtract() {
        let a = PointCloud::new("a", vec![c(0.0, 0.0, 0.0), c(1.0, 0.0, 0.0), c(2.0, 0.0, 0.0)]);
        let b = PointCloud::new("", vec![c(1.0, 0.0, 0.0), c(5.0, 0.0, 0.0)]);

        let both = a.intersect(&b);
        assert_eq!(both.len(), 1);
        assert!(both.contains(&c(1.0, 0.0, 0.0)));
        assert_eq!(both.label, "a");

        let rest = a.subtract(&b);
        assert_eq!(rest.len(), 2);
        assert!(!rest.contains(&c(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_membership_tolerates_float_noise() {
        let cloud = PointCloud::new("a", vec![c(0.1 + 0.2, 1.0, 1.0)]);
        assert!(cloud.contains(&c(0.3, 1.0, 1.0)));
    }

    #[test]
    fn test_remove_coordinates() {
        let mut cloud = PointCloud::new("a", vec![c(0.0, 0.0, 0.0), c(1.0, 1.0, 1.0)]);
        cloud.remove_coordinates(&[c(1.0, 1.0, 1.0)]);
        assert_eq!(cloud.len(), 1);
        assert!(!cloud.contains(&c(1.0, 1.0, 1.0)));
        // re-adding after removal works
        cloud.add_coordinates(vec![c(1.0, 1.0, 1.0)]);
        assert_eq!(cloud.len(), 2);
    }

    #[test]
    fn test_range_query_excludes_boundary() {
        let cloud = PointCloud::new(
            "a",
            vec![c(0.0, 0.0, 0.0), c(2.0, 0.0, 0.0), c(1.9, 0.0, 0.0), c(0.0, 0.0, -3.0)],
        );
        let found = cloud.get_points_in_range(&c(0.0, 0.0, 0.0), 2.0);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.norm() < 2.0));
    }

    #[test]
    fn test_range_query_on_empty_cloud() {
        let cloud = PointCloud::empty("nothing");
        assert!(cloud.get_points_in_range(&c(0.0, 0.0, 0.0), 10.0).is_empty());
    }

    #[test]
    fn test_remove_isolated_points() {
        let mut cloud = PointCloud::new(
            "a",
            vec![c(0.0, 0.0, 0.0), c(0.0, 0.0, 1.0), c(10.0, 10.0, 10.0), c(20.0, 0.0, 0.0)],
        );
        let removed = cloud.remove_isolated_points();
        assert_eq!(removed, 2);
        assert_eq!(cloud.len(), 2);
        assert!(cloud.contains(&c(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_diagonal_neighbour_is_isolated() {
        // city-block distance of a diagonal step is 2
        let mut cloud = PointCloud::new("a", vec![c(0.0, 0.0, 0.0), c(1.0, 1.0, 0.0)]);
        cloud.remove_isolated_points();
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_centroid() {
        let cloud = PointCloud::new("a", vec![c(0.0, 0.0, 0.0), c(2.0, 4.0, 6.0)]);
        let center = cloud.centroid();
        assert_relative_eq!(center, c(1.0, 2.0, 3.0), epsilon = 1e-12);
        assert!(PointCloud::empty("e").centroid().x.is_nan());
    }

    #[test]
    fn test_move_points_to() {
        let mut a = PointCloud::new("a", vec![c(0.0, 0.0, 0.0), c(1.0, 0.0, 0.0)]);
        let mut b = PointCloud::empty("b");
        a.move_points_to(&[c(1.0, 0.0, 0.0)], &mut b);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
