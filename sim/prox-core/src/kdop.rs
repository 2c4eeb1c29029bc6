//! Discrete oriented polytopes (k-DOPs).
//!
//! A k-DOP bounds a point set by `K = 2N` planes: for each of `N` fixed
//! directions it stores the `[lower, upper]` interval of the projections.
//! Two k-DOPs over the same direction table overlap iff every interval pair
//! overlaps, which makes the test a handful of comparisons.
//!
//! The supported direction tables are the classic ones:
//!
//! | alias | `N` | directions |
//! |-------|-----|------------|
//! | [`Kdop6`] | 3 | coordinate axes |
//! | [`Kdop14`] | 7 | axes + 4 corner diagonals |
//! | [`Kdop18`] | 9 | axes + 6 edge diagonals |
//! | [`Kdop26`] | 13 | axes + edge + corner diagonals |
//!
//! Directions are not normalized; intervals are only ever compared with
//! intervals of the same table.

use nalgebra::{Point3, Vector3};

use crate::broad_phase::Aabb;
use crate::geometry::Ray;

const AXES: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

const CORNERS: [[f64; 3]; 4] = [
    [1.0, 1.0, 1.0],
    [1.0, 1.0, -1.0],
    [1.0, -1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

const EDGES: [[f64; 3]; 6] = [
    [1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, 1.0, -1.0],
];

/// Directions of the `n`-direction table.
///
/// The first three directions are always the coordinate axes.
const fn direction(n: usize, i: usize) -> [f64; 3] {
    if i < 3 {
        return AXES[i];
    }
    match n {
        7 => CORNERS[i - 3],
        9 => EDGES[i - 3],
        _ => {
            if i < 9 {
                EDGES[i - 3]
            } else {
                CORNERS[i - 9]
            }
        }
    }
}

/// A k-DOP with `N` direction intervals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KDop<const N: usize> {
    lower: [f64; N],
    upper: [f64; N],
}

/// 6-DOP (axis-aligned box).
pub type Kdop6 = KDop<3>;
/// 14-DOP.
pub type Kdop14 = KDop<7>;
/// 18-DOP.
pub type Kdop18 = KDop<9>;
/// 26-DOP.
pub type Kdop26 = KDop<13>;

impl<const N: usize> Default for KDop<N> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const N: usize> KDop<N> {
    const SUPPORTED: () = assert!(
        N == 3 || N == 7 || N == 9 || N == 13,
        "k-DOPs are defined for 3, 7, 9 or 13 directions"
    );

    /// Direction `i` of this table.
    #[must_use]
    pub fn direction(i: usize) -> Vector3<f64> {
        let () = Self::SUPPORTED;
        let [x, y, z] = direction(N, i);
        Vector3::new(x, y, z)
    }

    /// The empty volume: every interval is `[+∞, -∞]`.
    ///
    /// It is the identity of [`union`](Self::union) and overlaps nothing.
    #[must_use]
    pub fn empty() -> Self {
        let () = Self::SUPPORTED;
        Self {
            lower: [f64::INFINITY; N],
            upper: [f64::NEG_INFINITY; N],
        }
    }

    /// Tightest volume around `points`.
    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Self {
        let mut kdop = Self::empty();
        for p in points {
            kdop.include_point(p);
        }
        kdop
    }

    /// Grow the volume to contain `point`.
    pub fn include_point(&mut self, point: &Point3<f64>) {
        for i in 0..N {
            let d = Self::direction(i).dot(&point.coords);
            self.lower[i] = self.lower[i].min(d);
            self.upper[i] = self.upper[i].max(d);
        }
    }

    /// Grow the volume to contain `other`.
    pub fn merge(&mut self, other: &Self) {
        for i in 0..N {
            self.lower[i] = self.lower[i].min(other.lower[i]);
            self.upper[i] = self.upper[i].max(other.upper[i]);
        }
    }

    /// Smallest volume containing both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut out = *self;
        out.merge(other);
        out
    }

    /// Lower bound of interval `i`.
    #[must_use]
    pub fn lower(&self, i: usize) -> f64 {
        self.lower[i]
    }

    /// Upper bound of interval `i`.
    #[must_use]
    pub fn upper(&self, i: usize) -> f64 {
        self.upper[i]
    }

    /// True iff every interval is non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lower.iter().zip(&self.upper).all(|(lo, hi)| lo <= hi)
    }

    /// Interval overlap in every direction; touching counts.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        (0..N).all(|i| self.lower[i] <= other.upper[i] && other.lower[i] <= self.upper[i])
    }

    /// True iff every interval of `other` lies inside the matching interval.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        (0..N).all(|i| self.lower[i] <= other.lower[i] && other.upper[i] <= self.upper[i])
    }

    /// Grow every interval by `margin` on both sides.
    #[must_use]
    pub fn inflated(&self, margin: f64) -> Self {
        Self {
            lower: self.lower.map(|x| x - margin),
            upper: self.upper.map(|x| x + margin),
        }
    }

    /// Axis-aligned box given by the first three intervals.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(
            Point3::new(self.lower[0], self.lower[1], self.lower[2]),
            Point3::new(self.upper[0], self.upper[1], self.upper[2]),
        )
    }

    /// Slab test: can `ray` enter the volume within `max_length`?
    ///
    /// Every slab is widened by `threshold` so that hits grazing a face are
    /// not pruned by floating-point slack.
    #[must_use]
    pub fn intersects_ray(&self, ray: &Ray, max_length: f64, threshold: f64) -> bool {
        if !self.is_valid() {
            return false;
        }
        let mut t_min = 0.0_f64;
        let mut t_max = max_length;
        for i in 0..N {
            let d = Self::direction(i);
            let start = d.dot(&ray.origin.coords);
            let speed = d.dot(&ray.direction);
            let lo = self.lower[i] - threshold;
            let hi = self.upper[i] + threshold;
            if speed.abs() < 1e-15 {
                if !(lo..=hi).contains(&start) {
                    return false;
                }
                continue;
            }
            let (t0, t1) = {
                let a = (lo - start) / speed;
                let b = (hi - start) / speed;
                if a <= b { (a, b) } else { (b, a) }
            };
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cube<const N: usize>(size: f64, offset: Vector3<f64>) -> KDop<N> {
        let corners: Vec<Point3<f64>> = (0..8)
            .map(|k| {
                Point3::new(
                    f64::from(k & 1),
                    f64::from((k >> 1) & 1),
                    f64::from((k >> 2) & 1),
                ) * size
                    + offset
            })
            .collect();
        KDop::from_points(&corners)
    }

    fn unit_cube<const N: usize>(offset: Vector3<f64>) -> KDop<N> {
        cube(1.0, offset)
    }

    #[test]
    fn test_direction_tables_start_with_axes() {
        assert_eq!(Kdop14::direction(0), Vector3::x());
        assert_eq!(Kdop18::direction(2), Vector3::z());
        assert_eq!(Kdop14::direction(3), Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(Kdop18::direction(3), Vector3::new(1.0, 1.0, 0.0));
        assert_eq!(Kdop26::direction(12), Vector3::new(-1.0, 1.0, 1.0));
    }

    #[test]
    fn test_empty_is_union_identity() {
        let cube = unit_cube::<9>(Vector3::zeros());
        assert!(!Kdop18::empty().is_valid());
        assert_eq!(Kdop18::empty().union(&cube), cube);
        assert!(!Kdop18::empty().overlaps(&cube));
    }

    #[test]
    fn test_diagonal_directions_prune_corners() {
        // Two cubes meeting only corner to corner along (1,1,1) with a gap.
        let a = unit_cube::<7>(Vector3::zeros());
        let b = unit_cube::<7>(Vector3::new(1.0, 1.0, 1.0) * 1.01);
        assert!(!a.overlaps(&b));

        // A shard beyond the corner of the box: the boxes overlap, the 14-DOPs do not.
        let shard = Kdop14::from_points(&[
            Point3::new(1.6, 1.6, 1.4),
            Point3::new(1.6, 1.4, 1.6),
            Point3::new(1.4, 1.6, 1.6),
        ]);
        let boxed: Kdop14 = cube(1.5, Vector3::zeros());
        assert!(!boxed.overlaps(&shard));
        assert!(boxed.aabb().overlaps(&shard.aabb()));
    }

    #[test]
    fn test_contains_and_inflate() {
        let cube = unit_cube::<13>(Vector3::zeros());
        let inner = Kdop26::from_points(&[Point3::new(0.5, 0.5, 0.5)]);
        assert!(cube.contains(&inner));
        assert!(!inner.contains(&cube));
        assert!(cube.inflated(0.1).contains(&cube));
        assert_eq!(cube.inflated(0.1).lower(0), -0.1);
    }

    #[test]
    fn test_ray_slabs() {
        let cube = unit_cube::<9>(Vector3::zeros());
        let hit = Ray::new(Point3::new(0.5, 0.5, -2.0), Vector3::z()).unwrap();
        assert!(cube.intersects_ray(&hit, f64::INFINITY, 0.0));
        // Too short to reach the cube.
        assert!(!cube.intersects_ray(&hit, 1.5, 0.0));

        let miss = Ray::new(Point3::new(2.0, 0.5, -2.0), Vector3::z()).unwrap();
        assert!(!cube.intersects_ray(&miss, f64::INFINITY, 0.0));

        // Grazing the x = 1 face.
        let graze = Ray::new(Point3::new(1.0 + 1e-9, 0.5, -2.0), Vector3::z()).unwrap();
        assert!(!cube.intersects_ray(&graze, f64::INFINITY, 0.0));
        assert!(cube.intersects_ray(&graze, f64::INFINITY, 1e-6));

        let away = Ray::new(Point3::new(0.5, 0.5, -2.0), -Vector3::z()).unwrap();
        assert!(!cube.intersects_ray(&away, f64::INFINITY, 0.0));
    }

    fn arb_kdop() -> impl Strategy<Value = Kdop18> {
        prop::collection::vec(prop::array::uniform3(-5.0..5.0f64), 1..6).prop_map(|pts| {
            let points: Vec<Point3<f64>> =
                pts.iter().map(|[x, y, z]| Point3::new(*x, *y, *z)).collect();
            Kdop18::from_points(&points)
        })
    }

    proptest! {
        #[test]
        fn overlap_is_symmetric(a in arb_kdop(), b in arb_kdop()) {
            prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn union_contains_both(a in arb_kdop(), b in arb_kdop()) {
            let u = a.union(&b);
            prop_assert!(u.contains(&a));
            prop_assert!(u.contains(&b));
            prop_assert!(u.overlaps(&a));
        }
    }
}
