//! Geometry primitives used by the k-DOP hierarchy and contact generation.
//!
//! Everything here is a pure function of its inputs: no allocation, no
//! state. The hierarchy calls these tests at its leaves but never looks
//! inside them.
//!
//! # Conventions
//!
//! A [`Tetrahedron`] with positive [`signed_volume`](Tetrahedron::signed_volume)
//! has outward-facing, counter-clockwise faces given by [`FACES`]. Face `i`
//! is the face opposite vertex `i`.

use nalgebra::{Matrix3, Point3, Vector3};
use prox_types::{Pose, Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance for parallel and degenerate cases.
const EPSILON: f64 = 1e-12;

/// Vertex indices of each tetrahedron face, face `i` opposite vertex `i`.
pub const FACES: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

/// Vertex indices of each tetrahedron edge.
pub const EDGES: [[usize; 2]; 6] = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];

/// A half-line `origin + t * direction`, `t >= 0`, with unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ray {
    /// Start of the ray.
    pub origin: Point3<f64>,
    /// Unit direction.
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Create a ray, normalizing `direction`.
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Result<Self> {
        if !origin.coords.iter().all(|x| x.is_finite()) {
            return Err(SimError::invalid_input("ray origin must be finite"));
        }
        let direction = direction
            .try_normalize(EPSILON)
            .filter(|d| d.iter().all(|x| x.is_finite()))
            .ok_or_else(|| SimError::invalid_input("ray direction must be non-zero"))?;
        Ok(Self { origin, direction })
    }

    /// Point at distance `t` along the ray.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }
}

/// Result of a closest-points query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoints {
    /// Distance between the two points.
    pub distance: f64,
    /// Closest point on the first shape.
    pub on_a: Point3<f64>,
    /// Closest point on the second shape.
    pub on_b: Point3<f64>,
}

impl ClosestPoints {
    fn new(on_a: Point3<f64>, on_b: Point3<f64>) -> Self {
        Self {
            distance: (on_b - on_a).norm(),
            on_a,
            on_b,
        }
    }
}

/// Closest point on triangle `(v0, v1, v2)` to `point`.
///
/// Voronoi-region walk over vertices, edges and the face interior.
#[must_use]
pub fn closest_point_on_triangle(
    point: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Point3<f64> {
    let ab = v1 - v0;
    let ac = v2 - v0;
    let ap = point - v0;

    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *v0;
    }

    let bp = point - v1;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *v1;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return v0 + ab * v;
    }

    let cp = point - v2;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *v2;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return v0 + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return v1 + (v2 - v1) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    v0 + ab * (vb * denom) + ac * (vc * denom)
}

/// Closest points between segments `[p1, q1]` and `[p2, q2]`.
#[must_use]
pub fn closest_points_on_segments(
    p1: &Point3<f64>,
    q1: &Point3<f64>,
    p2: &Point3<f64>,
    q2: &Point3<f64>,
) -> (Point3<f64>, Point3<f64>) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.norm_squared();
    let e = d2.norm_squared();
    let f = d2.dot(&r);

    if a <= EPSILON && e <= EPSILON {
        return (*p1, *p2);
    }

    let (s, t) = if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(&r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(&d2);
            let denom = a * e - b * b;
            // Parallel segments: any s works, pick the start.
            let s = if denom > EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = (b * s + f) / e;
            if t < 0.0 {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else if t > 1.0 {
                (((b - c) / a).clamp(0.0, 1.0), 1.0)
            } else {
                (s, t)
            }
        }
    };

    (p1 + d1 * s, p2 + d2 * t)
}

/// Möller–Trumbore ray/triangle intersection, two-sided.
///
/// Returns the distance along the ray. Hits on shared edges are accepted
/// by both triangles so a ray through an edge never slips between them.
#[must_use]
pub fn ray_triangle(
    ray: &Ray,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
) -> Option<f64> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(&h);
    if !(-EPSILON..=1.0 + EPSILON).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * ray.direction.dot(&q);
    if v < -EPSILON || u + v > 1.0 + EPSILON {
        return None;
    }

    let t = f * edge2.dot(&q);
    (t >= 0.0).then_some(t)
}

/// Interval of the projections of `points` onto `axis`.
fn project<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>, axis: &Vector3<f64>) -> (f64, f64) {
    points
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            let d = p.coords.dot(axis);
            (lo.min(d), hi.max(d))
        })
}

/// A tetrahedron given by its four corners.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tetrahedron {
    /// Corner points.
    pub vertices: [Point3<f64>; 4],
}

impl Tetrahedron {
    /// Create a tetrahedron from its corners.
    #[must_use]
    pub const fn new(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>, d: Point3<f64>) -> Self {
        Self {
            vertices: [a, b, c, d],
        }
    }

    /// Six times the signed volume; positive for the [`FACES`] orientation.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let [a, b, c, d] = &self.vertices;
        (b - a).dot(&(c - a).cross(&(d - a))) / 6.0
    }

    /// Unsigned volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Average of the corners.
    #[must_use]
    pub fn centroid(&self) -> Point3<f64> {
        let sum = self
            .vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.coords);
        Point3::from(sum / 4.0)
    }

    /// Corners of face `i`.
    #[must_use]
    pub fn face(&self, i: usize) -> [Point3<f64>; 3] {
        FACES[i].map(|k| self.vertices[k])
    }

    /// Outward unit normal of face `i`, whatever the orientation.
    ///
    /// `None` for a degenerate face.
    #[must_use]
    pub fn face_normal(&self, i: usize) -> Option<Vector3<f64>> {
        let [a, b, c] = self.face(i);
        let n = (b - a).cross(&(c - a)).try_normalize(EPSILON)?;
        if n.dot(&(self.vertices[i] - a)) > 0.0 {
            Some(-n)
        } else {
            Some(n)
        }
    }

    /// Signed distance from `point` to the plane of face `i`, positive outside.
    #[must_use]
    pub fn face_distance(&self, i: usize, point: &Point3<f64>) -> Option<f64> {
        let n = self.face_normal(i)?;
        Some(n.dot(&(point - self.vertices[FACES[i][0]])))
    }

    /// Barycentric coordinates of `point`, `None` for a degenerate tetrahedron.
    #[must_use]
    pub fn barycentric(&self, point: &Point3<f64>) -> Option<[f64; 4]> {
        let [a, b, c, d] = &self.vertices;
        let basis = Matrix3::from_columns(&[b - a, c - a, d - a]);
        let inverse = basis.try_inverse()?;
        let l = inverse * (point - a);
        Some([1.0 - l.x - l.y - l.z, l.x, l.y, l.z])
    }

    /// Check if `point` lies inside or on the boundary, up to `tolerance`
    /// in barycentric coordinates.
    #[must_use]
    pub fn contains_point(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        self.barycentric(point)
            .is_some_and(|l| l.iter().all(|&x| x >= -tolerance))
    }

    /// Closest points between two disjoint tetrahedra.
    ///
    /// Tests every vertex against every face of the other tetrahedron and
    /// every edge pair; the first strictly closer candidate wins, so ties
    /// resolve to vertex/face before edge/edge.
    #[must_use]
    pub fn closest_points(&self, other: &Self) -> ClosestPoints {
        let mut best = ClosestPoints {
            distance: f64::INFINITY,
            on_a: self.vertices[0],
            on_b: other.vertices[0],
        };
        let mut consider = |candidate: ClosestPoints| {
            if candidate.distance < best.distance {
                best = candidate;
            }
        };

        for p in &other.vertices {
            for i in 0..4 {
                let [a, b, c] = self.face(i);
                consider(ClosestPoints::new(
                    closest_point_on_triangle(p, &a, &b, &c),
                    *p,
                ));
            }
        }
        for p in &self.vertices {
            for i in 0..4 {
                let [a, b, c] = other.face(i);
                consider(ClosestPoints::new(
                    *p,
                    closest_point_on_triangle(p, &a, &b, &c),
                ));
            }
        }
        for [a0, a1] in EDGES {
            for [b0, b1] in EDGES {
                let (on_a, on_b) = closest_points_on_segments(
                    &self.vertices[a0],
                    &self.vertices[a1],
                    &other.vertices[b0],
                    &other.vertices[b1],
                );
                consider(ClosestPoints::new(on_a, on_b));
            }
        }
        best
    }

    /// Separating-axis overlap test; touching counts as overlapping.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let face_axes = |t: &Self| {
            FACES.map(|[a, b, c]| {
                (t.vertices[b] - t.vertices[a]).cross(&(t.vertices[c] - t.vertices[a]))
            })
        };
        let separated_on = |axis: &Vector3<f64>| {
            if axis.norm_squared() <= EPSILON * EPSILON {
                return false;
            }
            let (lo_a, hi_a) = project(&self.vertices, axis);
            let (lo_b, hi_b) = project(&other.vertices, axis);
            hi_a < lo_b || hi_b < lo_a
        };

        if face_axes(self).iter().any(&separated_on)
            || face_axes(other).iter().any(&separated_on)
        {
            return false;
        }
        for [a0, a1] in EDGES {
            let ea = self.vertices[a1] - self.vertices[a0];
            for [b0, b1] in EDGES {
                let eb = other.vertices[b1] - other.vertices[b0];
                if separated_on(&ea.cross(&eb)) {
                    return false;
                }
            }
        }
        true
    }

    /// Nearest hit of `ray` on the faces whose `surface` flag is set.
    #[must_use]
    pub fn raycast(&self, ray: &Ray, surface: [bool; 4]) -> Option<f64> {
        (0..4)
            .filter(|&i| surface[i])
            .filter_map(|i| {
                let [a, b, c] = self.face(i);
                ray_triangle(ray, &a, &b, &c)
            })
            .min_by(f64::total_cmp)
    }
}

/// An oriented bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Obb {
    /// Box center.
    pub center: Point3<f64>,
    /// Box axes as orthonormal columns.
    pub axes: Matrix3<f64>,
    /// Half extents along each axis.
    pub half_extents: Vector3<f64>,
}

impl Obb {
    /// Create an axis-aligned box.
    #[must_use]
    pub fn new(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            center,
            axes: Matrix3::identity(),
            half_extents,
        }
    }

    /// Box with body-frame bounds `[min, max]` placed at `pose`.
    #[must_use]
    pub fn from_local_bounds(pose: &Pose, min: &Point3<f64>, max: &Point3<f64>) -> Self {
        let local_center = nalgebra::center(min, max);
        Self {
            center: pose.transform_point(&local_center),
            axes: *pose.rotation.to_rotation_matrix().matrix(),
            half_extents: (max - min) * 0.5,
        }
    }

    /// Radius of the projection onto `axis`.
    fn projected_radius(&self, axis: &Vector3<f64>) -> f64 {
        (0..3)
            .map(|i| self.half_extents[i] * self.axes.column(i).dot(axis).abs())
            .sum()
    }

    /// The eight corners.
    #[must_use]
    pub fn corners(&self) -> [Point3<f64>; 8] {
        std::array::from_fn(|k| {
            let sign = |bit: usize| if k & (1 << bit) == 0 { -1.0 } else { 1.0 };
            self.center
                + self.axes.column(0) * (sign(0) * self.half_extents.x)
                + self.axes.column(1) * (sign(1) * self.half_extents.y)
                + self.axes.column(2) * (sign(2) * self.half_extents.z)
        })
    }

    /// Separating-axis test over the 15 box axes; touching counts as overlapping.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let offset = other.center - self.center;
        let separated_on = |axis: Vector3<f64>| {
            if axis.norm_squared() <= EPSILON * EPSILON {
                return false;
            }
            offset.dot(&axis).abs() > self.projected_radius(&axis) + other.projected_radius(&axis)
        };

        for i in 0..3 {
            if separated_on(self.axes.column(i).into_owned())
                || separated_on(other.axes.column(i).into_owned())
            {
                return false;
            }
        }
        for i in 0..3 {
            for j in 0..3 {
                if separated_on(self.axes.column(i).cross(&other.axes.column(j))) {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn unit_tet(offset: Vector3<f64>) -> Tetrahedron {
        Tetrahedron::new(
            Point3::origin() + offset,
            Point3::new(1.0, 0.0, 0.0) + offset,
            Point3::new(0.0, 1.0, 0.0) + offset,
            Point3::new(0.0, 0.0, 1.0) + offset,
        )
    }

    #[test]
    fn test_face_orientation() {
        let tet = unit_tet(Vector3::zeros());
        assert_relative_eq!(tet.signed_volume(), 1.0 / 6.0);
        let centroid = tet.centroid();
        for i in 0..4 {
            let [a, b, c] = tet.face(i);
            let n = (b - a).cross(&(c - a));
            assert!(n.dot(&(a - centroid)) > 0.0, "face {i} points inward");
            assert!(tet.face_distance(i, &centroid).unwrap() < 0.0);
        }
    }

    #[test]
    fn test_face_normal_ignores_orientation() {
        let tet = unit_tet(Vector3::zeros());
        let [a, b, c, d] = tet.vertices;
        let flipped = Tetrahedron::new(a, b, d, c);
        assert!(flipped.signed_volume() < 0.0);
        assert_relative_eq!(
            flipped.face_normal(3).unwrap(),
            -Vector3::y(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_barycentric_and_containment() {
        let tet = unit_tet(Vector3::zeros());
        let l = tet.barycentric(&Point3::new(0.25, 0.25, 0.25)).unwrap();
        for x in l {
            assert_relative_eq!(x, 0.25, epsilon = 1e-12);
        }
        assert!(tet.contains_point(&Point3::new(0.1, 0.1, 0.1), 0.0));
        assert!(tet.contains_point(&Point3::new(1.0, 0.0, 0.0), 1e-12));
        assert!(!tet.contains_point(&Point3::new(0.5, 0.5, 0.5), 1e-9));
    }

    #[test]
    fn test_closest_point_on_triangle_regions() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        assert_eq!(closest_point_on_triangle(&Point3::new(-1.0, -1.0, 0.0), &a, &b, &c), a);
        assert_relative_eq!(
            closest_point_on_triangle(&Point3::new(0.5, -1.0, 2.0), &a, &b, &c),
            Point3::new(0.5, 0.0, 0.0)
        );
        assert_relative_eq!(
            closest_point_on_triangle(&Point3::new(0.2, 0.3, 5.0), &a, &b, &c),
            Point3::new(0.2, 0.3, 0.0)
        );
    }

    #[test]
    fn test_segments_crossing() {
        let (p, q) = closest_points_on_segments(
            &Point3::new(-1.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, -1.0, 1.0),
            &Point3::new(0.0, 1.0, 1.0),
        );
        assert_relative_eq!(p, Point3::origin());
        assert_relative_eq!(q, Point3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_segments_parallel() {
        let (p, q) = closest_points_on_segments(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.5, 2.0, 0.0),
            &Point3::new(3.0, 2.0, 0.0),
        );
        assert_relative_eq!((q - p).norm(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tetrahedron_overlap() {
        let a = unit_tet(Vector3::zeros());
        assert!(a.overlaps(&unit_tet(Vector3::new(0.2, 0.2, 0.2))));
        assert!(!a.overlaps(&unit_tet(Vector3::new(2.0, 0.0, 0.0))));
        // Touching at a single vertex.
        assert!(a.overlaps(&unit_tet(Vector3::new(1.0, 0.0, 0.0))));
        // Bounding boxes overlap, but the slanted face separates them.
        assert!(!a.overlaps(&unit_tet(Vector3::new(0.5, 0.5, 0.5))));
    }

    #[test]
    fn test_ray_triangle() {
        let ray = Ray::new(Point3::new(0.2, 0.2, -1.0), Vector3::z()).unwrap();
        let a = Point3::origin();
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        assert_relative_eq!(ray_triangle(&ray, &a, &b, &c).unwrap(), 1.0);
        // Backfaces are hit as well.
        assert_relative_eq!(ray_triangle(&ray, &a, &c, &b).unwrap(), 1.0);
        let behind = Ray::new(Point3::new(0.2, 0.2, 1.0), Vector3::z()).unwrap();
        assert!(ray_triangle(&behind, &a, &b, &c).is_none());
    }

    #[test]
    fn test_ray_requires_direction() {
        assert!(Ray::new(Point3::origin(), Vector3::zeros()).is_err());
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 3.0, 4.0)).unwrap();
        assert_relative_eq!(ray.point_at(5.0), Point3::new(0.0, 3.0, 4.0));
    }

    #[test]
    fn test_tetrahedron_raycast_respects_surface_flags() {
        let tet = unit_tet(Vector3::zeros());
        let ray = Ray::new(Point3::new(0.2, 0.2, -1.0), Vector3::z()).unwrap();
        assert_relative_eq!(tet.raycast(&ray, [true; 4]).unwrap(), 1.0);
        // Without the bottom face the ray exits through the slanted face.
        let t = tet.raycast(&ray, [true, true, true, false]).unwrap();
        assert_relative_eq!(t, 1.6, epsilon = 1e-12);
        assert!(tet.raycast(&ray, [false; 4]).is_none());
    }

    #[test]
    fn test_obb_overlap() {
        let a = Obb::new(Point3::origin(), Vector3::repeat(1.0));
        let b = Obb::new(Point3::new(1.9, 0.0, 0.0), Vector3::repeat(1.0));
        let c = Obb::new(Point3::new(2.1, 0.0, 0.0), Vector3::repeat(1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));

        // A box rotated 45° about z reaches √2 along x.
        let pose = Pose::new(
            Point3::new(2.3, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_4),
        );
        let d = Obb::from_local_bounds(
            &pose,
            &Point3::new(-1.0, -1.0, -1.0),
            &Point3::new(1.0, 1.0, 1.0),
        );
        assert!(a.overlaps(&d));
        assert!(d.overlaps(&a));
    }

    #[test]
    fn test_obb_corners() {
        let obb = Obb::new(Point3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 2.0, 3.0));
        let corners = obb.corners();
        assert_eq!(corners[0], Point3::new(0.0, -2.0, -3.0));
        assert_eq!(corners[7], Point3::new(2.0, 2.0, 3.0));
    }
}
