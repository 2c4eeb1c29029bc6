//! Tetrahedral meshes.
//!
//! A [`TetMesh`] is the volumetric collision geometry of one body. It is
//! defined in body coordinates and keeps a world-space copy of its vertices
//! that is refreshed from the body pose before each refit.
//!
//! # Surface faces
//!
//! A face shared by two tetrahedra lies inside the volume; only faces used
//! by exactly one tetrahedron are *surface* faces. Contacts and ray hits are
//! generated on surface faces only.
//!
//! # Example
//!
//! ```
//! use prox_core::TetMesh;
//! use nalgebra::Vector3;
//!
//! let mesh = TetMesh::cuboid(Vector3::new(1.0, 1.0, 1.0)).unwrap();
//! assert_eq!(mesh.len(), 6);
//! assert_eq!(mesh.surface_face_count(), 12);
//! assert!((mesh.volume() - 8.0).abs() < 1e-12);
//! ```

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use prox_types::{Pose, Result, SimError};
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::{FACES, Tetrahedron};

/// Tetrahedra with less volume than this are dropped at build time.
const DEGENERATE_VOLUME: f64 = 1e-14;

/// A tetrahedral mesh in body coordinates.
///
/// Serializes as its vertices and tetrahedra only; deserializing goes through
/// [`TetMesh::new`], so surface flags, bounds and world vertices are rebuilt
/// and the indices are checked.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "RawTetMesh", into = "RawTetMesh")
)]
pub struct TetMesh {
    vertices: Vec<Point3<f64>>,
    tetrahedra: Vec<[usize; 4]>,
    surface: Vec<[bool; 4]>,
    local_min: Point3<f64>,
    local_max: Point3<f64>,
    /// Vertices at the last [`update_world`](Self::update_world) pose.
    world: Vec<Point3<f64>>,
}

/// Serialized form of a [`TetMesh`].
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RawTetMesh {
    vertices: Vec<Point3<f64>>,
    tetrahedra: Vec<[usize; 4]>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawTetMesh> for TetMesh {
    type Error = SimError;

    fn try_from(raw: RawTetMesh) -> Result<Self> {
        Self::new(raw.vertices, raw.tetrahedra)
    }
}

#[cfg(feature = "serde")]
impl From<TetMesh> for RawTetMesh {
    fn from(mesh: TetMesh) -> Self {
        Self {
            vertices: mesh.vertices,
            tetrahedra: mesh.tetrahedra,
        }
    }
}

impl PartialEq for TetMesh {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.tetrahedra == other.tetrahedra
    }
}

impl TetMesh {
    /// Build a mesh from vertices and tetrahedra.
    ///
    /// Tetrahedra are reoriented to positive volume; degenerate ones are
    /// dropped with a warning.
    pub fn new(vertices: Vec<Point3<f64>>, tetrahedra: Vec<[usize; 4]>) -> Result<Self> {
        if tetrahedra.is_empty() {
            return Err(SimError::invalid_input("mesh has no tetrahedra"));
        }
        if !vertices
            .iter()
            .all(|v| v.coords.iter().all(|x| x.is_finite()))
        {
            return Err(SimError::invalid_input("mesh vertices must be finite"));
        }
        if let Some(&bad) = tetrahedra.iter().flatten().find(|&&i| i >= vertices.len()) {
            return Err(SimError::invalid_input(format!(
                "vertex index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }

        let mut kept = Vec::with_capacity(tetrahedra.len());
        for (index, mut tet) in tetrahedra.into_iter().enumerate() {
            let volume = Tetrahedron::new(
                vertices[tet[0]],
                vertices[tet[1]],
                vertices[tet[2]],
                vertices[tet[3]],
            )
            .signed_volume();
            if volume.abs() <= DEGENERATE_VOLUME {
                warn!(element = index, volume, "skipping degenerate tetrahedron");
                continue;
            }
            if volume < 0.0 {
                tet.swap(2, 3);
            }
            kept.push(tet);
        }
        if kept.is_empty() {
            return Err(SimError::degenerate("every tetrahedron is degenerate"));
        }

        let surface = surface_flags(&kept);
        let (local_min, local_max) = bounds(&vertices);
        Ok(Self {
            world: vertices.clone(),
            vertices,
            tetrahedra: kept,
            surface,
            local_min,
            local_max,
        })
    }

    /// A box with the given half extents, split into six tetrahedra.
    ///
    /// Every tetrahedron spans the main diagonal from corner `(-,-,-)` to
    /// `(+,+,+)` and owns one triangle on each of two adjacent box faces, so
    /// every point just under the surface lies in an element that owns the
    /// face above it.
    pub fn cuboid(half_extents: Vector3<f64>) -> Result<Self> {
        if !half_extents.iter().all(|&h| h.is_finite() && h > 0.0) {
            return Err(SimError::invalid_input(format!(
                "cuboid half extents must be positive, got {half_extents:?}"
            )));
        }
        // Corner k has the sign of bit 0/1/2 on x/y/z.
        let vertices = (0..8)
            .map(|k| {
                let sign = |bit: usize| if k & (1 << bit) == 0 { -1.0 } else { 1.0 };
                Point3::new(
                    sign(0) * half_extents.x,
                    sign(1) * half_extents.y,
                    sign(2) * half_extents.z,
                )
            })
            .collect();
        let tetrahedra = vec![
            [0, 1, 3, 7],
            [0, 1, 5, 7],
            [0, 2, 3, 7],
            [0, 2, 6, 7],
            [0, 4, 5, 7],
            [0, 4, 6, 7],
        ];
        Self::new(vertices, tetrahedra)
    }

    /// Number of tetrahedra.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tetrahedra.len()
    }

    /// True when the mesh has no tetrahedra.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tetrahedra.is_empty()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Body-frame vertices.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// World-frame vertices at the last pose update.
    #[must_use]
    pub fn world_vertices(&self) -> &[Point3<f64>] {
        &self.world
    }

    /// Vertex indices of every tetrahedron, positively oriented.
    #[must_use]
    pub fn tetrahedra(&self) -> &[[usize; 4]] {
        &self.tetrahedra
    }

    /// Surface flags of tetrahedron `t`, indexed like [`FACES`].
    #[must_use]
    pub fn surface(&self, t: usize) -> [bool; 4] {
        self.surface[t]
    }

    /// Number of surface faces.
    #[must_use]
    pub fn surface_face_count(&self) -> usize {
        self.surface.iter().flatten().filter(|&&s| s).count()
    }

    /// Body-frame bounds `(min, max)`.
    #[must_use]
    pub fn local_bounds(&self) -> (Point3<f64>, Point3<f64>) {
        (self.local_min, self.local_max)
    }

    /// Tetrahedron `t` in body coordinates.
    #[must_use]
    pub fn local_tetrahedron(&self, t: usize) -> Tetrahedron {
        let [a, b, c, d] = self.tetrahedra[t].map(|i| self.vertices[i]);
        Tetrahedron::new(a, b, c, d)
    }

    /// Tetrahedron `t` in world coordinates.
    #[must_use]
    pub fn tetrahedron(&self, t: usize) -> Tetrahedron {
        let [a, b, c, d] = self.tetrahedra[t].map(|i| self.world[i]);
        Tetrahedron::new(a, b, c, d)
    }

    /// Total volume.
    #[must_use]
    pub fn volume(&self) -> f64 {
        (0..self.len())
            .map(|t| self.local_tetrahedron(t).volume())
            .sum()
    }

    /// Move the world-space vertices to `pose`.
    pub fn update_world(&mut self, pose: &Pose) {
        // A deserialized mesh starts without world vertices.
        self.world.resize(self.vertices.len(), Point3::origin());
        for (world, local) in self.world.iter_mut().zip(&self.vertices) {
            *world = pose.transform_point(local);
        }
    }
}

/// A face is on the surface iff exactly one tetrahedron uses it.
fn surface_flags(tetrahedra: &[[usize; 4]]) -> Vec<[bool; 4]> {
    let key = |tet: &[usize; 4], f: usize| {
        let mut face = FACES[f].map(|k| tet[k]);
        face.sort_unstable();
        face
    };

    let mut uses: HashMap<[usize; 3], u32> = HashMap::with_capacity(tetrahedra.len() * 4);
    for tet in tetrahedra {
        for f in 0..4 {
            *uses.entry(key(tet, f)).or_insert(0) += 1;
        }
    }
    tetrahedra
        .iter()
        .map(|tet| std::array::from_fn(|f| uses.get(&key(tet, f)) == Some(&1)))
        .collect()
}

fn bounds(points: &[Point3<f64>]) -> (Point3<f64>, Point3<f64>) {
    points.iter().fold(
        (
            Point3::from(Vector3::repeat(f64::INFINITY)),
            Point3::from(Vector3::repeat(f64::NEG_INFINITY)),
        ),
        |(lo, hi), p| (lo.inf(p), hi.sup(p)),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;

    fn unit_tet_vertices() -> Vec<Point3<f64>> {
        vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn test_orientation_is_fixed() {
        let mesh = TetMesh::new(unit_tet_vertices(), vec![[0, 1, 3, 2]]).unwrap();
        assert_eq!(mesh.tetrahedra()[0], [0, 1, 2, 3]);
        assert!(mesh.local_tetrahedron(0).signed_volume() > 0.0);
        assert_eq!(mesh.surface(0), [true; 4]);
    }

    #[test]
    fn test_shared_face_is_interior() {
        let mut vertices = unit_tet_vertices();
        vertices.push(Point3::new(1.0, 1.0, 1.0));
        let mesh = TetMesh::new(vertices, vec![[0, 1, 2, 3], [4, 1, 3, 2]]).unwrap();
        // Face [1, 2, 3] is opposite vertex 0 in the first tetrahedron.
        assert_eq!(mesh.surface(0), [false, true, true, true]);
        assert_eq!(mesh.surface(1).iter().filter(|&&s| !s).count(), 1);
        assert_eq!(mesh.surface_face_count(), 6);
    }

    #[test]
    fn test_degenerate_tetrahedra_are_dropped() {
        let mut vertices = unit_tet_vertices();
        vertices.push(Point3::new(1.0, 1.0, 0.0));
        // The second tetrahedron is flat in z = 0.
        let mesh = TetMesh::new(vertices.clone(), vec![[0, 1, 2, 3], [0, 1, 2, 4]]).unwrap();
        assert_eq!(mesh.len(), 1);

        let err = TetMesh::new(vertices, vec![[0, 1, 2, 4]]).unwrap_err();
        assert!(matches!(err, SimError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_invalid_input() {
        assert!(TetMesh::new(unit_tet_vertices(), vec![]).is_err());
        assert!(TetMesh::new(unit_tet_vertices(), vec![[0, 1, 2, 9]]).is_err());
        assert!(TetMesh::cuboid(Vector3::new(1.0, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_cuboid() {
        let mesh = TetMesh::cuboid(Vector3::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(mesh.len(), 6);
        assert_eq!(mesh.vertex_count(), 8);
        assert_relative_eq!(mesh.volume(), 48.0, epsilon = 1e-12);
        for t in 0..6 {
            // Faces through the diagonal are shared; the two others are not.
            let tet = mesh.tetrahedra()[t];
            for (face, on_surface) in FACES.iter().zip(mesh.surface(t)) {
                let on_diagonal = face.iter().any(|&i| tet[i] == 0)
                    && face.iter().any(|&i| tet[i] == 7);
                assert_eq!(on_surface, !on_diagonal);
            }
            assert_eq!(mesh.surface(t).iter().filter(|&&s| s).count(), 2);
        }
        let (lo, hi) = mesh.local_bounds();
        assert_eq!(lo, Point3::new(-1.0, -2.0, -3.0));
        assert_eq!(hi, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_update_world() {
        let mut mesh = TetMesh::cuboid(Vector3::repeat(1.0)).unwrap();
        let pose = Pose::new(
            Point3::new(0.0, 0.0, 5.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        mesh.update_world(&pose);
        // Corner (+1, -1, -1) rotates to (+1, +1, -1) and moves up.
        assert_relative_eq!(
            mesh.world_vertices()[1],
            Point3::new(1.0, 1.0, 4.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(mesh.tetrahedron(0).volume(), 4.0 / 3.0, epsilon = 1e-12);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_rebuilds_world_vertices() {
        let mesh = TetMesh::cuboid(Vector3::repeat(1.0)).unwrap();
        let json = serde_json::to_string(&mesh).unwrap();
        let back: TetMesh = serde_json::from_str(&json).unwrap();

        assert_eq!(back, mesh);
        assert_eq!(back.world_vertices(), mesh.world_vertices());
        assert_eq!(back.surface_face_count(), 12);

        let tree = crate::mid_phase::KdopTree::<9>::build(&back, 2);
        assert_eq!(tree.element_count(), 6);
        assert!(tree.root().is_valid());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_rejects_bad_indices() {
        let json = r#"{"vertices":[[0.0,0.0,0.0],[1.0,0.0,0.0],[0.0,1.0,0.0],[0.0,0.0,1.0]],"tetrahedra":[[0,1,2,9]]}"#;
        assert!(serde_json::from_str::<TetMesh>(json).is_err());
    }
}
