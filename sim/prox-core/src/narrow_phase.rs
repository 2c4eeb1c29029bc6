//! Narrow phase: contact points between two tetrahedral meshes.
//!
//! The k-DOP trees of both meshes are traversed together to find element
//! pairs whose volumes overlap. Each surviving pair is tested both ways:
//! every vertex of one tetrahedron that lies inside the other becomes a
//! contact against the nearest *surface* face of the containing element.
//! Interior faces never produce contacts, so an element with no surface
//! faces contributes nothing.
//!
//! The owner of the face supplies the normal, which points out of the
//! owner and into the penetrating body. A contact whose owner is the second
//! body of the pair is tagged with `should_flip`.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;

use prox_contact::ContactPoint;
use prox_types::{BodyId, RigidBody};

use crate::geometry::{Obb, Tetrahedron};
use crate::mesh::TetMesh;
use crate::mid_phase::KdopTree;

/// Barycentric slack for vertices on the boundary of an element.
const CONTAINMENT_TOLERANCE: f64 = 1e-9;

/// A vertex of one tetrahedron inside another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexContact {
    /// Index `0..4` of the vertex in the penetrating tetrahedron.
    pub vertex: usize,
    /// Midpoint between the vertex and its projection onto the face.
    pub point: Point3<f64>,
    /// Outward normal of the owning face.
    pub normal: Vector3<f64>,
    /// Distance from the vertex to the face plane.
    pub depth: f64,
}

/// Vertices of `other` inside `owner`, each resolved against the nearest
/// face of `owner` whose `surface` flag is set.
#[must_use]
pub fn tetrahedron_contacts(
    owner: &Tetrahedron,
    surface: [bool; 4],
    other: &Tetrahedron,
) -> SmallVec<[VertexContact; 4]> {
    let mut out = SmallVec::new();
    if !surface.iter().any(|&s| s) {
        return out;
    }
    for (vertex, p) in other.vertices.iter().enumerate() {
        if !owner.contains_point(p, CONTAINMENT_TOLERANCE) {
            continue;
        }
        // Inside points have negative face distances; the nearest face is the largest.
        let nearest = (0..4)
            .filter(|&i| surface[i])
            .filter_map(|i| Some((owner.face_normal(i)?, owner.face_distance(i, p)?)))
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let Some((normal, distance)) = nearest else {
            continue;
        };
        let depth = (-distance).max(0.0);
        out.push(VertexContact {
            vertex,
            point: p + normal * (0.5 * depth),
            normal,
            depth,
        });
    }
    out
}

/// Identifies a contact: owning body, penetrating body, penetrating mesh vertex.
type ContactKey = (BodyId, BodyId, usize);

/// Contacts of one step, in insertion order, one per [`ContactKey`].
#[derive(Debug, Clone, Default)]
pub struct ContactSet {
    contacts: Vec<ContactPoint>,
    slots: HashMap<ContactKey, usize>,
}

impl ContactSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every contact, keeping the allocations.
    pub fn clear(&mut self) {
        self.contacts.clear();
        self.slots.clear();
    }

    /// Insert `contact` under `key`; an existing contact is replaced only
    /// by a strictly deeper one.
    ///
    /// Returns true when the set changed.
    pub fn insert(&mut self, key: ContactKey, contact: ContactPoint) -> bool {
        match self.slots.get(&key) {
            Some(&slot) => {
                if contact.penetration > self.contacts[slot].penetration {
                    self.contacts[slot] = contact;
                    true
                } else {
                    false
                }
            }
            None => {
                self.slots.insert(key, self.contacts.len());
                self.contacts.push(contact);
                true
            }
        }
    }

    /// Number of contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// True when the set holds no contacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Contacts in insertion order.
    #[must_use]
    pub fn as_slice(&self) -> &[ContactPoint] {
        &self.contacts
    }

    /// Take the contacts out.
    #[must_use]
    pub fn into_vec(self) -> Vec<ContactPoint> {
        self.contacts
    }
}

/// A body with its collision geometry, refit to the body's pose.
#[derive(Debug, Clone, Copy)]
pub struct Collider<'a, const N: usize> {
    /// The body.
    pub body: &'a RigidBody,
    /// Its mesh, world vertices up to date.
    pub mesh: &'a TetMesh,
    /// The tree over `mesh`, refit.
    pub tree: &'a KdopTree<N>,
}

impl<const N: usize> Collider<'_, N> {
    fn obb(&self) -> Obb {
        let (min, max) = self.mesh.local_bounds();
        Obb::from_local_bounds(&self.body.pose, &min, &max)
    }
}

/// Generate the contacts between `a` and `b` into `contacts`.
///
/// Returns the number of contacts inserted or deepened.
pub fn collide<const N: usize>(
    a: &Collider<'_, N>,
    b: &Collider<'_, N>,
    contacts: &mut ContactSet,
) -> usize {
    if !a.obb().overlaps(&b.obb()) {
        return 0;
    }
    let mut changed = 0;
    for (ea, eb) in a.tree.overlapping_pairs(b.tree) {
        let ta = a.mesh.tetrahedron(ea);
        let tb = b.mesh.tetrahedron(eb);
        if !ta.overlaps(&tb) {
            continue;
        }
        changed += resolve(a, ea, &ta, b, eb, &tb, false, contacts);
        changed += resolve(b, eb, &tb, a, ea, &ta, true, contacts);
    }
    changed
}

/// Contacts of `other`'s vertices against `owner`'s surface.
#[allow(clippy::too_many_arguments)]
fn resolve<const N: usize>(
    owner: &Collider<'_, N>,
    owner_element: usize,
    owner_tet: &Tetrahedron,
    other: &Collider<'_, N>,
    other_element: usize,
    other_tet: &Tetrahedron,
    should_flip: bool,
    contacts: &mut ContactSet,
) -> usize {
    let hits = tetrahedron_contacts(owner_tet, owner.mesh.surface(owner_element), other_tet);
    if hits.is_empty() {
        return 0;
    }
    let structure_owner = owner.body.world_structure_direction();
    let structure_other = other.body.world_structure_direction();
    let vertices = other.mesh.tetrahedra()[other_element];

    let mut changed = 0;
    for hit in hits {
        let contact = ContactPoint::new(hit.point, hit.normal, hit.depth, owner.body.id, other.body.id)
            .with_structure(structure_owner, structure_other)
            .with_flip(should_flip);
        if contacts.insert((owner.body.id, other.body.id, vertices[hit.vertex]), contact) {
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::mid_phase::DEFAULT_CHUNK_HEIGHT;
    use approx::assert_relative_eq;
    use prox_types::{MassProperties, Pose};

    fn unit_tet() -> Tetrahedron {
        Tetrahedron::new(
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        )
    }

    /// A tetrahedron poking one vertex up to `tip`.
    fn spike(tip: Point3<f64>) -> Tetrahedron {
        Tetrahedron::new(
            tip,
            Point3::new(tip.x, tip.y, -1.0),
            Point3::new(tip.x + 1.0, tip.y, -1.0),
            Point3::new(tip.x, tip.y + 1.0, -1.0),
        )
    }

    #[test]
    fn test_vertex_against_nearest_surface_face() {
        let hits = tetrahedron_contacts(&unit_tet(), [true; 4], &spike(Point3::new(0.1, 0.2, 0.05)));
        assert_eq!(hits.len(), 1);
        let hit = hits[0];
        assert_eq!(hit.vertex, 0);
        assert_relative_eq!(hit.depth, 0.05, epsilon = 1e-12);
        assert_relative_eq!(hit.normal, -Vector3::z(), epsilon = 1e-12);
        assert_relative_eq!(hit.point, Point3::new(0.1, 0.2, 0.025), epsilon = 1e-12);
    }

    #[test]
    fn test_interior_faces_are_ignored() {
        let tip = spike(Point3::new(0.1, 0.2, 0.05));
        // Without the bottom face the nearest surface face is x = 0.
        let hits = tetrahedron_contacts(&unit_tet(), [true, true, true, false], &tip);
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].depth, 0.1, epsilon = 1e-12);
        assert_relative_eq!(hits[0].normal, -Vector3::x(), epsilon = 1e-12);

        assert!(tetrahedron_contacts(&unit_tet(), [false; 4], &tip).is_empty());
    }

    #[test]
    fn test_outside_vertices_make_no_contacts() {
        let hits = tetrahedron_contacts(&unit_tet(), [true; 4], &spike(Point3::new(0.1, 0.2, -0.05)));
        assert!(hits.is_empty());
    }

    #[test]
    fn test_contact_set_keeps_deepest() {
        let key = (BodyId::new(0), BodyId::new(1), 3);
        let shallow = ContactPoint::new(Point3::origin(), Vector3::z(), 0.1, key.0, key.1);
        let deep = ContactPoint::new(Point3::origin(), Vector3::z(), 0.2, key.0, key.1);

        let mut set = ContactSet::new();
        assert!(set.insert(key, shallow));
        assert!(set.insert(key, deep));
        assert!(!set.insert(key, shallow));
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].penetration, 0.2);

        // Same vertex, other owner: a separate contact.
        assert!(set.insert((key.1, key.0, 3), shallow));
        assert_eq!(set.len(), 2);
        set.clear();
        assert!(set.is_empty());
    }

    struct Body {
        body: RigidBody,
        mesh: TetMesh,
        tree: KdopTree<9>,
    }

    impl Body {
        fn new(id: usize, half: f64, position: Point3<f64>) -> Self {
            let body = RigidBody::new(
                BodyId::new(id),
                Pose::from_position(position),
                MassProperties::box_shape(1.0, Vector3::repeat(half)),
            )
            .with_structure_direction(Vector3::x());
            let mut mesh = TetMesh::cuboid(Vector3::repeat(half)).unwrap();
            mesh.update_world(&body.pose);
            let tree = KdopTree::build(&mesh, DEFAULT_CHUNK_HEIGHT);
            Self { body, mesh, tree }
        }

        fn collider(&self) -> Collider<'_, 9> {
            Collider {
                body: &self.body,
                mesh: &self.mesh,
                tree: &self.tree,
            }
        }
    }

    #[test]
    fn test_small_box_sinking_into_large_box() {
        let ground = Body::new(0, 1.0, Point3::origin());
        // Bottom at z = 0.9; two corners sit on interior faces of the ground.
        let block = Body::new(1, 0.5, Point3::new(0.0, 0.0, 1.4));

        let mut set = ContactSet::new();
        assert!(collide(&ground.collider(), &block.collider(), &mut set) >= 4);
        assert_eq!(set.len(), 4);
        for c in set.as_slice() {
            assert_eq!((c.body_i, c.body_j), (BodyId::new(0), BodyId::new(1)));
            assert!(!c.should_flip);
            assert_relative_eq!(c.normal, Vector3::z(), epsilon = 1e-12);
            assert_relative_eq!(c.penetration, 0.1, epsilon = 1e-12);
            assert_relative_eq!(c.position.z, 0.95, epsilon = 1e-12);
            assert_relative_eq!(c.structure, Vector3::x(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_flipped_when_second_body_owns_the_normal() {
        let ground = Body::new(0, 1.0, Point3::origin());
        let block = Body::new(1, 0.5, Point3::new(0.1, 0.2, 1.4));

        let mut set = ContactSet::new();
        collide(&block.collider(), &ground.collider(), &mut set);
        assert_eq!(set.len(), 4);
        for c in set.as_slice() {
            assert_eq!(c.body_i, BodyId::new(0));
            assert!(c.should_flip);
        }
    }

    #[test]
    fn test_separated_boxes() {
        let a = Body::new(0, 1.0, Point3::origin());
        let b = Body::new(1, 0.5, Point3::new(0.0, 0.0, 1.6));
        let mut set = ContactSet::new();
        assert_eq!(collide(&a.collider(), &b.collider(), &mut set), 0);
        assert!(set.is_empty());
    }
}
