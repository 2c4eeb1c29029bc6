//! The simulation world: bodies, their collision meshes, and the step.
//!
//! [`World`] owns the body array, one optional tetrahedral mesh with its
//! k-DOP tree per body, the material table and the proximal solver. One
//! [`step`](World::step) runs
//!
//! ```text
//! refit → broad phase → tree traversal → assembly → solve → integrate → refit
//! ```
//!
//! with no other mutation of shared state. Everything that can be rejected
//! (time step, configuration, bodies, materials) is checked before the first
//! body moves.

use nalgebra::Point3;
use tracing::debug;

use prox_constraint::{ContactSystem, ProximalSolver, SolveStats};
use prox_contact::{ContactPoint, MatchStickModel, MaterialTable};
use prox_types::{BodyId, RigidBody, Result, SimError, WorldConfig};

use crate::broad_phase::{BroadPhase, BroadPhaseEntry, SweepAndPrune};
use crate::geometry::Ray;
use crate::integrators::{SemiImplicitEuler, integrate_bodies};
use crate::mesh::TetMesh;
use crate::mid_phase::{DEFAULT_CHUNK_HEIGHT, KdopTree};
use crate::narrow_phase::{Collider, ContactSet, collide};

/// The tree type every body uses: 18-DOPs.
pub type BodyTree = KdopTree<9>;

/// Collision geometry of one body.
#[derive(Debug, Clone)]
struct Geometry {
    mesh: TetMesh,
    tree: BodyTree,
}

/// What one step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Time step actually taken, after capping.
    pub dt: f64,
    /// Candidate body pairs from the broad phase.
    pub pairs: usize,
    /// Contacts handed to the solver.
    pub contacts: usize,
    /// Solver diagnostics.
    pub stats: SolveStats,
}

/// Nearest ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Body that was hit.
    pub body: BodyId,
    /// Hit point in world coordinates.
    pub point: Point3<f64>,
    /// Distance along the ray.
    pub distance: f64,
    /// Mesh element whose surface face was hit.
    pub element: usize,
}

/// Simulation world.
#[derive(Debug, Clone)]
pub struct World {
    bodies: Vec<RigidBody>,
    geometry: Vec<Option<Geometry>>,
    materials: MaterialTable,
    config: WorldConfig,
    solver: ProximalSolver,
    broad_phase: SweepAndPrune,
    chunk_height: usize,
    time: f64,
    step_count: u64,
    contacts: ContactSet,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// Create an empty world with one material.
    #[must_use]
    pub fn new(config: WorldConfig) -> Self {
        Self {
            bodies: Vec::new(),
            geometry: Vec::new(),
            materials: MaterialTable::new(1),
            solver: ProximalSolver::new(config.solver),
            config,
            broad_phase: SweepAndPrune::new(),
            chunk_height: DEFAULT_CHUNK_HEIGHT,
            time: 0.0,
            step_count: 0,
            contacts: ContactSet::new(),
        }
    }

    /// Height of the subtrees of trees built from now on.
    #[must_use]
    pub fn with_chunk_height(mut self, chunk_height: usize) -> Self {
        self.chunk_height = chunk_height.max(1);
        self
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Replace the configuration; the solver picks it up on the next step.
    pub fn set_config(&mut self, config: WorldConfig) -> Result<()> {
        config.validate()?;
        self.solver.set_config(config.solver);
        self.config = config;
        Ok(())
    }

    /// Simulated time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of completed steps.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    // =========================================================================
    // Bodies
    // =========================================================================

    /// Add a body, optionally with a collision mesh in body coordinates.
    ///
    /// The body's id is overwritten with its index in the body array.
    pub fn add_body(&mut self, mut body: RigidBody, mesh: Option<TetMesh>) -> Result<BodyId> {
        body.validate()?;
        if body.material >= self.materials.len() {
            return Err(SimError::InvalidMaterial(body.material, self.materials.len()));
        }
        let id = BodyId::new(self.bodies.len());
        body.id = id;
        let geometry = mesh.map(|mut mesh| {
            mesh.update_world(&body.pose);
            let tree = KdopTree::build(&mesh, self.chunk_height);
            Geometry { mesh, tree }
        });
        self.bodies.push(body);
        self.geometry.push(geometry);
        Ok(id)
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Body by id.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id.index())
    }

    /// Mutable body by id.
    ///
    /// Moving a body by hand takes effect for collision queries after
    /// [`refit`](Self::refit) or the next step.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id.index())
    }

    /// All bodies in id order.
    #[must_use]
    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    /// Collision mesh of a body.
    #[must_use]
    pub fn mesh(&self, id: BodyId) -> Option<&TetMesh> {
        self.geometry.get(id.index())?.as_ref().map(|g| &g.mesh)
    }

    /// k-DOP tree of a body.
    #[must_use]
    pub fn tree(&self, id: BodyId) -> Option<&BodyTree> {
        self.geometry.get(id.index())?.as_ref().map(|g| &g.tree)
    }

    // =========================================================================
    // Materials
    // =========================================================================

    /// Material table.
    #[must_use]
    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    /// Grow or shrink the material table; new pairs use the default model.
    pub fn set_material_count(&mut self, count: usize) {
        self.materials.resize(count);
    }

    /// Replace the model of a material pair.
    pub fn set_material(&mut self, a: usize, b: usize, model: MatchStickModel) -> Result<()> {
        self.materials.set(a, b, model)
    }

    /// Isotropic friction for a material pair.
    pub fn set_friction(&mut self, a: usize, b: usize, mu: f64) -> Result<()> {
        self.materials.set_friction(a, b, mu)
    }

    /// Anisotropic friction `(μ_s, μ_t, μ_τ)` for a material pair.
    pub fn set_anisotropic_friction(
        &mut self,
        a: usize,
        b: usize,
        mu_s: f64,
        mu_t: f64,
        mu_drill: f64,
    ) -> Result<()> {
        self.materials.set_anisotropic_friction(a, b, mu_s, mu_t, mu_drill)
    }

    /// Restitution for a material pair.
    pub fn set_restitution(&mut self, a: usize, b: usize, restitution: f64) -> Result<()> {
        self.materials.set_restitution(a, b, restitution)
    }

    // =========================================================================
    // Stepping
    // =========================================================================

    /// Contacts of the last step, in traversal order.
    #[must_use]
    pub fn contacts(&self) -> &[ContactPoint] {
        self.contacts.as_slice()
    }

    /// Forget the impulses kept for warm starting.
    pub fn clear_warm_start(&mut self) {
        self.solver.clear_warm_start();
    }

    /// Move every mesh to its body's pose and refit its tree.
    pub fn refit(&mut self) {
        for (body, geometry) in self.bodies.iter().zip(&mut self.geometry) {
            if let Some(geometry) = geometry {
                geometry.mesh.update_world(&body.pose);
                geometry.tree.refit(&geometry.mesh);
            }
        }
    }

    /// Check everything a step depends on.
    pub fn validate(&self) -> Result<()> {
        self.config.validate()?;
        for (index, body) in self.bodies.iter().enumerate() {
            if body.id.index() != index {
                return Err(SimError::InvalidBodyId(body.id.index()));
            }
            body.validate()?;
            if body.material >= self.materials.len() {
                return Err(SimError::InvalidMaterial(body.material, self.materials.len()));
            }
        }
        Ok(())
    }

    /// Advance the world by `dt`, capped at the configured maximum.
    ///
    /// Invalid input is rejected before any body is touched.
    pub fn step(&mut self, dt: f64) -> Result<StepReport> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        self.validate()?;
        let dt = dt.min(self.config.max_timestep);

        self.refit();
        let pairs = self.find_pairs();
        self.contacts.clear();
        for &(a, b) in &pairs {
            let (Some(ga), Some(gb)) = (&self.geometry[a.index()], &self.geometry[b.index()])
            else {
                continue;
            };
            collide(
                &Collider {
                    body: &self.bodies[a.index()],
                    mesh: &ga.mesh,
                    tree: &ga.tree,
                },
                &Collider {
                    body: &self.bodies[b.index()],
                    mesh: &gb.mesh,
                    tree: &gb.tree,
                },
                &mut self.contacts,
            );
        }

        let system = ContactSystem::build(
            self.contacts.as_slice(),
            &self.bodies,
            &self.materials,
            &self.config,
            dt,
            self.time,
        )?;
        let result = self.solver.solve(&system)?;
        let velocities = system.updated_velocities(&result.velocity_change)?;
        integrate_bodies::<SemiImplicitEuler>(&mut self.bodies, &velocities, dt)?;
        self.refit();

        self.time += dt;
        self.step_count += 1;

        debug!(
            step = self.step_count,
            dt,
            pairs = pairs.len(),
            contacts = self.contacts.len(),
            iterations = result.stats.iterations,
            "step finished"
        );

        Ok(StepReport {
            dt,
            pairs: pairs.len(),
            contacts: self.contacts.len(),
            stats: result.stats,
        })
    }

    /// Step repeatedly until `duration` has elapsed; returns the number of steps.
    pub fn run_for(&mut self, duration: f64, dt: f64) -> Result<usize> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::invalid_input(format!(
                "duration must be non-negative and finite, got {duration}"
            )));
        }
        let end = self.time + duration;
        let mut steps = 0;
        while end - self.time > 1e-12 {
            self.step(dt.min(end - self.time))?;
            steps += 1;
        }
        Ok(steps)
    }

    fn find_pairs(&mut self) -> Vec<(BodyId, BodyId)> {
        let entries: Vec<BroadPhaseEntry> = self
            .bodies
            .iter()
            .zip(&self.geometry)
            .filter_map(|(body, geometry)| {
                let geometry = geometry.as_ref()?;
                Some(BroadPhaseEntry::new(
                    body.id,
                    geometry.tree.root().aabb(),
                    body.is_free(),
                ))
            })
            .collect();
        self.broad_phase.find_potential_pairs(&entries)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Nearest surface hit of `ray` over every body with a mesh.
    ///
    /// Each body's bounding box is tested first; its tree is only descended
    /// when the box can be entered before the best hit so far.
    #[must_use]
    pub fn raycast(&self, ray: &Ray) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for (body, geometry) in self.bodies.iter().zip(&self.geometry) {
            let Some(geometry) = geometry else {
                continue;
            };
            let best_length = best.map_or(f64::INFINITY, |hit| hit.distance);
            if geometry.tree.root().aabb().ray_entry(ray, best_length).is_none() {
                continue;
            }
            let mesh = &geometry.mesh;
            let found = geometry
                .tree
                .raycast(ray, |element| mesh.tetrahedron(element).raycast(ray, mesh.surface(element)));
            if let Some((element, distance)) = found {
                if distance < best_length {
                    best = Some(RayHit {
                        body: body.id,
                        point: ray.point_at(distance),
                        distance,
                        element,
                    });
                }
            }
        }
        best
    }

    /// Kinetic energy of every free body.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies
            .iter()
            .filter(|b| b.is_free())
            .map(|b| {
                let v = &b.twist.linear;
                let w = &b.twist.angular;
                0.5 * b.mass_properties.mass * v.norm_squared()
                    + 0.5 * w.dot(&(b.world_inertia() * w))
            })
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use prox_types::{MassProperties, Pose, Twist};

    fn ball(z: f64) -> RigidBody {
        RigidBody::new(
            BodyId::new(0),
            Pose::from_position(Point3::new(0.0, 0.0, z)),
            MassProperties::sphere(1.0, 0.5),
        )
    }

    fn crate_box(position: Point3<f64>) -> (RigidBody, TetMesh) {
        let half = Vector3::repeat(0.5);
        (
            RigidBody::new(
                BodyId::new(0),
                Pose::from_position(position),
                MassProperties::box_shape(1.0, half),
            ),
            TetMesh::cuboid(half).unwrap(),
        )
    }

    #[test]
    fn test_add_body_assigns_ids() {
        let mut world = World::default();
        let a = world.add_body(ball(1.0), None).unwrap();
        let b = world.add_body(ball(2.0).with_kind(prox_types::BodyKind::Fixed), None).unwrap();
        assert_eq!((a, b), (BodyId::new(0), BodyId::new(1)));
        assert_eq!(world.body(b).unwrap().id, b);
        assert!(world.mesh(a).is_none());
    }

    #[test]
    fn test_add_body_rejects_bad_material() {
        let mut world = World::default();
        let err = world.add_body(ball(0.0).with_material(3), None).unwrap_err();
        assert_eq!(err, SimError::InvalidMaterial(3, 1));
        assert_eq!(world.body_count(), 0);

        world.set_material_count(4);
        assert!(world.add_body(ball(0.0).with_material(3), None).is_ok());
    }

    #[test]
    fn test_free_fall() {
        let mut world = World::default();
        let id = world.add_body(ball(10.0), None).unwrap();
        let report = world.step(0.01).unwrap();
        assert_eq!(report.contacts, 0);
        let body = world.body(id).unwrap();
        assert_relative_eq!(body.twist.linear.z, -0.0981, epsilon = 1e-12);
        assert_relative_eq!(body.pose.position.z, 10.0 - 0.000_981, epsilon = 1e-12);
        assert_relative_eq!(world.time(), 0.01);
    }

    #[test]
    fn test_timestep_is_capped() {
        let mut world = World::default();
        world.add_body(ball(10.0), None).unwrap();
        let report = world.step(1.0).unwrap();
        assert_relative_eq!(report.dt, 1.0 / 30.0);
        assert_relative_eq!(world.time(), 1.0 / 30.0);
    }

    #[test]
    fn test_invalid_step_mutates_nothing() {
        let mut world = World::default();
        let id = world.add_body(ball(10.0), None).unwrap();
        assert!(matches!(world.step(0.0), Err(SimError::InvalidTimestep(_))));
        assert!(world.step(f64::NAN).is_err());

        world.body_mut(id).unwrap().twist = Twist::new(Vector3::new(f64::NAN, 0.0, 0.0), Vector3::zeros());
        assert!(world.step(0.01).is_err());
        assert_eq!(world.body(id).unwrap().pose.position.z, 10.0);
        assert_eq!(world.time(), 0.0);
        assert_eq!(world.step_count(), 0);
    }

    #[test]
    fn test_set_config_validates() {
        let mut world = World::default();
        let mut config = WorldConfig::default();
        config.max_timestep = -1.0;
        assert!(world.set_config(config).is_err());
        assert!(world.set_config(WorldConfig::realtime()).is_ok());
    }

    #[test]
    fn test_material_setters() {
        let mut world = World::default();
        world.set_material_count(2);
        world.set_friction(0, 1, 0.3).unwrap();
        world.set_anisotropic_friction(1, 1, 0.2, 0.6, 0.01).unwrap();
        world.set_restitution(0, 1, 0.5).unwrap();
        assert!(world.set_friction(0, 2, 0.3).is_err());
        assert!(world.set_restitution(0, 0, 1.5).is_err());

        let m = world.materials().get(1, 0).unwrap();
        assert_eq!(m.friction, 0.3);
        assert_eq!(m.restitution, 0.5);
        assert_eq!(world.materials().get(1, 1).unwrap().coefficients(), Vector3::new(0.2, 0.6, 0.01));
    }

    #[test]
    fn test_raycast_picks_nearest_body() {
        let mut world = World::new(WorldConfig::default().zero_gravity());
        let (near, mesh) = crate_box(Point3::new(0.0, 0.0, 2.0));
        let near = world.add_body(near, Some(mesh)).unwrap();
        let (far, mesh) = crate_box(Point3::new(0.0, 0.0, 5.0));
        world.add_body(far, Some(mesh)).unwrap();

        let up = Ray::new(Point3::origin(), Vector3::z()).unwrap();
        let hit = world.raycast(&up).unwrap();
        assert_eq!(hit.body, near);
        assert_relative_eq!(hit.distance, 1.5, epsilon = 1e-12);
        assert_relative_eq!(hit.point, Point3::new(0.0, 0.0, 1.5), epsilon = 1e-12);

        let down = Ray::new(Point3::origin(), -Vector3::z()).unwrap();
        assert!(world.raycast(&down).is_none());
    }

    #[test]
    fn test_raycast_follows_refit() {
        let mut world = World::default();
        let (body, mesh) = crate_box(Point3::new(0.0, 0.0, 2.0));
        let id = world.add_body(body, Some(mesh)).unwrap();
        world.body_mut(id).unwrap().pose.position.x = 10.0;
        let up = Ray::new(Point3::origin(), Vector3::z()).unwrap();
        // Stale until refit.
        assert!(world.raycast(&up).is_some());
        world.refit();
        assert!(world.raycast(&up).is_none());
    }

    #[test]
    fn test_kinetic_energy() {
        let mut world = World::default();
        world
            .add_body(ball(0.0).with_twist(Twist::new(Vector3::new(2.0, 0.0, 0.0), Vector3::zeros())), None)
            .unwrap();
        assert_relative_eq!(world.total_kinetic_energy(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_run_for() {
        let mut world = World::default();
        world.add_body(ball(10.0), None).unwrap();
        let steps = world.run_for(0.1, 0.01).unwrap();
        assert_eq!(steps, 10);
        assert_relative_eq!(world.time(), 0.1, epsilon = 1e-12);
    }
}
