//! Collision detection over tetrahedral meshes and the contact-resolving step.
//!
//! This crate ties the layers together. Bodies carry tetrahedral meshes; each
//! mesh has a k-DOP tree that is refit every step; contacts found by
//! traversing pairs of trees go to the proximal solver in
//! [`prox_constraint`]; the solved velocities are integrated.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         World                                │
//! │  step(dt):  refit → broad phase → narrow phase → solve →    │
//! │             integrate → refit                                │
//! │  raycast(ray): box pre-filter → tree race → surface faces   │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//! ┌──────────────────────────┐      ┌──────────────────────────┐
//! │ broad_phase              │      │ prox_constraint          │
//! │  sweep and prune on      │      │  ContactSystem           │
//! │  tree root boxes         │      │  ProximalSolver          │
//! └──────────┬───────────────┘      └──────────────────────────┘
//!            ▼
//! ┌──────────────────────────┐
//! │ mid_phase / narrow_phase │
//! │  KdopTree pair traversal │
//! │  vertex-in-element tests │
//! └──────────┬───────────────┘
//!            ▼
//! ┌──────────────────────────┐
//! │ kdop / geometry / mesh   │
//! └──────────────────────────┘
//! ```
//!
//! # Layer 0 Crate
//!
//! No rendering or engine dependencies; usable headless.
//!
//! # Quick Start
//!
//! ```
//! use prox_core::{World, TetMesh, RigidBody, BodyId, MassProperties, Pose, WorldConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut world = World::new(WorldConfig::default());
//!
//! let ground = world
//!     .add_body(
//!         RigidBody::fixed(BodyId::new(0), Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
//!         Some(TetMesh::cuboid(Vector3::new(5.0, 5.0, 0.5)).unwrap()),
//!     )
//!     .unwrap();
//! let block = world
//!     .add_body(
//!         RigidBody::new(
//!             BodyId::new(0),
//!             Pose::from_position(Point3::new(0.3, -0.2, 0.6)),
//!             MassProperties::box_shape(1.0, Vector3::repeat(0.5)),
//!         ),
//!         Some(TetMesh::cuboid(Vector3::repeat(0.5)).unwrap()),
//!     )
//!     .unwrap();
//!
//! world.run_for(0.5, 0.01).unwrap();
//!
//! let z = world.body(block).unwrap().pose.position.z;
//! assert!(z > 0.4 && z < 0.6);
//! assert_eq!(world.body(ground).unwrap().pose.position.z, -0.5);
//! ```
//!
//! # Ray Casting
//!
//! ```
//! use prox_core::{World, TetMesh, RigidBody, BodyId, Pose, Ray};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut world = World::default();
//! world
//!     .add_body(
//!         RigidBody::fixed(BodyId::new(0), Pose::identity()),
//!         Some(TetMesh::cuboid(Vector3::repeat(1.0)).unwrap()),
//!     )
//!     .unwrap();
//!
//! let ray = Ray::new(Point3::new(0.0, 0.0, -3.0), Vector3::z()).unwrap();
//! let hit = world.raycast(&ray).unwrap();
//! assert!((hit.distance - 2.0).abs() < 1e-12);
//! ```

#![doc(html_root_url = "https://docs.rs/prox-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Errors are contract violations, listed on SimError
)]

pub mod broad_phase;
pub mod geometry;
pub mod integrators;
pub mod kdop;
pub mod mesh;
pub mod mid_phase;
pub mod narrow_phase;
mod world;

pub use broad_phase::{Aabb, Axis, BroadPhase, BroadPhaseEntry, BruteForce, SweepAndPrune};
pub use geometry::{ClosestPoints, Obb, Ray, Tetrahedron};
pub use kdop::{KDop, Kdop14, Kdop18, Kdop26, Kdop6};
pub use mesh::TetMesh;
pub use mid_phase::{DEFAULT_CHUNK_HEIGHT, KdopTree};
pub use narrow_phase::{Collider, ContactSet};
pub use world::{BodyTree, RayHit, StepReport, World};

// Re-export the types needed to populate a world
pub use prox_constraint::{Convergence, SolveStats};
pub use prox_contact::{ContactPoint, MatchStickModel, MaterialTable};
pub use prox_types::{
    BodyId, BodyKind, ConstantForce, ForceCallback, FrictionSolver, Gravity, MassProperties,
    NormalSolver, PinToPoint, Pose, RFactorStrategy, RigidBody, SimError, SolverConfig,
    SolverVariant, Twist, WorldConfig,
};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn ground() -> (RigidBody, TetMesh) {
        (
            RigidBody::fixed(BodyId::new(0), Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
            TetMesh::cuboid(Vector3::new(5.0, 5.0, 0.5)).unwrap(),
        )
    }

    fn block(position: Point3<f64>) -> (RigidBody, TetMesh) {
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

    fn add(world: &mut World, (body, mesh): (RigidBody, TetMesh)) -> BodyId {
        world.add_body(body, Some(mesh)).unwrap()
    }

    #[test]
    fn test_block_lands_and_rests() {
        let mut world = World::default();
        add(&mut world, ground());
        let id = add(&mut world, block(Point3::new(0.3, -0.2, 0.7)));

        world.run_for(1.0, 0.01).unwrap();

        let body = world.body(id).unwrap();
        assert_relative_eq!(body.pose.position.z, 0.5, epsilon = 0.02);
        // At most one step of free fall away from resting.
        assert!(body.twist.linear.norm() < 0.15);
        assert!(body.twist.linear.xy().norm() < 0.01);
        for c in world.contacts() {
            assert_relative_eq!(c.normal, Vector3::z(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_gauss_seidel_and_jacobi_agree_at_rest() {
        let mut resting = Vec::new();
        for variant in [SolverVariant::GaussSeidel, SolverVariant::Jacobi] {
            let solver = SolverConfig {
                variant,
                max_iterations: 200,
                ..SolverConfig::default()
            };
            let mut world = World::new(WorldConfig::default().solver(solver));
            add(&mut world, ground());
            let id = add(&mut world, block(Point3::new(0.3, -0.2, 0.499)));
            world.run_for(0.5, 0.01).unwrap();
            resting.push(world.body(id).unwrap().pose.position.z);
        }
        assert_relative_eq!(resting[0], resting[1], epsilon = 0.01);
    }

    #[test]
    fn test_separated_bodies_make_no_contacts() {
        let mut world = World::new(WorldConfig::default().zero_gravity());
        add(&mut world, block(Point3::origin()));
        add(&mut world, block(Point3::new(3.0, 0.0, 0.0)));
        let report = world.step(0.01).unwrap();
        assert_eq!(report.pairs, 0);
        assert_eq!(report.contacts, 0);
        assert!(report.stats.converged);
    }

    #[test]
    fn test_fixed_pairs_are_skipped() {
        let mut world = World::default();
        add(&mut world, ground());
        let (mut other, mesh) = ground();
        other.pose.position.z = -0.6;
        world.add_body(other, Some(mesh)).unwrap();
        let report = world.step(0.01).unwrap();
        assert_eq!(report.pairs, 0);
    }

    #[test]
    fn test_warm_start_is_used_across_steps() {
        let mut world = World::default();
        add(&mut world, ground());
        add(&mut world, block(Point3::new(0.3, -0.2, 0.499)));
        let first = world.step(0.01).unwrap();
        let second = world.step(0.01).unwrap();
        assert!(first.contacts > 0);
        assert!(!first.stats.warm_started);
        assert!(second.stats.warm_started);

        world.clear_warm_start();
        let third = world.step(0.01).unwrap();
        assert!(!third.stats.warm_started);
    }
}
