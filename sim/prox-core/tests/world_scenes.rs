//! Whole-world scenes: stacking, anisotropic sliding, bouncing and force callbacks.

#![allow(
    missing_docs,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp
)]

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};

use prox_core::{
    BodyId, MassProperties, PinToPoint, Pose, RigidBody, SolverConfig, SolverVariant, TetMesh,
    Twist, World, WorldConfig,
};

fn add_ground(world: &mut World) -> BodyId {
    world
        .add_body(
            RigidBody::fixed(BodyId::new(0), Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
            Some(TetMesh::cuboid(Vector3::new(5.0, 5.0, 0.5)).unwrap()),
        )
        .unwrap()
}

fn unit_box(position: Point3<f64>) -> (RigidBody, TetMesh) {
    cube(position, 0.5)
}

fn cube(position: Point3<f64>, half: f64) -> (RigidBody, TetMesh) {
    let half = Vector3::repeat(half);
    (
        RigidBody::new(
            BodyId::new(0),
            Pose::from_position(position),
            MassProperties::box_shape(1.0, half),
        ),
        TetMesh::cuboid(half).unwrap(),
    )
}

fn add_box(world: &mut World, (body, mesh): (RigidBody, TetMesh)) -> BodyId {
    world.add_body(body, Some(mesh)).unwrap()
}

#[test]
fn test_two_box_stack_settles() {
    for variant in [SolverVariant::GaussSeidel, SolverVariant::Jacobi] {
        let solver = SolverConfig {
            variant,
            max_iterations: 200,
            ..SolverConfig::default()
        };
        let mut world = World::new(WorldConfig::default().solver(solver));
        add_ground(&mut world);
        let bottom = add_box(&mut world, unit_box(Point3::new(0.0, 0.0, 0.499)));
        // Every bottom corner of the smaller top box rests on the lower box.
        let top = add_box(&mut world, cube(Point3::new(0.1, 0.1, 1.298), 0.3));

        world.run_for(1.5, 0.01).unwrap();

        let bottom = world.body(bottom).unwrap();
        let top = world.body(top).unwrap();
        assert_relative_eq!(bottom.pose.position.z, 0.5, epsilon = 0.05);
        assert_relative_eq!(top.pose.position.z, 1.3, epsilon = 0.05);
        assert!(top.twist.linear.xy().norm() < 0.05);
        assert!(top.twist.angular.norm() < 0.2);
    }
}

/// A box resting on the ground, sliding at `velocity` over a surface that
/// grips weakly along x and strongly along y.
fn sliding_box(velocity: Vector3<f64>) -> (World, BodyId) {
    let mut world = World::default();
    world.set_anisotropic_friction(0, 0, 0.1, 0.8, 0.0).unwrap();
    add_ground(&mut world);
    let (body, mesh) = unit_box(Point3::new(0.0, 0.0, 0.499));
    let body = body
        .with_structure_direction(Vector3::x())
        .with_twist(Twist::new(velocity, Vector3::zeros()));
    let id = world.add_body(body, Some(mesh)).unwrap();
    (world, id)
}

#[test]
fn test_sliding_along_weak_direction_keeps_speed() {
    let (mut world, id) = sliding_box(Vector3::x());
    world.run_for(0.2, 0.01).unwrap();
    let body = world.body(id).unwrap();
    assert!(body.twist.linear.x > 0.6, "vx = {}", body.twist.linear.x);
    assert!(body.twist.linear.x < 1.0);
    assert!(body.twist.linear.y.abs() < 0.05);
}

#[test]
fn test_sliding_along_strong_direction_stops() {
    let (mut world, id) = sliding_box(Vector3::y());
    world.run_for(0.2, 0.01).unwrap();
    let body = world.body(id).unwrap();
    assert!(body.twist.linear.y < 0.2, "vy = {}", body.twist.linear.y);
    assert!(body.twist.linear.x.abs() < 0.05);
}

/// Drop a box from one meter and report the fastest upward velocity it reaches.
fn peak_rebound(restitution: f64) -> f64 {
    let mut world = World::new(WorldConfig::default().with_error_reduction(0.05));
    world.set_restitution(0, 0, restitution).unwrap();
    add_ground(&mut world);
    let id = add_box(&mut world, unit_box(Point3::new(0.0, 0.0, 1.5)));

    let mut peak = f64::NEG_INFINITY;
    for _ in 0..80 {
        world.step(0.01).unwrap();
        peak = peak.max(world.body(id).unwrap().twist.linear.z);
    }
    peak
}

#[test]
fn test_restitution_makes_the_box_bounce() {
    let bouncy = peak_rebound(0.8);
    let dead = peak_rebound(0.0);
    assert!(bouncy > 1.5, "bouncy peak = {bouncy}");
    assert!(dead < 1.0, "dead peak = {dead}");
}

#[test]
fn test_pinned_body_settles_on_anchor() {
    let mut world = World::new(WorldConfig::default().zero_gravity());
    let pin = PinToPoint::new(Point3::origin(), Point3::origin(), 10.0, 2.0);
    let body = RigidBody::new(
        BodyId::new(0),
        Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
        MassProperties::sphere(1.0, 0.5),
    )
    .with_force(Arc::new(pin));
    let id = world.add_body(body, None).unwrap();

    world.run_for(5.0, 0.01).unwrap();

    let body = world.body(id).unwrap();
    assert!(body.pose.position.coords.norm() < 0.05);
    assert!(world.contacts().is_empty());
}

#[test]
fn test_energy_does_not_grow_at_rest() {
    let mut world = World::default();
    add_ground(&mut world);
    add_box(&mut world, unit_box(Point3::new(0.2, 0.1, 0.499)));
    world.run_for(0.5, 0.01).unwrap();
    let settled = world.total_kinetic_energy();
    world.run_for(0.5, 0.01).unwrap();
    assert!(world.total_kinetic_energy() < settled + 0.05);
}
