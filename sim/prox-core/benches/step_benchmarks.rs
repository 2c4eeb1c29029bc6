//! Benchmarks for tree refit, tree traversal, ray casting and full steps.
//!
//! Run with: cargo bench -p prox-core

#![allow(missing_docs, clippy::cast_precision_loss, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use prox_core::{
    BodyId, KdopTree, MassProperties, Pose, Ray, RigidBody, SolverConfig, SolverVariant, TetMesh,
    World, WorldConfig,
};

/// An `n × n × n` lattice of unit cells, six tetrahedra per cell.
fn lattice_mesh(n: usize) -> TetMesh {
    let side = n + 1;
    let index = |x: usize, y: usize, z: usize| x + side * (y + side * z);
    let mut vertices = Vec::with_capacity(side * side * side);
    for z in 0..side {
        for y in 0..side {
            for x in 0..side {
                vertices.push(Point3::new(x as f64, y as f64, z as f64));
            }
        }
    }
    let mut tetrahedra = Vec::with_capacity(6 * n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let corner = |k: usize| index(x + (k & 1), y + ((k >> 1) & 1), z + ((k >> 2) & 1));
                for [a, b, c, d] in [
                    [0, 1, 3, 7],
                    [0, 1, 5, 7],
                    [0, 2, 3, 7],
                    [0, 2, 6, 7],
                    [0, 4, 5, 7],
                    [0, 4, 6, 7],
                ] {
                    tetrahedra.push([corner(a), corner(b), corner(c), corner(d)]);
                }
            }
        }
    }
    TetMesh::new(vertices, tetrahedra).unwrap()
}

fn bench_tree_refit(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_refit");
    for n in [4, 8, 16] {
        let mut mesh = lattice_mesh(n);
        let mut tree = KdopTree::<9>::build(&mesh, 4);
        let pose = Pose::new(
            Point3::new(0.1, 0.2, 0.3),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
        );
        mesh.update_world(&pose);
        group.throughput(Throughput::Elements(mesh.len() as u64));
        group.bench_with_input(BenchmarkId::new("18dop", mesh.len()), &mesh, |b, mesh| {
            b.iter(|| {
                tree.refit(black_box(mesh));
                black_box(tree.root());
            });
        });
    }
    group.finish();
}

fn bench_tree_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_pairs");
    for n in [4, 8] {
        let a = lattice_mesh(n);
        let mut b = lattice_mesh(n);
        b.update_world(&Pose::from_position(Point3::new(n as f64 - 0.5, 0.25, 0.25)));
        let tree_a = KdopTree::<9>::build(&a, 4);
        let tree_b = KdopTree::<9>::build(&b, 4);
        group.bench_function(BenchmarkId::new("face_to_face", a.len()), |bench| {
            bench.iter(|| black_box(tree_a.overlapping_pairs(&tree_b)));
        });
    }
    group.finish();
}

fn bench_raycast(c: &mut Criterion) {
    let mut world = World::default();
    world
        .add_body(
            RigidBody::fixed(BodyId::new(0), Pose::identity()),
            Some(lattice_mesh(12)),
        )
        .unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let rays: Vec<Ray> = (0..256)
        .map(|_| {
            let origin = Point3::new(rng.gen_range(0.0..12.0), rng.gen_range(0.0..12.0), -5.0);
            let direction = Vector3::new(rng.gen_range(-0.2..0.2), rng.gen_range(-0.2..0.2), 1.0);
            Ray::new(origin, direction).unwrap()
        })
        .collect();

    c.bench_function("raycast_256_rays", |b| {
        b.iter(|| {
            for ray in &rays {
                black_box(world.raycast(ray));
            }
        });
    });
}

/// A fixed ground with `count` boxes resting in a row.
fn resting_row(count: usize, variant: SolverVariant) -> World {
    let solver = SolverConfig {
        variant,
        ..SolverConfig::realtime()
    };
    let mut world = World::new(WorldConfig::default().solver(solver));
    world
        .add_body(
            RigidBody::fixed(BodyId::new(0), Pose::from_position(Point3::new(0.0, 0.0, -0.5))),
            Some(TetMesh::cuboid(Vector3::new(2.0 * count as f64, 5.0, 0.5)).unwrap()),
        )
        .unwrap();
    let half = Vector3::repeat(0.5);
    for i in 0..count {
        let x = 1.5 * i as f64 - 0.75 * count as f64;
        world
            .add_body(
                RigidBody::new(
                    BodyId::new(0),
                    Pose::from_position(Point3::new(x, 0.1, 0.499)),
                    MassProperties::box_shape(1.0, half),
                ),
                Some(TetMesh::cuboid(half).unwrap()),
            )
            .unwrap();
    }
    world
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    for (name, variant) in [
        ("gauss_seidel", SolverVariant::GaussSeidel),
        ("jacobi", SolverVariant::Jacobi),
    ] {
        for count in [4, 16] {
            group.bench_with_input(BenchmarkId::new(name, count), &count, |b, &count| {
                b.iter_batched(
                    || resting_row(count, variant),
                    |mut world| {
                        for _ in 0..10 {
                            world.step(0.01).unwrap();
                        }
                        black_box(world.time())
                    },
                    criterion::BatchSize::SmallInput,
                );
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_tree_refit,
    bench_tree_pairs,
    bench_raycast,
    bench_step
);
criterion_main!(benches);
