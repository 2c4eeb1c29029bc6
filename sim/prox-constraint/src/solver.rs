//! Proximal-point contact solver.
//!
//! # Algorithm
//!
//! Starting from `λ⁰` (the previous step's impulses when warm starting, zero
//! otherwise) and `w⁰ = (J M⁻¹)ᵀ λ⁰`, each iteration produces a trial
//! iterate with one Gauss-Seidel or Jacobi sweep and measures
//!
//! ```text
//! residual = ‖λ_accepted - λ_trial‖∞
//! ```
//!
//! - residual < absolute tolerance: accept, converged (absolute)
//! - |residual - previous| < relative tolerance × previous: accept, converged (relative)
//! - residual > previous: reject the trial, shrink `R` by `ν`, retry
//! - otherwise: accept and continue
//!
//! Rejected trials count as iterations, so every solve stops after at most
//! `max_iterations` sweeps. Accepted residuals are therefore non-increasing.
//!
//! # Example
//!
//! ```
//! use prox_constraint::{ContactSystem, ProximalSolver};
//! use prox_contact::{ContactPoint, MaterialTable};
//! use prox_types::{BodyId, MassProperties, Pose, RigidBody, WorldConfig};
//! use nalgebra::{Point3, Vector3};
//!
//! let bodies = vec![
//!     RigidBody::fixed(BodyId::new(0), Pose::identity()),
//!     RigidBody::new(
//!         BodyId::new(1),
//!         Pose::from_position(Point3::new(0.0, 0.0, 0.5)),
//!         MassProperties::sphere(1.0, 0.5),
//!     ),
//! ];
//! let contact = ContactPoint::new(Point3::origin(), Vector3::z(), 0.0, BodyId::new(0), BodyId::new(1));
//! let config = WorldConfig::default();
//! let system = ContactSystem::build(&[contact], &bodies, &MaterialTable::new(1), &config, 0.01, 0.0).unwrap();
//!
//! let mut solver = ProximalSolver::new(config.solver);
//! let result = solver.solve(&system).unwrap();
//! assert!(result.stats.converged);
//! assert!(result.impulses[0][0] > 0.0);
//! ```

use prox_linalg::{BlockVector, ContactVector};
use prox_types::{Result, SolverConfig, SolverVariant};
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::assembly::ContactSystem;
use crate::rfactor::RFactors;
use crate::subsolver::SubSolvers;
use crate::{gauss_seidel, jacobi};

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Convergence {
    /// The impulse change dropped below the absolute tolerance.
    Absolute,
    /// The impulse change stopped changing, relative to its previous value.
    Relative,
    /// The iteration budget ran out.
    #[default]
    MaxIterations,
}

/// Diagnostics of one solve.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolveStats {
    /// Sweeps performed, rejected ones included.
    pub iterations: usize,
    /// Residual of the last accepted iteration.
    pub residual: f64,
    /// Whether either tolerance was met.
    pub converged: bool,
    /// Which criterion ended the solve.
    pub convergence: Convergence,
    /// Rejected (diverging) iterations.
    pub divergences: usize,
    /// Whether the initial impulses came from the previous solve.
    pub warm_started: bool,
    /// Residual of every accepted iteration, when tracking is enabled.
    pub residual_history: Option<Vec<f64>>,
}

impl SolveStats {
    fn empty(track: bool) -> Self {
        Self {
            converged: true,
            convergence: Convergence::Absolute,
            residual_history: track.then(Vec::new),
            ..Default::default()
        }
    }
}

/// Output of one solve.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Contact impulses `(λn, λs, λt, λτ)` per contact.
    pub impulses: BlockVector<4>,
    /// Velocity change `(J M⁻¹)ᵀ λ` per body.
    pub velocity_change: BlockVector<6>,
    /// Diagnostics.
    pub stats: SolveStats,
}

/// Impulses and their velocity correction, kept consistent.
#[derive(Debug, Clone)]
pub(crate) struct Iterate {
    pub(crate) lambda: BlockVector<4>,
    pub(crate) w: BlockVector<6>,
}

/// Run the accept/reject loop with a caller-provided sweep.
///
/// `sweep` maps the accepted iterate to a trial iterate under the current
/// step sizes. On return `accepted` holds the last accepted iterate.
pub(crate) fn iterate<F>(
    config: &SolverConfig,
    r: &mut RFactors,
    accepted: &mut Iterate,
    mut sweep: F,
) -> Result<SolveStats>
where
    F: FnMut(&RFactors, &Iterate, &mut Iterate) -> Result<()>,
{
    let mut trial = accepted.clone();
    let mut stats = SolveStats {
        residual_history: config.track_convergence.then(Vec::new),
        ..Default::default()
    };
    let mut previous = f64::INFINITY;

    while stats.iterations < config.max_iterations {
        stats.iterations += 1;
        sweep(r, accepted, &mut trial)?;
        let residual = accepted.lambda.inf_norm_of_difference(&trial.lambda)?;

        // Also rejects NaN.
        if !(residual <= previous) {
            stats.divergences += 1;
            trace!(
                iteration = stats.iterations,
                residual,
                previous,
                "diverging, shrinking step sizes"
            );
            r.shrink();
            continue;
        }

        std::mem::swap(accepted, &mut trial);
        stats.residual = residual;
        if let Some(history) = stats.residual_history.as_mut() {
            history.push(residual);
        }

        if residual < config.absolute_tolerance {
            stats.convergence = Convergence::Absolute;
            stats.converged = true;
            break;
        }
        if (residual - previous).abs() < config.relative_tolerance * previous {
            stats.convergence = Convergence::Relative;
            stats.converged = true;
            break;
        }
        previous = residual;
    }

    if stats.iterations > 0 && !stats.converged && previous.is_infinite() {
        // Nothing was ever accepted.
        stats.residual = f64::INFINITY;
    }
    Ok(stats)
}

/// Gauss-Seidel or Jacobi proximal solver with warm starting.
#[derive(Debug, Clone, Default)]
pub struct ProximalSolver {
    config: SolverConfig,
    warm_start: Vec<ContactVector>,
    last_stats: SolveStats,
}

impl ProximalSolver {
    /// Create a solver.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            warm_start: Vec::new(),
            last_stats: SolveStats::default(),
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replace the configuration; takes effect on the next solve.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    /// Statistics of the last solve.
    #[must_use]
    pub fn last_stats(&self) -> &SolveStats {
        &self.last_stats
    }

    /// Impulses kept for warm starting, indexed by contact.
    #[must_use]
    pub fn warm_start(&self) -> &[ContactVector] {
        &self.warm_start
    }

    /// Forget the impulses of the previous solve.
    pub fn clear_warm_start(&mut self) {
        self.warm_start.clear();
    }

    /// Solve for the contact impulses of `system`.
    pub fn solve(&mut self, system: &ContactSystem) -> Result<SolveResult> {
        self.config.validate()?;
        let n = system.len();
        if n == 0 {
            self.warm_start.clear();
            self.last_stats = SolveStats::empty(self.config.track_convergence);
            return Ok(SolveResult {
                impulses: BlockVector::zeros(0),
                velocity_change: BlockVector::zeros(system.bodies()),
                stats: self.last_stats.clone(),
            });
        }

        let warm_started = self.config.warm_starting && !self.warm_start.is_empty();
        let lambda = if warm_started {
            BlockVector::from_blocks(
                (0..n)
                    .map(|k| self.warm_start.get(k).copied().unwrap_or_else(ContactVector::zeros))
                    .collect(),
            )
        } else {
            BlockVector::zeros(n)
        };
        let w = system.velocity_change(&lambda)?;
        let mut accepted = Iterate { lambda, w };

        let mut r = RFactors::for_strategy(
            self.config.r_factor,
            system,
            self.config.r_factor_scale,
            self.config.nu,
        )?;
        let subsolvers = SubSolvers {
            normal: self.config.normal_solver,
            friction: self.config.friction_solver,
        };

        let mut stats = match self.config.variant {
            SolverVariant::GaussSeidel => {
                iterate(&self.config, &mut r, &mut accepted, |r, from, to| {
                    to.lambda.copy_from(&from.lambda)?;
                    to.w.copy_from(&from.w)?;
                    gauss_seidel::sweep(system, r, &subsolvers, &mut to.lambda, &mut to.w);
                    Ok(())
                })?
            }
            SolverVariant::Jacobi => {
                let parallel = self.config.parallel;
                iterate(&self.config, &mut r, &mut accepted, |r, from, to| {
                    jacobi_sweep(parallel, system, r, &subsolvers, from, to)
                })?
            }
        };
        stats.warm_started = warm_started;

        debug!(
            contacts = n,
            variant = ?self.config.variant,
            iterations = stats.iterations,
            residual = stats.residual,
            converged = stats.converged,
            divergences = stats.divergences,
            "proximal solve finished"
        );

        self.warm_start.clear();
        if self.config.warm_starting {
            self.warm_start.extend(accepted.lambda.iter().copied());
        }
        self.last_stats = stats.clone();

        Ok(SolveResult {
            impulses: accepted.lambda,
            velocity_change: accepted.w,
            stats,
        })
    }
}

#[cfg(feature = "parallel")]
fn jacobi_sweep(
    parallel: bool,
    system: &ContactSystem,
    r: &RFactors,
    subsolvers: &SubSolvers,
    from: &Iterate,
    to: &mut Iterate,
) -> Result<()> {
    let input = (&from.lambda, &from.w);
    let output = (&mut to.lambda, &mut to.w);
    if parallel {
        crate::parallel::sweep(system, r, subsolvers, input, output)
    } else {
        jacobi::sweep(system, r, subsolvers, input, output)
    }
}

#[cfg(not(feature = "parallel"))]
fn jacobi_sweep(
    _parallel: bool,
    system: &ContactSystem,
    r: &RFactors,
    subsolvers: &SubSolvers,
    from: &Iterate,
    to: &mut Iterate,
) -> Result<()> {
    jacobi::sweep(
        system,
        r,
        subsolvers,
        (&from.lambda, &from.w),
        (&mut to.lambda, &mut to.w),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3, Vector4};
    use prox_contact::{ContactPoint, MaterialTable};
    use prox_types::{
        BodyId, FrictionSolver, MassProperties, Pose, RFactorStrategy, RigidBody, Twist,
        WorldConfig,
    };

    /// Unit box resting on a fixed ground, touching at its four bottom corners.
    fn resting_box(twist: Twist) -> (Vec<RigidBody>, Vec<ContactPoint>) {
        let bodies = vec![
            RigidBody::fixed(BodyId::new(0), Pose::identity()),
            RigidBody::new(
                BodyId::new(1),
                Pose::from_position(Point3::new(0.0, 0.0, 0.5)),
                MassProperties::box_shape(1.0, Vector3::new(0.5, 0.5, 0.5)),
            )
            .with_twist(twist),
        ];
        let contacts = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)]
            .into_iter()
            .map(|(x, y)| {
                ContactPoint::new(
                    Point3::new(x, y, 0.0),
                    Vector3::z(),
                    0.0,
                    BodyId::new(0),
                    BodyId::new(1),
                )
            })
            .collect();
        (bodies, contacts)
    }

    fn system(twist: Twist, materials: &MaterialTable) -> ContactSystem {
        let (bodies, contacts) = resting_box(twist);
        ContactSystem::build(&contacts, &bodies, materials, &WorldConfig::default(), 0.01, 0.0)
            .unwrap()
    }

    fn post_velocities(system: &ContactSystem, w: &BlockVector<6>) -> Vec<ContactVector> {
        (0..system.len()).map(|k| system.contact_velocity(k, w)).collect()
    }

    #[test]
    fn test_resting_contact_stops_normal_motion() {
        let system = system(Twist::zero(), &MaterialTable::new(1));
        for variant in [SolverVariant::GaussSeidel, SolverVariant::Jacobi] {
            let config = SolverConfig::high_accuracy().with_variant(variant);
            let mut solver = ProximalSolver::new(config);
            let result = solver.solve(&system).unwrap();
            assert!(result.stats.converged, "{variant:?} did not converge");

            let total: f64 = result.impulses.iter().map(|l| l[0]).sum();
            // The four normal impulses cancel one step of gravity on a unit mass.
            assert_relative_eq!(total, 9.81 * 0.01, epsilon = 1e-6);
            for v in post_velocities(&system, &result.velocity_change) {
                assert!(v[0] > -1e-6);
            }
        }
    }

    #[test]
    fn test_sliding_friction_saturates() {
        let mut materials = MaterialTable::new(1);
        materials.set_friction(0, 0, 0.2).unwrap();
        let system = system(
            Twist::new(Vector3::new(5.0, 0.0, 0.0), Vector3::zeros()),
            &materials,
        );
        let mut solver = ProximalSolver::new(SolverConfig::high_accuracy());
        let result = solver.solve(&system).unwrap();

        let normal: f64 = result.impulses.iter().map(|l| l[0]).sum();
        let tangential: Vector3<f64> = result
            .impulses
            .iter()
            .zip(&system.frames)
            .map(|(l, f)| f.s * l[1] + f.t * l[2])
            .sum();
        // Still sliding: friction sits on the cone and opposes the motion.
        assert!(tangential.x < 0.0);
        assert_relative_eq!(tangential.norm(), 0.2 * normal, epsilon = 1e-6);
    }

    #[test]
    fn test_variants_agree() {
        let mut materials = MaterialTable::new(1);
        materials.set_anisotropic_friction(0, 0, 0.6, 0.3, 0.05).unwrap();
        // Slow enough that friction brings every contact to rest.
        let system = system(
            Twist::new(Vector3::new(0.02, -0.01, -0.3), Vector3::new(0.0, 0.0, 0.1)),
            &materials,
        );
        let solve = |variant| {
            let mut solver = ProximalSolver::new(
                SolverConfig::high_accuracy()
                    .with_variant(variant)
                    .with_max_iterations(5000),
            );
            solver.solve(&system).unwrap()
        };
        let gs = solve(SolverVariant::GaussSeidel);
        let jacobi = solve(SolverVariant::Jacobi);
        assert!(gs.stats.converged && jacobi.stats.converged);
        // Impulses may split differently between redundant contacts; velocities may not.
        for (a, b) in gs.velocity_change.iter().zip(jacobi.velocity_change.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_accepted_residuals_never_increase() {
        let system = system(
            Twist::new(Vector3::new(1.0, 0.5, -1.0), Vector3::new(0.3, 0.0, 1.0)),
            &MaterialTable::new(1),
        );
        for (variant, strategy) in [
            (SolverVariant::GaussSeidel, RFactorStrategy::Local),
            (SolverVariant::Jacobi, RFactorStrategy::Local),
            (SolverVariant::Jacobi, RFactorStrategy::Global),
        ] {
            let config = SolverConfig::default()
                .with_variant(variant)
                .with_r_factor(strategy)
                .with_convergence_tracking();
            let result = ProximalSolver::new(config).solve(&system).unwrap();
            let history = result.stats.residual_history.unwrap();
            assert!(!history.is_empty());
            assert!(history.windows(2).all(|w| w[1] <= w[0]));
            assert!(result.stats.iterations <= config.max_iterations);
        }
    }

    #[test]
    fn test_warm_start_reuses_impulses() {
        let system = system(Twist::zero(), &MaterialTable::new(1));
        let mut solver = ProximalSolver::new(SolverConfig::default());
        let cold = solver.solve(&system).unwrap();
        assert!(!cold.stats.warm_started);
        assert_eq!(solver.warm_start().len(), 4);

        let warm = solver.solve(&system).unwrap();
        assert!(warm.stats.warm_started);
        assert!(warm.stats.iterations <= cold.stats.iterations);

        solver.clear_warm_start();
        assert!(!solver.solve(&system).unwrap().stats.warm_started);
    }

    #[test]
    fn test_frictionless_solver_ignores_tangents() {
        let system = system(
            Twist::new(Vector3::new(3.0, 0.0, -1.0), Vector3::zeros()),
            &MaterialTable::new(1),
        );
        let config = SolverConfig::default().with_friction_solver(FrictionSolver::None);
        let result = ProximalSolver::new(config).solve(&system).unwrap();
        for l in result.impulses.iter() {
            assert_eq!((l[1], l[2], l[3]), (0.0, 0.0, 0.0));
        }
    }

    #[test]
    fn test_empty_system() {
        let (bodies, _) = resting_box(Twist::zero());
        let system = ContactSystem::build(
            &[],
            &bodies,
            &MaterialTable::new(1),
            &WorldConfig::default(),
            0.01,
            0.0,
        )
        .unwrap();
        let result = ProximalSolver::default().solve(&system).unwrap();
        assert!(result.impulses.is_empty());
        assert_eq!(result.velocity_change.len(), 2);
        assert_eq!(result.stats.iterations, 0);
        assert!(result.stats.converged);
    }

    #[test]
    fn test_divergence_rolls_back_and_shrinks() {
        // Scalar fixed point λ* = 1 with the update λ' = λ - r (λ - 1); r > 2 diverges.
        let config = SolverConfig::default().with_convergence_tracking();
        let mut r = RFactors::from_values(BlockVector::from_blocks(vec![Vector4::repeat(3.0)]), 0.6);
        let mut accepted = Iterate {
            lambda: BlockVector::zeros(1),
            w: BlockVector::zeros(0),
        };
        let stats = iterate(&config, &mut r, &mut accepted, |r, from, to| {
            to.lambda[0] = from.lambda[0] - r.get(0).component_mul(&(from.lambda[0] - Vector4::repeat(1.0)));
            Ok(())
        })
        .unwrap();

        // 3.0 overshoots twice (3.0, then 1.8) before 1.08 is accepted.
        assert_eq!(stats.divergences, 2);
        assert!(stats.converged);
        assert_relative_eq!(accepted.lambda[0], Vector4::repeat(1.0), epsilon = 1e-6);
        let history = stats.residual_history.unwrap();
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(stats.iterations, history.len() + stats.divergences);
    }

    #[test]
    fn test_iteration_budget_is_respected() {
        let config = SolverConfig::default().with_max_iterations(7);
        let mut r = RFactors::from_values(BlockVector::from_blocks(vec![Vector4::repeat(1.0)]), 0.9);
        let mut accepted = Iterate {
            lambda: BlockVector::zeros(1),
            w: BlockVector::zeros(0),
        };
        // Halves the distance to 1 every sweep: too slow for either tolerance.
        let stats = iterate(&config, &mut r, &mut accepted, |_, from, to| {
            to.lambda[0] = from.lambda[0] + (Vector4::repeat(1.0) - from.lambda[0]) * 0.5;
            Ok(())
        })
        .unwrap();
        assert_eq!(stats.iterations, 7);
        assert_eq!(stats.divergences, 0);
        assert!(!stats.converged);
        assert_eq!(stats.convergence, Convergence::MaxIterations);
        assert_relative_eq!(accepted.lambda[0], Vector4::repeat(1.0 - 0.5_f64.powi(7)), epsilon = 1e-12);
        assert_relative_eq!(stats.residual, 0.5_f64.powi(7), epsilon = 1e-12);
    }
}
