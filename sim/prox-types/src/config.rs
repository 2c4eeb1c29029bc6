//! Configuration types for stepping and contact solving.

use crate::dynamics::Gravity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the simulation step.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldConfig {
    /// Gravity applied to every free body.
    pub gravity: Gravity,
    /// Linear damping coefficient (force = -c m v).
    pub linear_damping: f64,
    /// Angular damping coefficient (torque = -c I ω).
    pub angular_damping: f64,
    /// Requested timesteps larger than this are capped (seconds).
    pub max_timestep: f64,
    /// Fraction of penetration depth corrected per step through the
    /// normal velocity target (0 disables drift correction).
    pub error_reduction: f64,
    /// Contact solver configuration.
    pub solver: SolverConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Gravity::earth(),
            linear_damping: 0.0,
            angular_damping: 0.0,
            max_timestep: 1.0 / 30.0,
            error_reduction: 0.2,
            solver: SolverConfig::default(),
        }
    }
}

impl WorldConfig {
    /// Configuration for real-time use.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            solver: SolverConfig::realtime(),
            ..Default::default()
        }
    }

    /// Configuration for accurate offline simulation.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_timestep: 1.0 / 240.0,
            solver: SolverConfig::high_accuracy(),
            ..Default::default()
        }
    }

    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set linear and angular damping.
    #[must_use]
    pub const fn with_damping(mut self, linear: f64, angular: f64) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Set the drift correction factor.
    #[must_use]
    pub const fn with_error_reduction(mut self, error_reduction: f64) -> Self {
        self.error_reduction = error_reduction;
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.gravity.acceleration.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }
        if !(self.linear_damping >= 0.0 && self.angular_damping >= 0.0) {
            return Err(crate::SimError::invalid_config(
                "damping cannot be negative",
            ));
        }
        if !self.max_timestep.is_finite() || self.max_timestep <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "max_timestep must be positive and finite",
            ));
        }
        if !(0.0..=1.0).contains(&self.error_reduction) {
            return Err(crate::SimError::invalid_config(
                "error_reduction must be between 0 and 1",
            ));
        }
        self.solver.validate()
    }
}

/// Iteration scheme of the proximal solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverVariant {
    /// Sequential sweep, each contact sees the already updated impulses.
    #[default]
    GaussSeidel,
    /// Every contact reads a frozen snapshot of the previous iterate.
    Jacobi,
}

/// How the per-row step sizes (R-factors) are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RFactorStrategy {
    /// Per-row `scale / A_ii` from the contact's own diagonal block.
    #[default]
    Local,
    /// One `scale / max(A_ii)` for every row.
    Global,
}

/// Projection used for the normal impulse.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NormalSolver {
    /// Projection onto the non-negative half-line.
    #[default]
    NonNegative,
    /// Projection onto `[0, max_impulse]`.
    Clamped {
        /// Upper bound on a single normal impulse.
        max_impulse: f64,
    },
}

/// Projection used for the tangential and drilling impulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FrictionSolver {
    /// Closed-form projection onto the anisotropic friction ellipsoid.
    #[default]
    AnalyticalEllipsoid,
    /// Closed-form projection onto the isotropic tangential disk; no drilling friction.
    AnalyticalSphere,
    /// Bounded iterative projection onto the friction ellipsoid.
    Numerical,
    /// Frictionless contacts.
    None,
}

/// Configuration for the proximal contact solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Gauss-Seidel or Jacobi.
    pub variant: SolverVariant,
    /// Hard ceiling on iterations per solve.
    pub max_iterations: usize,
    /// Converged when the ∞-norm of the impulse change drops below this.
    pub absolute_tolerance: f64,
    /// Converged when the residual changes by less than this fraction.
    pub relative_tolerance: f64,
    /// Seed each solve with the previous step's impulses.
    pub warm_starting: bool,
    /// Step size strategy.
    pub r_factor: RFactorStrategy,
    /// Multiplier on the R-factors (valid range (0, 2)).
    pub r_factor_scale: f64,
    /// Factor R is multiplied by whenever an iteration diverges (valid range (0, 1)).
    pub nu: f64,
    /// Normal impulse projection.
    pub normal_solver: NormalSolver,
    /// Friction impulse projection.
    pub friction_solver: FrictionSolver,
    /// Record the residual of every accepted iteration.
    pub track_convergence: bool,
    /// Use the rayon-parallel Jacobi sweep when the `parallel` feature is enabled.
    pub parallel: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            variant: SolverVariant::GaussSeidel,
            max_iterations: 100,
            absolute_tolerance: 1e-6,
            relative_tolerance: 1e-4,
            warm_starting: true,
            r_factor: RFactorStrategy::Local,
            r_factor_scale: 1.0,
            nu: 0.9,
            normal_solver: NormalSolver::NonNegative,
            friction_solver: FrictionSolver::AnalyticalEllipsoid,
            track_convergence: false,
            parallel: false,
        }
    }
}

impl SolverConfig {
    /// High-accuracy configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 500,
            absolute_tolerance: 1e-10,
            relative_tolerance: 1e-8,
            ..Default::default()
        }
    }

    /// Cheap configuration for interactive use.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            max_iterations: 20,
            absolute_tolerance: 1e-4,
            relative_tolerance: 1e-3,
            ..Default::default()
        }
    }

    /// Set the iteration scheme.
    #[must_use]
    pub const fn with_variant(mut self, variant: SolverVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the iteration ceiling.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set absolute and relative tolerances.
    #[must_use]
    pub const fn with_tolerances(mut self, absolute: f64, relative: f64) -> Self {
        self.absolute_tolerance = absolute;
        self.relative_tolerance = relative;
        self
    }

    /// Enable or disable warm starting.
    #[must_use]
    pub const fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    /// Set the R-factor strategy.
    #[must_use]
    pub const fn with_r_factor(mut self, strategy: RFactorStrategy) -> Self {
        self.r_factor = strategy;
        self
    }

    /// Set the normal sub-solver.
    #[must_use]
    pub const fn with_normal_solver(mut self, solver: NormalSolver) -> Self {
        self.normal_solver = solver;
        self
    }

    /// Set the friction sub-solver.
    #[must_use]
    pub const fn with_friction_solver(mut self, solver: FrictionSolver) -> Self {
        self.friction_solver = solver;
        self
    }

    /// Record per-iteration residuals.
    #[must_use]
    pub const fn with_convergence_tracking(mut self) -> Self {
        self.track_convergence = true;
        self
    }

    /// Request the parallel Jacobi sweep.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }
        if !(self.absolute_tolerance >= 0.0 && self.relative_tolerance >= 0.0) {
            return Err(crate::SimError::invalid_config(
                "tolerances cannot be negative",
            ));
        }
        if !(self.r_factor_scale > 0.0 && self.r_factor_scale < 2.0) {
            return Err(crate::SimError::invalid_config(
                "r_factor_scale must be in (0, 2)",
            ));
        }
        if !(self.nu > 0.0 && self.nu < 1.0) {
            return Err(crate::SimError::invalid_config("nu must be in (0, 1)"));
        }
        if let NormalSolver::Clamped { max_impulse } = self.normal_solver {
            if !(max_impulse >= 0.0) {
                return Err(crate::SimError::invalid_config(
                    "clamped normal solver needs a non-negative bound",
                ));
            }
        }
        Ok(())
    }
}
