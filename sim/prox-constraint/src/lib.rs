//! Contact constraint assembly and proximal solvers.
//!
//! This crate turns a list of contact points into impulses:
//!
//! - [`ContactSystem`] - Jacobian, mass-weighted Jacobian, inverse mass and right-hand side
//! - [`ProximalSolver`] - Gauss-Seidel or Jacobi proximal-point iteration with warm starting
//! - [`RFactors`] - Per-row step sizes, shrunk on divergence
//! - [`SubSolvers`] - Normal and friction projections applied per contact
//!
//! # Constraint Formulation
//!
//! For every contact `k` with impulse `λ_k = (λn, λs, λt, λτ)`:
//!
//! ```text
//! v   = J (u + dt M⁻¹ f_ext) + J M⁻¹ Jᵀ λ      (contact velocity)
//! λn  ≥ 0,   v_n ≥ 0,   λn v_n = 0             (non-penetration)
//! (λs, λt, λτ) ∈ friction ellipsoid of λn      (match-stick friction)
//! ```
//!
//! The solver iterates `λ ← P(λ - R ∘ v)` until the impulse change stops
//! shrinking; divergence is detected and undone.
//!
//! # Parallelism
//!
//! With the `parallel` feature and [`SolverConfig::parallel`](prox_types::SolverConfig)
//! set, Jacobi sweeps update contacts on the rayon thread pool. The
//! results are identical to the sequential sweep.
//!
//! # Layer 0 Crate
//!
//! No collision detection lives here; contacts arrive fully formed.

#![doc(html_root_url = "https://docs.rs/prox-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,        // Errors are dimension or index violations
    clippy::neg_cmp_op_on_partial_ord, // !(x <= y) also rejects NaN
)]

mod assembly;
mod forces;
mod gauss_seidel;
mod jacobi;
#[cfg(feature = "parallel")]
mod parallel;
mod rfactor;
mod solver;
mod subsolver;

pub use assembly::{
    ContactSystem, assemble_inverse_mass, assemble_jacobian, assemble_velocities, jacobian_block,
};
pub use forces::{body_wrench, external_forces};
pub use rfactor::{GlobalStepSize, LocalStepSize, RFactors, StepSizeStrategy, delassus_diagonal};
pub use solver::{Convergence, ProximalSolver, SolveResult, SolveStats};
pub use subsolver::{SubSolvers, project_normal};

// Re-export types needed to drive the solver
pub use prox_types::{BodyId, SolverConfig};
