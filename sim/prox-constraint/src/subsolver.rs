//! Per-contact proximal update.
//!
//! ```text
//! z    = λ - R ∘ (J_k w + b_k)
//! λn'  = P_normal(z_n)
//! λf'  = P_friction(λn', z_s, z_t, z_τ)
//! ```
//!
//! Both projections are closed-form or bounded-iteration computations.

use nalgebra::Vector3;
use prox_contact::{MatchStickModel, project_friction};
use prox_linalg::ContactVector;
use prox_types::{FrictionSolver, NormalSolver};

/// Project an unconstrained normal impulse.
#[must_use]
pub fn project_normal(solver: NormalSolver, z: f64) -> f64 {
    match solver {
        NormalSolver::NonNegative => z.max(0.0),
        NormalSolver::Clamped { max_impulse } => z.clamp(0.0, max_impulse.max(0.0)),
    }
}

/// Sub-solver selection for one solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSolvers {
    /// Normal impulse projection.
    pub normal: NormalSolver,
    /// Friction impulse projection.
    pub friction: FrictionSolver,
}

impl SubSolvers {
    /// New impulse of one contact.
    ///
    /// `velocity` is `J_k w + b_k`, `r` the contact's step sizes.
    #[must_use]
    pub fn update(
        &self,
        lambda: &ContactVector,
        velocity: &ContactVector,
        r: &ContactVector,
        model: &MatchStickModel,
    ) -> ContactVector {
        let z = lambda - r.component_mul(velocity);
        let normal = project_normal(self.normal, z[0]);
        let friction = project_friction(
            self.friction,
            model,
            normal,
            &Vector3::new(z[1], z[2], z[3]),
        );
        ContactVector::new(normal, friction.x, friction.y, friction.z)
    }
}
