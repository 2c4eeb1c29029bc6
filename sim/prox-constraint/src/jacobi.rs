//! Jacobi sweep.
//!
//! Every contact reads the frozen iterate `(λ_in, w_in)` and writes into a
//! separate output buffer, so contacts can be updated in any order.

use prox_linalg::{BlockMatrix, BlockVector};
use prox_types::Result;

use crate::assembly::ContactSystem;
use crate::rfactor::RFactors;
use crate::subsolver::SubSolvers;

/// One sweep from `(lambda_in, w_in)` into `(lambda_out, w_out)`.
pub fn sweep(
    system: &ContactSystem,
    r: &RFactors,
    subsolvers: &SubSolvers,
    (lambda_in, w_in): (&BlockVector<4>, &BlockVector<6>),
    (lambda_out, w_out): (&mut BlockVector<4>, &mut BlockVector<6>),
) -> Result<()> {
    for (k, out) in lambda_out.iter_mut().enumerate() {
        let velocity = system.contact_velocity(k, w_in);
        *out = subsolvers.update(&lambda_in[k], &velocity, r.get(k), &system.models[k]);
    }
    system.weighted.transpose_mul_vec(lambda_out, w_out, true)
}
