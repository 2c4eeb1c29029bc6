//! Rayon-parallel Jacobi sweep.
//!
//! Identical to the sequential Jacobi sweep: each contact reads only the
//! frozen input iterate, so splitting the contact loop across threads does
//! not change any result. The final `w = (J M⁻¹)ᵀ λ` scatter stays
//! sequential because contacts sharing a body write to the same block.

use prox_linalg::{BlockMatrix, BlockVector};
use prox_types::Result;
use rayon::prelude::*;

use crate::assembly::ContactSystem;
use crate::rfactor::RFactors;
use crate::subsolver::SubSolvers;

/// Below this many contacts the sweep runs sequentially.
const MIN_PARALLEL_CONTACTS: usize = 64;

/// One sweep from `(lambda_in, w_in)` into `(lambda_out, w_out)`.
pub fn sweep(
    system: &ContactSystem,
    r: &RFactors,
    subsolvers: &SubSolvers,
    (lambda_in, w_in): (&BlockVector<4>, &BlockVector<6>),
    (lambda_out, w_out): (&mut BlockVector<4>, &mut BlockVector<6>),
) -> Result<()> {
    if system.len() < MIN_PARALLEL_CONTACTS {
        return crate::jacobi::sweep(system, r, subsolvers, (lambda_in, w_in), (lambda_out, w_out));
    }
    lambda_out
        .as_mut_slice()
        .par_iter_mut()
        .enumerate()
        .for_each(|(k, out)| {
            let velocity = system.contact_velocity(k, w_in);
            *out = subsolvers.update(&lambda_in[k], &velocity, r.get(k), &system.models[k]);
        });
    system.weighted.transpose_mul_vec(lambda_out, w_out, true)
}
