//! Gauss-Seidel sweep.
//!
//! Contacts are visited in order; each one sees the velocity correction
//! `w` already updated by every contact before it in the same sweep.

use prox_linalg::{BlockVector, ContactVector};

use crate::assembly::ContactSystem;
use crate::rfactor::RFactors;
use crate::subsolver::SubSolvers;

/// One in-place sweep over all contacts.
///
/// `lambda` and `w` must be consistent on entry (`w = (J M⁻¹)ᵀ λ`) and
/// stay consistent on exit.
pub fn sweep(
    system: &ContactSystem,
    r: &RFactors,
    subsolvers: &SubSolvers,
    lambda: &mut BlockVector<4>,
    w: &mut BlockVector<6>,
) {
    for k in 0..system.len() {
        let velocity = system.contact_velocity(k, w);
        let updated = subsolvers.update(&lambda[k], &velocity, r.get(k), &system.models[k]);
        let delta: ContactVector = updated - lambda[k];
        if delta != ContactVector::zeros() {
            system.weighted.transpose_mul_row(k, &delta, w);
            lambda[k] = updated;
        }
    }
}
