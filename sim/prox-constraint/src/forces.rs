//! External force assembly.
//!
//! Per free body the generalized force is
//!
//! ```text
//! f = m g - c_v m v + Σ callbacks.force
//! τ = -c_ω I ω + Σ callbacks.torque - ω × (I ω)
//! ```
//!
//! The gyroscopic term is subtracted here because the integrator treats the
//! angular velocity update as `ω += dt I⁻¹ τ` in world coordinates. Fixed and
//! scripted bodies receive no force.

use prox_linalg::{BlockVector, BodyVector};
use prox_types::{RigidBody, WorldConfig, Wrench};

/// External wrench on one body, gyroscopic term included.
#[must_use]
pub fn body_wrench(body: &RigidBody, config: &WorldConfig, time: f64) -> Wrench {
    if !body.is_free() {
        return Wrench::zero();
    }
    let mass = body.mass_properties.mass;
    let inertia = body.world_inertia();
    let omega = body.twist.angular;
    let momentum = inertia * omega;

    let mut wrench = Wrench::new(
        config.gravity.force_on_mass(mass) - body.twist.linear * (config.linear_damping * mass),
        -momentum * config.angular_damping,
    );
    wrench += body.callback_wrench(time);
    wrench.torque -= omega.cross(&momentum);
    wrench
}

/// External generalized forces of every body.
#[must_use]
pub fn external_forces(bodies: &[RigidBody], config: &WorldConfig, time: f64) -> BlockVector<6> {
    BlockVector::from_blocks(
        bodies
            .iter()
            .map(|body| {
                let wrench = body_wrench(body, config, time);
                let mut f = BodyVector::zeros();
                f.fixed_rows_mut::<3>(0).copy_from(&wrench.force);
                f.fixed_rows_mut::<3>(3).copy_from(&wrench.torque);
                f
            })
            .collect(),
    )
}
