//! Time integration of rigid body state.
//!
//! The solver hands back end-of-step velocities `u⁺ = u + dt M⁻¹ f_ext + w`;
//! the integrator stores them and moves the bodies with them:
//!
//! ```text
//! x(t+dt) = x(t) + dt v⁺
//! q(t+dt) = normalize(q(t) + dt/2 ω⁺ ⊗ q(t))
//! ```
//!
//! Angular velocities are in world coordinates, hence the left product.
//! Fixed bodies never move. Scripted bodies ignore the solved velocity and
//! move with the one they were given.
//!
//! # Example
//!
//! ```
//! use prox_core::integrators::{Integrator, SemiImplicitEuler};
//! use prox_types::{BodyId, MassProperties, Pose, RigidBody};
//! use nalgebra::{Point3, Vector6};
//!
//! let mut body = RigidBody::new(
//!     BodyId::new(0),
//!     Pose::from_position(Point3::new(0.0, 0.0, 10.0)),
//!     MassProperties::sphere(1.0, 0.5),
//! );
//! let velocity = Vector6::new(0.0, 0.0, -1.0, 0.0, 0.0, 0.0);
//!
//! SemiImplicitEuler::integrate(&mut body, &velocity, 0.01);
//!
//! assert!(body.pose.position.z < 10.0);
//! assert_eq!(body.twist.linear.z, -1.0);
//! ```

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use prox_linalg::{BlockVector, BodyVector};
use prox_types::{BodyKind, RigidBody, Result, SimError};

/// Advances one body given its end-of-step velocity.
pub trait Integrator {
    /// Store `velocity` (linear, angular) where the body kind allows it and
    /// move the body over `dt`.
    fn integrate(body: &mut RigidBody, velocity: &BodyVector, dt: f64);
}

/// Semi-implicit (symplectic) Euler: positions use the new velocities.
pub struct SemiImplicitEuler;

impl Integrator for SemiImplicitEuler {
    fn integrate(body: &mut RigidBody, velocity: &BodyVector, dt: f64) {
        match body.kind {
            BodyKind::Fixed => return,
            BodyKind::Free => {
                body.twist.linear = velocity.fixed_rows::<3>(0).into_owned();
                body.twist.angular = velocity.fixed_rows::<3>(3).into_owned();
            }
            BodyKind::Scripted => {}
        }
        body.pose.position += body.twist.linear * dt;
        integrate_rotation(&mut body.pose.rotation, &body.twist.angular, dt);
    }
}

/// Integrate every body with `I`.
///
/// `velocities` must hold one block per body; nothing is touched otherwise.
pub fn integrate_bodies<I: Integrator>(
    bodies: &mut [RigidBody],
    velocities: &BlockVector<6>,
    dt: f64,
) -> Result<()> {
    if velocities.len() != bodies.len() {
        return Err(SimError::dimension_mismatch(
            "integrate",
            bodies.len(),
            velocities.len(),
        ));
    }
    for (body, velocity) in bodies.iter_mut().zip(velocities.iter()) {
        I::integrate(body, velocity, dt);
    }
    Ok(())
}

/// First-order quaternion update with a world-frame angular velocity.
fn integrate_rotation(rotation: &mut UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) {
    if omega.norm_squared() < 1e-20 {
        return;
    }
    let q = rotation.into_inner();
    let spin = Quaternion::from_imag(*omega) * q;
    *rotation = UnitQuaternion::new_normalize(q + spin * (0.5 * dt));
}
