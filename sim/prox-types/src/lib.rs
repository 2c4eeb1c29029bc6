//! Core types for proximal contact simulation.
//!
//! This crate provides the shared vocabulary of the contact pipeline:
//!
//! - [`RigidBody`] - Pose, velocity, mass, material and force callbacks of a body
//! - [`BodyId`] - Stable index of a body in the body array
//! - [`ForceCallback`] - Per-step force sources ([`PinToPoint`], [`ConstantForce`])
//! - [`WorldConfig`] and [`SolverConfig`] - Stepping and solver settings
//! - [`SimError`] - Contract violations detected before any state is mutated
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with no engine or rendering dependencies.
//!
//! # Coordinate System
//!
//! - Right-handed
//! - Z: up (default gravity is -Z)
//!
//! # Example
//!
//! ```
//! use prox_types::{BodyId, MassProperties, Pose, RigidBody};
//! use nalgebra::{Point3, Vector3};
//!
//! let body = RigidBody::new(
//!     BodyId::new(0),
//!     Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
//!     MassProperties::box_shape(1.0, Vector3::new(0.5, 0.5, 0.5)),
//! );
//!
//! assert!(body.is_free());
//! assert!(body.validate().is_ok());
//! ```

#![doc(html_root_url = "https://docs.rs/prox-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
    clippy::neg_cmp_op_on_partial_ord, // !(x >= 0.0) also rejects NaN
)]

mod body;
mod config;
mod dynamics;
mod error;

pub use body::{BodyId, BodyKind, MassProperties, Pose, RigidBody, Twist};
pub use config::{
    FrictionSolver, NormalSolver, RFactorStrategy, SolverConfig, SolverVariant, WorldConfig,
};
pub use dynamics::{ConstantForce, ForceCallback, Gravity, PinToPoint, Wrench};
pub use error::SimError;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
