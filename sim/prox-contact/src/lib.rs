//! Anisotropic contact friction for rigid bodies.
//!
//! This crate describes what happens at a single contact once it has been
//! found:
//!
//! - [`ContactPoint`] - Position, normal, depth and structure directions of a contact
//! - [`MatchStickModel`] - Restitution and direction-dependent friction of a material pair
//! - [`ContactFrame`] - The orthonormal `(n, s, t)` frame built from structure directions
//! - [`MaterialTable`] - Models for every pair of material indices
//! - [`FrictionEllipsoid`] - Closed-form and numerical friction-cone projections
//!
//! # Friction Model
//!
//! Friction is Coulomb-like with one coefficient per contact axis:
//!
//! ```text
//! (λs / μs λn)² + (λt / μt λn)² + (λτ / μτ λn)² ≤ 1
//! ```
//!
//! where `s` follows the materials' combined structure direction, `t = n × s`
//! and `τ` is the drilling (torsional) impulse about the normal.
//!
//! # Example
//!
//! ```
//! use prox_contact::{project_friction, ContactPoint, MatchStickModel};
//! use prox_types::{BodyId, FrictionSolver};
//! use nalgebra::{Point3, Vector3};
//!
//! let contact = ContactPoint::new(
//!     Point3::origin(),
//!     Vector3::z(),
//!     0.001,
//!     BodyId::new(0),
//!     BodyId::new(1),
//! )
//! .with_structure(Vector3::x(), Vector3::x());
//!
//! let frame = contact.frame();
//! assert!((frame.s - Vector3::x()).norm() < 1e-12);
//!
//! let model = MatchStickModel::anisotropic(0.8, 0.2, 0.0);
//! let friction = project_friction(
//!     FrictionSolver::AnalyticalEllipsoid,
//!     &model,
//!     1.0,
//!     &Vector3::new(2.0, 2.0, 0.0),
//! );
//! assert!((friction.x / 0.8).powi(2) + (friction.y / 0.2).powi(2) <= 1.0 + 1e-9);
//! ```
//!
//! # Layer 0
//!
//! No collision detection or solver iteration lives here.

#![doc(html_root_url = "https://docs.rs/prox-contact/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
    clippy::many_single_char_names,    // a, r, t, z mirror the projection formulas
    clippy::neg_cmp_op_on_partial_ord, // !(x >= 0.0) also rejects NaN
)]

mod contact;
mod friction;
mod model;
mod params;
pub mod poly;

pub use contact::ContactPoint;
pub use friction::{FrictionEllipsoid, project_disk, project_friction};
pub use model::{ContactFrame, MatchStickModel, combined_structure, tangent_basis};
pub use params::MaterialTable;
