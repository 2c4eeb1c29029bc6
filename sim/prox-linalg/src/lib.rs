//! Block-sparse linear algebra for contact problems.
//!
//! Contact systems are naturally blocked: one 4-row block per contact
//! (normal, two tangents, drilling) and one 6-column block per body (linear
//! and angular velocity). This crate stores and multiplies such systems at
//! block granularity without ever forming a dense matrix:
//!
//! - [`BlockVector`] - Dense sequence of fixed-size blocks
//! - [`CompressedBlockMatrix`] - Row-compressed blocks, append-only construction
//! - [`BlockDiagonalMatrix`] - One block per diagonal position (inverse mass matrices)
//! - [`TwoColumnBlockMatrix`] - Exactly two blocks per row (contact Jacobians)
//! - [`BlockMatrix`] - The shared product and accessor interface
//!
//! Every product checks operand dimensions at the call boundary and returns
//! [`SimError::DimensionMismatch`](prox_types::SimError::DimensionMismatch)
//! instead of coercing. Products accumulate into their output unless `init`
//! is `true`.
//!
//! # Example
//!
//! ```
//! use prox_linalg::{BlockMatrix, BlockVector, TwoColumnBlockMatrix};
//! use nalgebra::{Matrix2, Vector2};
//!
//! let mut j = TwoColumnBlockMatrix::<2, 2>::new(2);
//! j.push_row(0, Matrix2::identity(), 1, -Matrix2::identity()).unwrap();
//!
//! let u = BlockVector::from_blocks(vec![Vector2::new(1.0, 2.0), Vector2::new(0.5, 0.5)]);
//! let mut v = BlockVector::zeros(1);
//! j.mul_vec(&u, &mut v, true).unwrap();
//! assert_eq!(v[0], Vector2::new(0.5, 1.5));
//! ```
//!
//! # Layer 0
//!
//! No physics lives here; the crate depends only on nalgebra and the shared error type.

#![doc(html_root_url = "https://docs.rs/prox-linalg/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn, // Many methods can't be const due to nalgebra
    clippy::missing_errors_doc,   // Every fallible operation fails on dimension mismatch
    clippy::float_cmp,            // Exact zero test when exporting sparse patterns
)]

mod compressed;
mod diagonal;
mod matrix;
mod two_column;
mod vector;

pub use compressed::CompressedBlockMatrix;
pub use diagonal::BlockDiagonalMatrix;
pub use matrix::BlockMatrix;
pub use two_column::TwoColumnBlockMatrix;
pub use vector::{BlockVector, add, sub};

/// Per-contact impulse or velocity block: normal, s, t, drilling.
pub type ContactVector = nalgebra::Vector4<f64>;

/// Per-body generalized velocity block: linear then angular.
pub type BodyVector = nalgebra::Vector6<f64>;

/// One contact row restricted to one body.
pub type JacobianBlock = nalgebra::SMatrix<f64, 4, 6>;

/// Per-body generalized inverse mass.
pub type MassBlock = nalgebra::Matrix6<f64>;
