//! Contact points produced by narrow-phase traversal.

use nalgebra::{Point3, Vector3};
use prox_types::BodyId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::model::{ContactFrame, combined_structure};

/// A single contact between two bodies.
///
/// The normal points from `body_i` towards `body_j`; a positive normal
/// impulse pushes `body_j` along it and `body_i` against it. Contacts are
/// rebuilt every step and never persist.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactPoint {
    /// Contact position in world coordinates.
    pub position: Point3<f64>,
    /// Unit normal from `body_i` towards `body_j`.
    pub normal: Vector3<f64>,
    /// Penetration depth (positive when overlapping).
    pub penetration: f64,
    /// First body.
    pub body_i: BodyId,
    /// Second body.
    pub body_j: BodyId,
    /// World-space structure direction of `body_i`'s material.
    pub structure_a: Vector3<f64>,
    /// World-space structure direction of `body_j`'s material.
    pub structure_b: Vector3<f64>,
    /// Combined tangent-plane structure direction, zero when degenerate.
    pub structure: Vector3<f64>,
    /// True when the normal came from `body_i`'s surface rather than `body_j`'s.
    pub should_flip: bool,
}

impl ContactPoint {
    /// Create a contact with isotropic (zero) structure directions.
    #[must_use]
    pub fn new(
        position: Point3<f64>,
        normal: Vector3<f64>,
        penetration: f64,
        body_i: BodyId,
        body_j: BodyId,
    ) -> Self {
        Self {
            position,
            normal,
            penetration,
            body_i,
            body_j,
            structure_a: Vector3::zeros(),
            structure_b: Vector3::zeros(),
            structure: Vector3::zeros(),
            should_flip: false,
        }
    }

    /// Attach world-space structure directions and resolve the combined one.
    #[must_use]
    pub fn with_structure(mut self, sa: Vector3<f64>, sb: Vector3<f64>) -> Self {
        self.structure_a = sa;
        self.structure_b = sb;
        self.structure = combined_structure(&sa, &sb, &self.normal).unwrap_or_else(Vector3::zeros);
        self
    }

    /// Record which body's surface owns the normal.
    #[must_use]
    pub const fn with_flip(mut self, should_flip: bool) -> Self {
        self.should_flip = should_flip;
        self
    }

    /// Orthonormal contact frame built by the match-stick rule.
    #[must_use]
    pub fn frame(&self) -> ContactFrame {
        ContactFrame::from_structure(&self.structure_a, &self.structure_b, &self.normal)
    }

    /// Check that the contact is well formed.
    pub fn validate(&self) -> prox_types::Result<()> {
        if self.body_i == self.body_j {
            return Err(prox_types::SimError::invalid_input(format!(
                "contact couples {} with itself",
                self.body_i
            )));
        }
        if !((self.normal.norm() - 1.0).abs() <= 1e-6) {
            return Err(prox_types::SimError::invalid_input(
                "contact normal must be unit length",
            ));
        }
        if !self.position.coords.iter().all(|x| x.is_finite()) || !self.penetration.is_finite() {
            return Err(prox_types::SimError::invalid_input(
                "contact position and penetration must be finite",
            ));
        }
        Ok(())
    }
}
