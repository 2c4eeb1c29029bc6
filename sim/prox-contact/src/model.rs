//! The match-stick anisotropic friction model.
//!
//! Each material carries a characteristic structure direction (the grain of
//! wood, the lay of brushed metal). At a contact the two bodies' directions
//! are combined into a primary tangent axis `s`, and friction coefficients
//! are given along `s`, along `t = n × s` and about the normal (drilling).
//!
//! # Frame construction
//!
//! ```text
//! Sb ← -Sb            if Sa · Sb < 0
//! s  ← (Sa + Sb) / 2
//! s  ← s - (s · n) n   then normalize
//! t  ← n × s
//! ```
//!
//! When `s` vanishes in the tangent plane an arbitrary orthonormal tangent
//! pair is used instead.

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Below this length a combined structure direction counts as degenerate.
const DEGENERATE_DIRECTION: f64 = 1e-8;

/// Friction and restitution of one material pair.
///
/// # Example
///
/// ```
/// use prox_contact::MatchStickModel;
///
/// let wood = MatchStickModel::anisotropic(0.6, 0.3, 0.05).with_restitution(0.2);
/// assert_eq!(wood.coefficients().x, 0.6);
/// assert!(wood.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchStickModel {
    /// Newton coefficient of restitution in `[0, 1]`.
    pub restitution: f64,
    /// Isotropic friction coefficient, used by the sphere projection.
    pub friction: f64,
    /// Anisotropic coefficients along `s`, along `t` and about the normal.
    pub anisotropic: Vector3<f64>,
}

impl Default for MatchStickModel {
    fn default() -> Self {
        Self::isotropic(0.5)
    }
}

impl MatchStickModel {
    /// Same coefficient along both tangents, no drilling friction.
    #[must_use]
    pub fn isotropic(mu: f64) -> Self {
        Self {
            restitution: 0.0,
            friction: mu,
            anisotropic: Vector3::new(mu, mu, 0.0),
        }
    }

    /// Direction-dependent coefficients; the isotropic coefficient is the tangent mean.
    #[must_use]
    pub fn anisotropic(mu_s: f64, mu_t: f64, mu_drill: f64) -> Self {
        Self {
            restitution: 0.0,
            friction: 0.5 * (mu_s + mu_t),
            anisotropic: Vector3::new(mu_s, mu_t, mu_drill),
        }
    }

    /// No friction at all.
    #[must_use]
    pub fn frictionless() -> Self {
        Self::isotropic(0.0)
    }

    /// Set the restitution coefficient.
    #[must_use]
    pub const fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set the isotropic coefficient.
    #[must_use]
    pub const fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Anisotropic coefficients `(μ_s, μ_t, μ_τ)`.
    #[must_use]
    pub fn coefficients(&self) -> Vector3<f64> {
        self.anisotropic
    }

    /// Validate the coefficients.
    pub fn validate(&self) -> prox_types::Result<()> {
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(prox_types::SimError::invalid_config(
                "restitution must be in [0, 1]",
            ));
        }
        if !(self.friction.is_finite() && self.friction >= 0.0) {
            return Err(prox_types::SimError::invalid_config(
                "friction coefficient must be non-negative and finite",
            ));
        }
        if !self.anisotropic.iter().all(|mu| mu.is_finite() && *mu >= 0.0) {
            return Err(prox_types::SimError::invalid_config(
                "anisotropic coefficients must be non-negative and finite",
            ));
        }
        Ok(())
    }
}

/// Orthonormal contact frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactFrame {
    /// Unit contact normal.
    pub n: Vector3<f64>,
    /// Primary tangent, along the combined structure direction.
    pub s: Vector3<f64>,
    /// Secondary tangent, `n × s`.
    pub t: Vector3<f64>,
}

impl ContactFrame {
    /// Build the frame for world-space structure directions `sa`, `sb` and normal `n`.
    #[must_use]
    pub fn from_structure(sa: &Vector3<f64>, sb: &Vector3<f64>, n: &Vector3<f64>) -> Self {
        combined_structure(sa, sb, n).map_or_else(
            || Self::arbitrary(n),
            |s| Self {
                n: *n,
                s,
                t: n.cross(&s),
            },
        )
    }

    /// Any orthonormal frame with the given normal.
    #[must_use]
    pub fn arbitrary(n: &Vector3<f64>) -> Self {
        let (s, t) = tangent_basis(n);
        Self { n: *n, s, t }
    }

    /// Rows `n`, `s`, `t` as a rotation from world to contact coordinates.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_rows(&[self.n.transpose(), self.s.transpose(), self.t.transpose()])
    }
}

/// Combined structure direction projected into the tangent plane of `n`.
///
/// Returns `None` when it degenerates (isotropic materials, or directions
/// cancelling in the tangent plane).
#[must_use]
pub fn combined_structure(
    sa: &Vector3<f64>,
    sb: &Vector3<f64>,
    n: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let sb = if sa.dot(sb) < 0.0 { -sb } else { *sb };
    let mut s = (sa + sb) * 0.5;
    s -= n * s.dot(n);
    s.try_normalize(DEGENERATE_DIRECTION)
}

/// Two unit vectors spanning the plane orthogonal to `normal`.
#[must_use]
pub fn tangent_basis(normal: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let up = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let t1 = normal.cross(&up).normalize();
    let t2 = normal.cross(&t1).normalize();
    (t1, t2)
}
