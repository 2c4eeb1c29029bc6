//! Error types for contact simulation.
//!
//! Only contract violations surface as errors. Numerical edge cases are
//! handled with thresholded fallbacks, and solver non-convergence is reported
//! through solve statistics instead.

use thiserror::Error;

/// Errors that can occur during simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// Invalid body index referenced.
    #[error("invalid body index: {0}")]
    InvalidBodyId(usize),

    /// Invalid material index referenced.
    #[error("invalid material index: {0} (table has {1} materials)")]
    InvalidMaterial(usize, usize),

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties on a body.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Two operands of a block operation disagree on logical dimension.
    #[error("dimension mismatch in {operation}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The operation that detected the mismatch.
        operation: &'static str,
        /// The dimension the operation required.
        expected: usize,
        /// The dimension that was supplied.
        found: usize,
    },

    /// Geometry too degenerate to work with (zero-volume element, coincident points).
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry {
        /// Description of the degeneracy.
        reason: String,
    },

    /// Any other malformed input.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description of the input error.
        reason: String,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create a dimension mismatch error.
    #[must_use]
    pub const fn dimension_mismatch(operation: &'static str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            operation,
            expected,
            found,
        }
    }

    /// Create a degenerate geometry error.
    #[must_use]
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            reason: reason.into(),
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Check if this is a configuration error.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Check if this error reports malformed caller input rather than configuration.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        !self.is_config_error()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::InvalidBodyId(42);
        assert!(err.to_string().contains("42"));

        let err = SimError::dimension_mismatch("mul_vec", 4, 3);
        let msg = err.to_string();
        assert!(msg.contains("mul_vec"));
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("found 3"));

        let err = SimError::InvalidMaterial(7, 2);
        assert!(err.to_string().contains("7"));
    }

    #[test]
    fn test_error_predicates() {
        let err = SimError::invalid_config("bad value");
        assert!(err.is_config_error());
        assert!(!err.is_contract_violation());

        let err = SimError::degenerate("zero volume");
        assert!(err.is_contract_violation());
        assert!(!err.is_config_error());

        let err = SimError::InvalidTimestep(-1.0);
        assert!(err.is_contract_violation());
    }
}
