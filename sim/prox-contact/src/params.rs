//! Per-material-pair contact parameters.
//!
//! Bodies carry a material index; the table maps every unordered pair of
//! indices to a [`MatchStickModel`]. Changes take effect the next time the
//! table is read, i.e. on the next simulation step.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use prox_types::{Result, SimError};

use crate::model::MatchStickModel;

/// Symmetric `n × n` table of friction models.
///
/// # Example
///
/// ```
/// use prox_contact::{MatchStickModel, MaterialTable};
///
/// let mut table = MaterialTable::new(2);
/// table.set_anisotropic_friction(0, 1, 0.8, 0.2, 0.05).unwrap();
///
/// let wood_on_ice = table.get(1, 0).unwrap();
/// assert_eq!(wood_on_ice.anisotropic.x, 0.8);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialTable {
    count: usize,
    models: Vec<MatchStickModel>,
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::new(1)
    }
}

impl MaterialTable {
    /// Table of `count` materials, every pair using the default model.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self::uniform(count, MatchStickModel::default())
    }

    /// Table of `count` materials, every pair using `model`.
    #[must_use]
    pub fn uniform(count: usize, model: MatchStickModel) -> Self {
        Self {
            count,
            models: vec![model; count * count],
        }
    }

    /// Number of materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True for a table without materials.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Model of the pair `(a, b)`; order does not matter.
    pub fn get(&self, a: usize, b: usize) -> Result<&MatchStickModel> {
        let index = self.index(a, b)?;
        Ok(&self.models[index])
    }

    /// Replace the model of the pair `(a, b)`.
    pub fn set(&mut self, a: usize, b: usize, model: MatchStickModel) -> Result<()> {
        model.validate()?;
        self.update(a, b, |m| *m = model)
    }

    /// Isotropic friction for the pair: `μ` along both tangents, no drilling.
    pub fn set_friction(&mut self, a: usize, b: usize, mu: f64) -> Result<()> {
        if !(mu.is_finite() && mu >= 0.0) {
            return Err(SimError::invalid_config(
                "friction coefficient must be non-negative and finite",
            ));
        }
        self.update(a, b, |m| {
            let restitution = m.restitution;
            *m = MatchStickModel::isotropic(mu).with_restitution(restitution);
        })
    }

    /// Direction-dependent friction for the pair.
    pub fn set_anisotropic_friction(
        &mut self,
        a: usize,
        b: usize,
        mu_s: f64,
        mu_t: f64,
        mu_drill: f64,
    ) -> Result<()> {
        let candidate = MatchStickModel::anisotropic(mu_s, mu_t, mu_drill);
        candidate.validate()?;
        self.update(a, b, |m| {
            m.friction = candidate.friction;
            m.anisotropic = candidate.anisotropic;
        })
    }

    /// Restitution for the pair.
    pub fn set_restitution(&mut self, a: usize, b: usize, restitution: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&restitution) {
            return Err(SimError::invalid_config("restitution must be in [0, 1]"));
        }
        self.update(a, b, |m| m.restitution = restitution)
    }

    /// Grow the table to `count` materials; new pairs use the default model.
    pub fn resize(&mut self, count: usize) {
        if count == self.count {
            return;
        }
        let mut models = vec![MatchStickModel::default(); count * count];
        let keep = self.count.min(count);
        for a in 0..keep {
            for b in 0..keep {
                models[a * count + b] = self.models[a * self.count + b];
            }
        }
        self.count = count;
        self.models = models;
    }

    fn index(&self, a: usize, b: usize) -> Result<usize> {
        if a >= self.count {
            return Err(SimError::InvalidMaterial(a, self.count));
        }
        if b >= self.count {
            return Err(SimError::InvalidMaterial(b, self.count));
        }
        Ok(a * self.count + b)
    }

    /// Apply `f` to both `(a, b)` and `(b, a)`.
    fn update<F: Fn(&mut MatchStickModel)>(&mut self, a: usize, b: usize, f: F) -> Result<()> {
        let ab = self.index(a, b)?;
        let ba = self.index(b, a)?;
        f(&mut self.models[ab]);
        f(&mut self.models[ba]);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_symmetric_updates() {
        let mut table = MaterialTable::new(3);
        table.set_friction(0, 2, 0.9).unwrap();
        assert_eq!(table.get(2, 0).unwrap().friction, 0.9);
        assert_eq!(table.get(0, 2).unwrap().anisotropic, Vector3::new(0.9, 0.9, 0.0));
        assert_eq!(table.get(1, 1).unwrap(), &MatchStickModel::default());
    }

    #[test]
    fn test_setters_keep_other_fields() {
        let mut table = MaterialTable::new(2);
        table.set_restitution(0, 1, 0.4).unwrap();
        table.set_anisotropic_friction(1, 0, 0.7, 0.1, 0.02).unwrap();
        let m = table.get(0, 1).unwrap();
        assert_eq!(m.restitution, 0.4);
        assert_eq!(m.anisotropic, Vector3::new(0.7, 0.1, 0.02));

        table.set_friction(0, 1, 0.3).unwrap();
        assert_eq!(table.get(1, 0).unwrap().restitution, 0.4);
    }

    #[test]
    fn test_invalid_indices_and_values() {
        let mut table = MaterialTable::new(2);
        assert_eq!(table.get(2, 0), Err(SimError::InvalidMaterial(2, 2)));
        assert!(table.set_friction(0, 5, 0.5).is_err());
        assert!(table.set_friction(0, 1, -0.5).is_err());
        assert!(table.set_restitution(0, 1, 2.0).is_err());
        assert!(table.set_anisotropic_friction(0, 1, 0.5, f64::NAN, 0.0).is_err());
        // Failed updates leave the table untouched.
        assert_eq!(table, MaterialTable::new(2));
    }

    #[test]
    fn test_resize_preserves_existing_pairs() {
        let mut table = MaterialTable::new(2);
        table.set_friction(0, 1, 0.8).unwrap();
        table.resize(4);
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(1, 0).unwrap().friction, 0.8);
        assert_eq!(table.get(3, 2).unwrap(), &MatchStickModel::default());
    }
}
