//! Step sizes ("R-factors") of the proximal iteration.
//!
//! The per-contact update is `z = λ - R ∘ (J w + b)`; `R` plays the role of
//! a diagonal preconditioner. A step size is at most stable for
//! `R < 2 / A_ii` on the diagonal of the Delassus operator `A = J M⁻¹ Jᵀ`,
//! so both strategies scale the inverse of that diagonal. `R` is computed
//! once per solve and only ever shrinks (by `ν`) when an iteration diverges.

use prox_linalg::{BlockVector, ContactVector};
use prox_types::{RFactorStrategy, Result};

use crate::assembly::ContactSystem;

/// Diagonal entries at or below this are treated as decoupled rows (`R = 0`).
const DECOUPLED_ROW: f64 = 1e-12;

/// A rule turning the Delassus diagonal into step sizes.
pub trait StepSizeStrategy {
    /// Step sizes for every contact row, given the Delassus diagonal blocks.
    fn step_sizes(&self, diagonal: &BlockVector<4>, scale: f64) -> BlockVector<4>;
}

/// `scale / A_ii` for every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStepSize;

/// `scale / max A_ii` for every row.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalStepSize;

fn inverse_or_zero(value: f64, scale: f64) -> f64 {
    if value > DECOUPLED_ROW {
        scale / value
    } else {
        0.0
    }
}

impl StepSizeStrategy for LocalStepSize {
    fn step_sizes(&self, diagonal: &BlockVector<4>, scale: f64) -> BlockVector<4> {
        BlockVector::from_blocks(
            diagonal
                .iter()
                .map(|d| d.map(|a| inverse_or_zero(a, scale)))
                .collect(),
        )
    }
}

impl StepSizeStrategy for GlobalStepSize {
    fn step_sizes(&self, diagonal: &BlockVector<4>, scale: f64) -> BlockVector<4> {
        let largest = diagonal.inf_norm();
        let r = inverse_or_zero(largest, scale);
        BlockVector::from_blocks(
            diagonal
                .iter()
                .map(|d| d.map(|a| if a > DECOUPLED_ROW { r } else { 0.0 }))
                .collect(),
        )
    }
}

/// Delassus diagonal `diag(J M⁻¹ Jᵀ)` block by block.
pub fn delassus_diagonal(system: &ContactSystem) -> Result<BlockVector<4>> {
    let blocks = (0..system.len())
        .map(|k| system.weighted.row_product_diagonal(&system.jacobian, k))
        .collect::<Result<Vec<_>>>()?;
    Ok(BlockVector::from_blocks(blocks))
}

/// Step sizes of one solve, with the shrink factor applied on divergence.
#[derive(Debug, Clone, PartialEq)]
pub struct RFactors {
    values: BlockVector<4>,
    nu: f64,
}

impl RFactors {
    /// Compute step sizes for `system` with an explicit strategy.
    pub fn compute(
        strategy: &dyn StepSizeStrategy,
        system: &ContactSystem,
        scale: f64,
        nu: f64,
    ) -> Result<Self> {
        let diagonal = delassus_diagonal(system)?;
        Ok(Self {
            values: strategy.step_sizes(&diagonal, scale),
            nu,
        })
    }

    /// Compute step sizes for `system` with a configured strategy.
    pub fn for_strategy(
        strategy: RFactorStrategy,
        system: &ContactSystem,
        scale: f64,
        nu: f64,
    ) -> Result<Self> {
        match strategy {
            RFactorStrategy::Local => Self::compute(&LocalStepSize, system, scale, nu),
            RFactorStrategy::Global => Self::compute(&GlobalStepSize, system, scale, nu),
        }
    }

    /// Wrap precomputed step sizes.
    #[must_use]
    pub fn from_values(values: BlockVector<4>, nu: f64) -> Self {
        Self { values, nu }
    }

    /// Step sizes of contact `k`.
    #[must_use]
    pub fn get(&self, k: usize) -> &ContactVector {
        &self.values[k]
    }

    /// All step sizes.
    #[must_use]
    pub fn values(&self) -> &BlockVector<4> {
        &self.values
    }

    /// Multiply every step size by `ν`.
    pub fn shrink(&mut self) {
        self.values.scale(self.nu);
    }
}
