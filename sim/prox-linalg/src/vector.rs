//! Dense block vectors.

use std::ops::{Index, IndexMut};

use nalgebra::{DVector, SVector};
use prox_types::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A contiguous sequence of `N`-element blocks, one per logical row.
///
/// All operations move whole blocks; the scalar dimension is `len() * N`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlockVector<const N: usize> {
    blocks: Vec<SVector<f64, N>>,
}

impl<const N: usize> Default for BlockVector<N> {
    fn default() -> Self {
        Self { blocks: Vec::new() }
    }
}

impl<const N: usize> BlockVector<N> {
    /// Create a vector of `len` zero blocks.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            blocks: vec![SVector::zeros(); len],
        }
    }

    /// Wrap existing blocks.
    #[must_use]
    pub fn from_blocks(blocks: Vec<SVector<f64, N>>) -> Self {
        Self { blocks }
    }

    /// Split a scalar vector into blocks.
    pub fn from_dvector(v: &DVector<f64>) -> Result<Self> {
        if v.len() % N != 0 {
            return Err(SimError::dimension_mismatch(
                "BlockVector::from_dvector",
                v.len().div_ceil(N) * N,
                v.len(),
            ));
        }
        let blocks = v
            .as_slice()
            .chunks_exact(N)
            .map(SVector::from_column_slice)
            .collect();
        Ok(Self { blocks })
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the vector has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Scalar dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.blocks.len() * N
    }

    /// Get a block if it exists.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&SVector<f64, N>> {
        self.blocks.get(i)
    }

    /// Blocks as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[SVector<f64, N>] {
        &self.blocks
    }

    /// Blocks as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [SVector<f64, N>] {
        &mut self.blocks
    }

    /// Iterate over blocks.
    pub fn iter(&self) -> std::slice::Iter<'_, SVector<f64, N>> {
        self.blocks.iter()
    }

    /// Iterate mutably over blocks.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, SVector<f64, N>> {
        self.blocks.iter_mut()
    }

    /// Resize to `len` blocks, filling new blocks with zero.
    pub fn resize(&mut self, len: usize) {
        self.blocks.resize(len, SVector::zeros());
    }

    /// Set every block to zero.
    pub fn fill_zero(&mut self) {
        self.blocks.iter_mut().for_each(|b| b.fill(0.0));
    }

    /// Overwrite with the contents of `other`.
    pub fn copy_from(&mut self, other: &Self) -> Result<()> {
        self.check_same_len("BlockVector::copy_from", other)?;
        self.blocks.copy_from_slice(&other.blocks);
        Ok(())
    }

    /// `self += other`.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.check_same_len("BlockVector::add_assign", other)?;
        for (a, b) in self.blocks.iter_mut().zip(&other.blocks) {
            *a += b;
        }
        Ok(())
    }

    /// `self -= other`.
    pub fn sub_assign(&mut self, other: &Self) -> Result<()> {
        self.check_same_len("BlockVector::sub_assign", other)?;
        for (a, b) in self.blocks.iter_mut().zip(&other.blocks) {
            *a -= b;
        }
        Ok(())
    }

    /// `self += alpha * x`.
    pub fn axpy(&mut self, alpha: f64, x: &Self) -> Result<()> {
        self.check_same_len("BlockVector::axpy", x)?;
        for (a, b) in self.blocks.iter_mut().zip(&x.blocks) {
            *a += b * alpha;
        }
        Ok(())
    }

    /// Multiply every block by `alpha`.
    pub fn scale(&mut self, alpha: f64) {
        self.blocks.iter_mut().for_each(|b| *b *= alpha);
    }

    /// Scalar dot product.
    pub fn dot(&self, other: &Self) -> Result<f64> {
        self.check_same_len("BlockVector::dot", other)?;
        Ok(self
            .blocks
            .iter()
            .zip(&other.blocks)
            .map(|(a, b)| a.dot(b))
            .sum())
    }

    /// Largest absolute scalar entry.
    #[must_use]
    pub fn inf_norm(&self) -> f64 {
        self.blocks
            .iter()
            .map(SVector::amax)
            .fold(0.0, f64::max)
    }

    /// Euclidean norm over all scalar entries.
    #[must_use]
    pub fn norm(&self) -> f64 {
        self.blocks
            .iter()
            .map(SVector::norm_squared)
            .sum::<f64>()
            .sqrt()
    }

    /// ∞-norm of `self - other` without allocating.
    pub fn inf_norm_of_difference(&self, other: &Self) -> Result<f64> {
        self.check_same_len("BlockVector::inf_norm_of_difference", other)?;
        Ok(self
            .blocks
            .iter()
            .zip(&other.blocks)
            .map(|(a, b)| (a - b).amax())
            .fold(0.0, f64::max))
    }

    /// Flatten into a scalar vector.
    #[must_use]
    pub fn to_dvector(&self) -> DVector<f64> {
        DVector::from_iterator(self.dim(), self.blocks.iter().flat_map(|b| b.iter().copied()))
    }

    fn check_same_len(&self, operation: &'static str, other: &Self) -> Result<()> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(SimError::dimension_mismatch(
                operation,
                self.len(),
                other.len(),
            ))
        }
    }
}

/// `out = a - b` (or `out += a - b` when `init` is false).
pub fn sub<const N: usize>(
    a: &BlockVector<N>,
    b: &BlockVector<N>,
    out: &mut BlockVector<N>,
    init: bool,
) -> Result<()> {
    a.check_same_len("block_vector::sub", b)?;
    a.check_same_len("block_vector::sub", out)?;
    for ((o, x), y) in out.blocks.iter_mut().zip(&a.blocks).zip(&b.blocks) {
        if init {
            *o = x - y;
        } else {
            *o += x - y;
        }
    }
    Ok(())
}

/// `out = a + b` (or `out += a + b` when `init` is false).
pub fn add<const N: usize>(
    a: &BlockVector<N>,
    b: &BlockVector<N>,
    out: &mut BlockVector<N>,
    init: bool,
) -> Result<()> {
    a.check_same_len("block_vector::add", b)?;
    a.check_same_len("block_vector::add", out)?;
    for ((o, x), y) in out.blocks.iter_mut().zip(&a.blocks).zip(&b.blocks) {
        if init {
            *o = x + y;
        } else {
            *o += x + y;
        }
    }
    Ok(())
}

impl<const N: usize> Index<usize> for BlockVector<N> {
    type Output = SVector<f64, N>;

    fn index(&self, i: usize) -> &Self::Output {
        &self.blocks[i]
    }
}

impl<const N: usize> IndexMut<usize> for BlockVector<N> {
    fn index_mut(&mut self, i: usize) -> &mut Self::Output {
        &mut self.blocks[i]
    }
}

impl<'a, const N: usize> IntoIterator for &'a BlockVector<N> {
    type Item = &'a SVector<f64, N>;
    type IntoIter = std::slice::Iter<'a, SVector<f64, N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    fn sample() -> BlockVector<4> {
        BlockVector::from_blocks(vec![
            Vector4::new(1.0, -2.0, 3.0, 0.5),
            Vector4::new(0.0, 4.0, -5.0, 1.0),
        ])
    }

    #[test]
    fn test_norms() {
        let v = sample();
        assert_eq!(v.len(), 2);
        assert_eq!(v.dim(), 8);
        assert_eq!(v.inf_norm(), 5.0);
        assert_relative_eq!(v.norm(), v.to_dvector().norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_axpy_and_dot() {
        let mut a = sample();
        let b = sample();
        a.axpy(2.0, &b).unwrap();
        assert_relative_eq!(a[0], Vector4::new(3.0, -6.0, 9.0, 1.5), epsilon = 1e-12);
        let dot = b.dot(&b).unwrap();
        assert_relative_eq!(dot, b.norm() * b.norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_sub_respects_init_flag() {
        let a = sample();
        let b = BlockVector::from_blocks(vec![Vector4::repeat(1.0), Vector4::repeat(1.0)]);
        let mut out = BlockVector::from_blocks(vec![Vector4::repeat(10.0), Vector4::repeat(10.0)]);

        sub(&a, &b, &mut out, false).unwrap();
        assert_relative_eq!(out[0], Vector4::new(10.0, 7.0, 12.0, 9.5), epsilon = 1e-12);

        sub(&a, &b, &mut out, true).unwrap();
        assert_relative_eq!(out[0], Vector4::new(0.0, -3.0, 2.0, -0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_inf_norm_of_difference() {
        let a = sample();
        let mut b = sample();
        b[1][2] += 0.25;
        assert_relative_eq!(a.inf_norm_of_difference(&b).unwrap(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let mut a = sample();
        let b = BlockVector::<4>::zeros(3);
        let err = a.add_assign(&b).unwrap_err();
        assert!(matches!(
            err,
            SimError::DimensionMismatch {
                expected: 2,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_dvector_round_trip_rejects_ragged() {
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let blocks = BlockVector::<3>::from_dvector(&v).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks.to_dvector(), v);

        assert!(BlockVector::<4>::from_dvector(&v).is_err());
    }
}
