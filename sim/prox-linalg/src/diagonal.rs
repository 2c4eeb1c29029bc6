//! Block diagonal matrices.

use nalgebra::SMatrix;
use prox_types::{Result, SimError};

use crate::matrix::{BlockMatrix, check_product};
use crate::vector::BlockVector;

/// One block per diagonal position.
///
/// Off-diagonal access through [`get`](Self::get) returns a shared zero block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDiagonalMatrix<const R: usize, const C: usize> {
    blocks: Vec<SMatrix<f64, R, C>>,
    zero: SMatrix<f64, R, C>,
}

impl<const R: usize, const C: usize> BlockDiagonalMatrix<R, C> {
    /// Create an `n × n` block matrix of zero blocks.
    #[must_use]
    pub fn zeros(n: usize) -> Self {
        Self::from_blocks(vec![SMatrix::zeros(); n])
    }

    /// Wrap existing diagonal blocks.
    #[must_use]
    pub fn from_blocks(blocks: Vec<SMatrix<f64, R, C>>) -> Self {
        Self {
            blocks,
            zero: SMatrix::zeros(),
        }
    }

    /// Number of diagonal blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the matrix has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block at (`row`, `col`); the zero block off the diagonal.
    ///
    /// # Panics
    ///
    /// Panics if `row == col` is out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> &SMatrix<f64, R, C> {
        if row == col { &self.blocks[row] } else { &self.zero }
    }

    /// Diagonal block `i`.
    #[must_use]
    pub fn diagonal(&self, i: usize) -> Option<&SMatrix<f64, R, C>> {
        self.blocks.get(i)
    }

    /// Mutable diagonal block `i`.
    pub fn diagonal_mut(&mut self, i: usize) -> Option<&mut SMatrix<f64, R, C>> {
        self.blocks.get_mut(i)
    }

    /// Diagonal blocks as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[SMatrix<f64, R, C>] {
        &self.blocks
    }

    /// `self += other`, block by block.
    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.len() != other.len() {
            return Err(SimError::dimension_mismatch(
                "BlockDiagonalMatrix::add_assign",
                self.len(),
                other.len(),
            ));
        }
        for (a, b) in self.blocks.iter_mut().zip(&other.blocks) {
            *a += b;
        }
        Ok(())
    }

    /// Multiply every block by `alpha`.
    pub fn scale(&mut self, alpha: f64) {
        self.blocks.iter_mut().for_each(|b| *b *= alpha);
    }
}

impl<const R: usize, const C: usize> BlockMatrix<R, C> for BlockDiagonalMatrix<R, C> {
    fn block_rows(&self) -> usize {
        self.blocks.len()
    }

    fn block_cols(&self) -> usize {
        self.blocks.len()
    }

    fn block(&self, row: usize, col: usize) -> Option<&SMatrix<f64, R, C>> {
        if row == col { self.blocks.get(row) } else { None }
    }

    fn for_each_block<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, &SMatrix<f64, R, C>),
    {
        for (i, block) in self.blocks.iter().enumerate() {
            f(i, i, block);
        }
    }

    fn mul_vec(&self, x: &BlockVector<C>, y: &mut BlockVector<R>, init: bool) -> Result<()> {
        check_product(
            "BlockDiagonalMatrix::mul_vec",
            self.len(),
            x.len(),
            self.len(),
            y.len(),
        )?;
        for ((yi, block), xi) in y.iter_mut().zip(&self.blocks).zip(x) {
            if init {
                *yi = block * xi;
            } else {
                *yi += block * xi;
            }
        }
        Ok(())
    }

    fn transpose_mul_vec(
        &self,
        x: &BlockVector<R>,
        y: &mut BlockVector<C>,
        init: bool,
    ) -> Result<()> {
        check_product(
            "BlockDiagonalMatrix::transpose_mul_vec",
            self.len(),
            x.len(),
            self.len(),
            y.len(),
        )?;
        for ((yi, block), xi) in y.iter_mut().zip(&self.blocks).zip(x) {
            if init {
                *yi = block.tr_mul(xi);
            } else {
                *yi += block.tr_mul(xi);
            }
        }
        Ok(())
    }
}
