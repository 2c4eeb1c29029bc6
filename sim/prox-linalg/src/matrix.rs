//! The common interface of the block matrix layouts.

use nalgebra::{DMatrix, SMatrix};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use prox_types::{Result, SimError};

use crate::vector::BlockVector;

/// A matrix stored as `R × C` blocks.
///
/// The three layouts ([`CompressedBlockMatrix`](crate::CompressedBlockMatrix),
/// [`BlockDiagonalMatrix`](crate::BlockDiagonalMatrix) and
/// [`TwoColumnBlockMatrix`](crate::TwoColumnBlockMatrix)) differ only in
/// which blocks they can hold. Products take an `init` flag: when `false` the
/// result is accumulated into `y`, when `true` `y` is zeroed first.
pub trait BlockMatrix<const R: usize, const C: usize> {
    /// Number of block rows.
    fn block_rows(&self) -> usize;

    /// Number of block columns.
    fn block_cols(&self) -> usize;

    /// The stored block at (`row`, `col`), or `None` for a structural zero.
    fn block(&self, row: usize, col: usize) -> Option<&SMatrix<f64, R, C>>;

    /// Visit every stored block in row order.
    fn for_each_block<F>(&self, f: F)
    where
        F: FnMut(usize, usize, &SMatrix<f64, R, C>);

    /// `y (+)= A x`.
    fn mul_vec(&self, x: &BlockVector<C>, y: &mut BlockVector<R>, init: bool) -> Result<()>;

    /// `y (+)= Aᵀ x`.
    fn transpose_mul_vec(&self, x: &BlockVector<R>, y: &mut BlockVector<C>, init: bool)
    -> Result<()>;

    /// Number of stored blocks.
    fn nnz_blocks(&self) -> usize {
        let mut count = 0;
        self.for_each_block(|_, _, _| count += 1);
        count
    }

    /// Scalar-level sparse copy.
    fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.block_rows() * R, self.block_cols() * C);
        self.for_each_block(|row, col, block| {
            for (c, column) in block.column_iter().enumerate() {
                for (r, &value) in column.iter().enumerate() {
                    if value != 0.0 {
                        coo.push(row * R + r, col * C + c, value);
                    }
                }
            }
        });
        CsrMatrix::from(&coo)
    }

    /// Scalar-level dense copy.
    fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.block_rows() * R, self.block_cols() * C);
        self.for_each_block(|row, col, block| {
            let mut view = dense.view_mut((row * R, col * C), (R, C));
            view += block;
        });
        dense
    }
}

/// Check the operand lengths of `y = A x`, sizing `y` is the caller's job.
pub(crate) fn check_product(
    operation: &'static str,
    expected_x: usize,
    x_len: usize,
    expected_y: usize,
    y_len: usize,
) -> Result<()> {
    if x_len != expected_x {
        return Err(SimError::dimension_mismatch(operation, expected_x, x_len));
    }
    if y_len != expected_y {
        return Err(SimError::dimension_mismatch(operation, expected_y, y_len));
    }
    Ok(())
}
