//! Row-compressed block matrices.

use nalgebra::SMatrix;
use prox_types::{Result, SimError};

use crate::matrix::{BlockMatrix, check_product};
use crate::vector::BlockVector;

/// Compressed sparse row storage at block granularity.
///
/// Rows are built append-only: [`push`](Self::push) blocks into the open row
/// with non-decreasing column indices, then [`finish_row`](Self::finish_row).
/// Products iterate only up to the last row holding a block.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedBlockMatrix<const R: usize, const C: usize> {
    cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<SMatrix<f64, R, C>>,
    top_nonzero_row: usize,
}

impl<const R: usize, const C: usize> CompressedBlockMatrix<R, C> {
    /// Create an empty matrix with `cols` block columns and no rows.
    #[must_use]
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            row_ptr: vec![0],
            col_idx: Vec::new(),
            values: Vec::new(),
            top_nonzero_row: 0,
        }
    }

    /// Create an empty matrix with room for `rows` rows and `nnz` blocks.
    #[must_use]
    pub fn with_capacity(cols: usize, rows: usize, nnz: usize) -> Self {
        let mut row_ptr = Vec::with_capacity(rows + 1);
        row_ptr.push(0);
        Self {
            cols,
            row_ptr,
            col_idx: Vec::with_capacity(nnz),
            values: Vec::with_capacity(nnz),
            top_nonzero_row: 0,
        }
    }

    /// Append a block to the open row.
    pub fn push(&mut self, col: usize, block: SMatrix<f64, R, C>) -> Result<()> {
        if col >= self.cols {
            return Err(SimError::invalid_input(format!(
                "block column {col} out of range for {} columns",
                self.cols
            )));
        }
        let row_start = self.row_ptr[self.row_ptr.len() - 1];
        if let Some(&last) = self.col_idx[row_start..].last() {
            if col < last {
                return Err(SimError::invalid_input(format!(
                    "block column {col} pushed after column {last} in the same row"
                )));
            }
        }
        self.col_idx.push(col);
        self.values.push(block);
        Ok(())
    }

    /// Close the open row and start a new one.
    pub fn finish_row(&mut self) {
        let start = self.row_ptr[self.row_ptr.len() - 1];
        let end = self.values.len();
        self.row_ptr.push(end);
        if end > start {
            self.top_nonzero_row = self.row_ptr.len() - 1;
        }
    }

    /// Number of finished rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    /// One past the last row holding a block.
    #[must_use]
    pub fn top_nonzero_row(&self) -> usize {
        self.top_nonzero_row
    }

    /// Stored blocks of one row as (column, block) pairs.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, &SMatrix<f64, R, C>)> {
        let range = self.row_range(row);
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(&self.values[range])
    }

    /// Stored blocks of one column as (row, block) pairs.
    pub fn column(&self, col: usize) -> impl Iterator<Item = (usize, &SMatrix<f64, R, C>)> {
        (0..self.rows()).filter_map(move |row| {
            self.row(row)
                .find(|&(c, _)| c == col)
                .map(|(_, block)| (row, block))
        })
    }

    /// Multiply every block by `alpha`.
    pub fn scale(&mut self, alpha: f64) {
        self.values.iter_mut().for_each(|b| *b *= alpha);
    }

    /// Block-wise sum with another matrix of the same shape.
    ///
    /// The result's pattern is the union of both patterns.
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.cols != other.cols {
            return Err(SimError::dimension_mismatch(
                "CompressedBlockMatrix::add",
                self.cols,
                other.cols,
            ));
        }
        if self.rows() != other.rows() {
            return Err(SimError::dimension_mismatch(
                "CompressedBlockMatrix::add",
                self.rows(),
                other.rows(),
            ));
        }

        let mut sum = Self::with_capacity(self.cols, self.rows(), self.values.len() + other.values.len());
        for row in 0..self.rows() {
            let mut a = self.row(row).peekable();
            let mut b = other.row(row).peekable();
            loop {
                let next = match (a.peek(), b.peek()) {
                    (Some(&(ca, ba)), Some(&(cb, bb))) => {
                        if ca == cb {
                            a.next();
                            b.next();
                            (ca, ba + bb)
                        } else if ca < cb {
                            a.next();
                            (ca, *ba)
                        } else {
                            b.next();
                            (cb, *bb)
                        }
                    }
                    (Some(&(ca, ba)), None) => {
                        a.next();
                        (ca, *ba)
                    }
                    (None, Some(&(cb, bb))) => {
                        b.next();
                        (cb, *bb)
                    }
                    (None, None) => break,
                };
                sum.push(next.0, next.1)?;
            }
            sum.finish_row();
        }
        Ok(sum)
    }

    fn row_range(&self, row: usize) -> std::ops::Range<usize> {
        self.row_ptr[row]..self.row_ptr[row + 1]
    }
}

impl<const R: usize, const C: usize> BlockMatrix<R, C> for CompressedBlockMatrix<R, C> {
    fn block_rows(&self) -> usize {
        self.rows()
    }

    fn block_cols(&self) -> usize {
        self.cols
    }

    fn block(&self, row: usize, col: usize) -> Option<&SMatrix<f64, R, C>> {
        if row >= self.rows() {
            return None;
        }
        let range = self.row_range(row);
        let offset = self.col_idx[range.clone()].binary_search(&col).ok()?;
        self.values.get(range.start + offset)
    }

    fn for_each_block<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, &SMatrix<f64, R, C>),
    {
        for row in 0..self.top_nonzero_row {
            for (col, block) in self.row(row) {
                f(row, col, block);
            }
        }
    }

    fn mul_vec(&self, x: &BlockVector<C>, y: &mut BlockVector<R>, init: bool) -> Result<()> {
        check_product(
            "CompressedBlockMatrix::mul_vec",
            self.cols,
            x.len(),
            self.rows(),
            y.len(),
        )?;
        if init {
            y.fill_zero();
        }
        for row in 0..self.top_nonzero_row {
            let mut acc = y[row];
            for (col, block) in self.row(row) {
                acc += block * x[col];
            }
            y[row] = acc;
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
            "CompressedBlockMatrix::transpose_mul_vec",
            self.rows(),
            x.len(),
            self.cols,
            y.len(),
        )?;
        if init {
            y.fill_zero();
        }
        for row in 0..self.top_nonzero_row {
            let xr = x[row];
            for (col, block) in self.row(row) {
                y[col] += block.tr_mul(&xr);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2x3, Vector2, Vector3};

    /// 3 block rows (last empty) × 2 block columns.
    fn sample() -> CompressedBlockMatrix<2, 3> {
        let mut m = CompressedBlockMatrix::new(2);
        m.push(0, Matrix2x3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0)).unwrap();
        m.push(1, Matrix2x3::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0)).unwrap();
        m.finish_row();
        m.push(1, Matrix2x3::new(-1.0, 0.0, 2.0, 0.0, 3.0, 0.0)).unwrap();
        m.finish_row();
        m.finish_row();
        m
    }

    fn x() -> BlockVector<3> {
        BlockVector::from_blocks(vec![Vector3::new(1.0, -1.0, 2.0), Vector3::new(0.5, 0.0, 1.0)])
    }

    #[test]
    fn test_structure() {
        let m = sample();
        assert_eq!(m.rows(), 3);
        assert_eq!(m.top_nonzero_row(), 2);
        assert_eq!(m.nnz_blocks(), 3);
        assert!(m.block(0, 1).is_some());
        assert!(m.block(1, 0).is_none());
        assert!(m.block(2, 1).is_none());
        assert_eq!(m.column(1).count(), 2);
        assert_eq!(m.row(1).next().map(|(c, _)| c), Some(1));
    }

    #[test]
    fn test_mul_vec_matches_dense() {
        let m = sample();
        let mut y = BlockVector::<2>::zeros(3);
        m.mul_vec(&x(), &mut y, true).unwrap();
        let expected = m.to_dense() * x().to_dvector();
        assert_relative_eq!(y.to_dvector(), expected, epsilon = 1e-12);
        assert_eq!(y[2], Vector2::zeros());
    }

    #[test]
    fn test_mul_vec_accumulates_without_init() {
        let m = sample();
        let mut y = BlockVector::from_blocks(vec![Vector2::repeat(1.0); 3]);
        m.mul_vec(&x(), &mut y, false).unwrap();
        let expected = m.to_dense() * x().to_dvector() + nalgebra::DVector::repeat(6, 1.0);
        assert_relative_eq!(y.to_dvector(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_transpose_mul_vec_matches_dense() {
        let m = sample();
        let xr = BlockVector::from_blocks(vec![
            Vector2::new(1.0, 2.0),
            Vector2::new(-1.0, 0.5),
            Vector2::new(9.0, 9.0),
        ]);
        let mut y = BlockVector::<3>::zeros(2);
        m.transpose_mul_vec(&xr, &mut y, true).unwrap();
        let expected = m.to_dense().transpose() * xr.to_dvector();
        assert_relative_eq!(y.to_dvector(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_csr_matches_dense() {
        let m = sample();
        let csr = m.to_csr();
        assert_eq!(csr.nrows(), 6);
        assert_eq!(csr.ncols(), 6);
        let dense = m.to_dense();
        for (r, c, v) in csr.triplet_iter() {
            assert_eq!(dense[(r, c)], *v);
        }
    }

    #[test]
    fn test_add_unions_patterns() {
        let a = sample();
        let mut b = CompressedBlockMatrix::new(2);
        b.finish_row();
        b.push(0, Matrix2x3::repeat(1.0)).unwrap();
        b.push(1, Matrix2x3::repeat(1.0)).unwrap();
        b.finish_row();
        b.finish_row();

        let sum = a.add(&b).unwrap();
        assert_eq!(sum.nnz_blocks(), 4);
        assert_relative_eq!(sum.to_dense(), a.to_dense() + b.to_dense(), epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_decreasing_columns() {
        let mut m = CompressedBlockMatrix::<1, 1>::new(4);
        m.push(2, SMatrix::<f64, 1, 1>::new(1.0)).unwrap();
        assert!(m.push(1, SMatrix::<f64, 1, 1>::new(1.0)).is_err());
        assert!(m.push(4, SMatrix::<f64, 1, 1>::new(1.0)).is_err());
        m.push(2, SMatrix::<f64, 1, 1>::new(1.0)).unwrap();
    }

    #[test]
    fn test_dimension_mismatch() {
        let m = sample();
        let mut y = BlockVector::<2>::zeros(2);
        let err = m.mul_vec(&x(), &mut y, true).unwrap_err();
        assert!(matches!(err, SimError::DimensionMismatch { expected: 3, found: 2, .. }));
    }
}
