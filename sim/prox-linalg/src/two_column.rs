//! Matrices with exactly two column blocks per row.
//!
//! This is the shape of a contact Jacobian: every contact row couples two
//! bodies. A contact against a fixed or scripted body still stores two
//! blocks; the one for the immovable body simply has no effect once it is
//! weighted by a zero inverse mass.

use nalgebra::{SMatrix, SVector};
use prox_types::{Result, SimError};

use crate::diagonal::BlockDiagonalMatrix;
use crate::matrix::{BlockMatrix, check_product};
use crate::vector::BlockVector;

/// Row-major storage of two `(column, block)` pairs per row.
///
/// Within a row the first column index never exceeds the second.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoColumnBlockMatrix<const R: usize, const C: usize> {
    cols: usize,
    col_idx: Vec<[usize; 2]>,
    blocks: Vec<[SMatrix<f64, R, C>; 2]>,
}

impl<const R: usize, const C: usize> TwoColumnBlockMatrix<R, C> {
    /// Create a matrix with no rows and `cols` block columns.
    #[must_use]
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            col_idx: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Create an empty matrix with room for `rows` rows.
    #[must_use]
    pub fn with_capacity(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            col_idx: Vec::with_capacity(rows),
            blocks: Vec::with_capacity(rows),
        }
    }

    /// Append a row coupling columns `a` and `b`.
    ///
    /// The pair is stored in column order whichever order it is given in.
    pub fn push_row(
        &mut self,
        a: usize,
        block_a: SMatrix<f64, R, C>,
        b: usize,
        block_b: SMatrix<f64, R, C>,
    ) -> Result<()> {
        let out_of_range = a.max(b);
        if out_of_range >= self.cols {
            return Err(SimError::invalid_input(format!(
                "block column {out_of_range} out of range for {} columns",
                self.cols
            )));
        }
        if a == b {
            return Err(SimError::invalid_input(format!(
                "two-column row couples column {a} with itself"
            )));
        }
        if a < b {
            self.col_idx.push([a, b]);
            self.blocks.push([block_a, block_b]);
        } else {
            self.col_idx.push([b, a]);
            self.blocks.push([block_b, block_a]);
        }
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.col_idx.len()
    }

    /// Column indices of a row.
    #[must_use]
    pub fn columns(&self, row: usize) -> [usize; 2] {
        self.col_idx[row]
    }

    /// Both (column, block) pairs of a row.
    #[must_use]
    pub fn row(&self, row: usize) -> [(usize, &SMatrix<f64, R, C>); 2] {
        let [c0, c1] = self.col_idx[row];
        let [b0, b1] = &self.blocks[row];
        [(c0, b0), (c1, b1)]
    }

    /// Rows that touch column `col`, with the matching block.
    pub fn column(&self, col: usize) -> impl Iterator<Item = (usize, &SMatrix<f64, R, C>)> {
        self.col_idx
            .iter()
            .zip(&self.blocks)
            .enumerate()
            .filter_map(move |(row, (cols, blocks))| {
                cols.iter()
                    .position(|&c| c == col)
                    .map(|slot| (row, &blocks[slot]))
            })
    }

    /// `A_row x`, the product of one row with a column vector.
    #[must_use]
    pub fn mul_row(&self, row: usize, x: &BlockVector<C>) -> SVector<f64, R> {
        let [c0, c1] = self.col_idx[row];
        let [b0, b1] = &self.blocks[row];
        b0 * x[c0] + b1 * x[c1]
    }

    /// `y (+)= A_rowᵀ xr`, scattering one row's transpose into `y`.
    pub fn transpose_mul_row(&self, row: usize, xr: &SVector<f64, R>, y: &mut BlockVector<C>) {
        let [c0, c1] = self.col_idx[row];
        let [b0, b1] = &self.blocks[row];
        y[c0] += b0.tr_mul(xr);
        y[c1] += b1.tr_mul(xr);
    }

    /// Diagonal of `A_row Bᵀ_row` for a matrix `other` with the same pattern.
    ///
    /// With `self = J M⁻¹` and `other = J` this is the diagonal of the
    /// contact's own Delassus block.
    pub fn row_product_diagonal(&self, other: &Self, row: usize) -> Result<SVector<f64, R>> {
        match (self.col_idx.get(row), other.col_idx.get(row)) {
            (Some(a), Some(b)) if a == b => {}
            _ => {
                return Err(SimError::invalid_input(format!(
                    "row {row} is missing or has different column patterns in the two operands"
                )));
            }
        }
        let mut diag = SVector::<f64, R>::zeros();
        for (a, b) in self.blocks[row].iter().zip(&other.blocks[row]) {
            for r in 0..R {
                diag[r] += a.row(r).dot(&b.row(r));
            }
        }
        Ok(diag)
    }

    /// `A D`, right-multiplication by a square block diagonal matrix.
    pub fn mul_block_diagonal(&self, d: &BlockDiagonalMatrix<C, C>) -> Result<Self> {
        if d.len() != self.cols {
            return Err(SimError::dimension_mismatch(
                "TwoColumnBlockMatrix::mul_block_diagonal",
                self.cols,
                d.len(),
            ));
        }
        let blocks = self
            .col_idx
            .iter()
            .zip(&self.blocks)
            .map(|(&[c0, c1], [b0, b1])| [b0 * d.get(c0, c0), b1 * d.get(c1, c1)])
            .collect();
        Ok(Self {
            cols: self.cols,
            col_idx: self.col_idx.clone(),
            blocks,
        })
    }
}

impl<const R: usize, const C: usize> BlockMatrix<R, C> for TwoColumnBlockMatrix<R, C> {
    fn block_rows(&self) -> usize {
        self.rows()
    }

    fn block_cols(&self) -> usize {
        self.cols
    }

    fn block(&self, row: usize, col: usize) -> Option<&SMatrix<f64, R, C>> {
        let cols = self.col_idx.get(row)?;
        let slot = cols.iter().position(|&c| c == col)?;
        Some(&self.blocks[row][slot])
    }

    fn for_each_block<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, &SMatrix<f64, R, C>),
    {
        for (row, (cols, blocks)) in self.col_idx.iter().zip(&self.blocks).enumerate() {
            f(row, cols[0], &blocks[0]);
            f(row, cols[1], &blocks[1]);
        }
    }

    fn mul_vec(&self, x: &BlockVector<C>, y: &mut BlockVector<R>, init: bool) -> Result<()> {
        check_product(
            "TwoColumnBlockMatrix::mul_vec",
            self.cols,
            x.len(),
            self.rows(),
            y.len(),
        )?;
        for (row, yi) in y.iter_mut().enumerate() {
            let v = self.mul_row(row, x);
            if init {
                *yi = v;
            } else {
                *yi += v;
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
            "TwoColumnBlockMatrix::transpose_mul_vec",
            self.rows(),
            x.len(),
            self.cols,
            y.len(),
        )?;
        if init {
            y.fill_zero();
        }
        for (row, xr) in x.iter().enumerate() {
            self.transpose_mul_row(row, xr, y);
        }
        Ok(())
    }
}
