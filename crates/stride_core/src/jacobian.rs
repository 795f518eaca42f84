//! Sparse Jacobian assembly.
//!
//! Every Jacobian handed between splines, models and constraints is a
//! [`CsrMatrix`]. Blocks are accumulated in coordinate form, where duplicate
//! entries sum on conversion; that is what makes additive contributions (e.g.
//! two chain-rule paths into the same duration column) safe by construction.

use nalgebra::{DMatrix, Matrix3};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

pub type Jacobian = CsrMatrix<f64>;

/// All-zero Jacobian with no stored entries.
pub fn zeros(nrows: usize, ncols: usize) -> Jacobian {
    CsrMatrix::zeros(nrows, ncols)
}

/// Dense copy of a sparse Jacobian, mostly for diagnostics and tests.
pub fn to_dense(jac: &Jacobian) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(jac.nrows(), jac.ncols());
    for (i, j, v) in jac.triplet_iter() {
        dense[(i, j)] += *v;
    }
    dense
}

/// Accumulates sparse contributions into a fixed-shape Jacobian.
#[derive(Debug, Clone)]
pub struct JacobianBuilder {
    coo: CooMatrix<f64>,
}

impl JacobianBuilder {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            coo: CooMatrix::new(nrows, ncols),
        }
    }

    /// Starts from the entries already present in `jac`.
    pub fn from_existing(jac: &Jacobian) -> Self {
        let mut builder = Self::new(jac.nrows(), jac.ncols());
        builder.add_block(0, jac, 1.0);
        builder
    }

    pub fn nrows(&self) -> usize {
        self.coo.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.coo.ncols()
    }

    /// Adds `value` at `(row, col)`. Panics if out of bounds.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.coo.push(row, col, value);
        }
    }

    /// Adds `scale * block` with its first row placed at `row_offset`.
    pub fn add_block(&mut self, row_offset: usize, block: &Jacobian, scale: f64) {
        assert_eq!(
            block.ncols(),
            self.ncols(),
            "Jacobian block has {} columns, target has {}",
            block.ncols(),
            self.ncols()
        );
        for (i, j, v) in block.triplet_iter() {
            self.add(row_offset + i, j, scale * v);
        }
    }

    /// Places `block` with its top-left entry at `(row_offset, col_offset)`.
    pub fn add_submatrix(&mut self, row_offset: usize, col_offset: usize, block: &Jacobian) {
        assert!(
            row_offset + block.nrows() <= self.nrows()
                && col_offset + block.ncols() <= self.ncols(),
            "Jacobian block does not fit at ({row_offset}, {col_offset})"
        );
        for (i, j, v) in block.triplet_iter() {
            self.add(row_offset + i, col_offset + j, *v);
        }
    }

    /// Adds `m * block` for a 3-row `block`, placed at `row_offset`.
    pub fn add_product(&mut self, row_offset: usize, m: &Matrix3<f64>, block: &Jacobian) {
        assert_eq!(block.nrows(), 3, "expected a 3-row Jacobian");
        assert_eq!(
            block.ncols(),
            self.ncols(),
            "Jacobian block has {} columns, target has {}",
            block.ncols(),
            self.ncols()
        );
        for (i, j, v) in block.triplet_iter() {
            for r in 0..3 {
                self.add(row_offset + r, j, m[(r, i)] * v);
            }
        }
    }

    pub fn build(self) -> Jacobian {
        CsrMatrix::from(&self.coo)
    }
}
