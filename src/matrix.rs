//! Dense row-major `f64` matrices and the block operations the kernels need.

use rand::Rng;
use std::ops::{Index, IndexMut, Range};

#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn square(order: usize) -> Self {
        Self::zeros(order, order)
    }

    /// Wrap row-major `data`; `None` if the length does not fit the shape.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    /// Entries drawn uniformly from `[0, 1)`
    pub fn random<R: Rng>(rows: usize, cols: usize, rng: &mut R) -> Self {
        let data = (0..rows * cols).map(|_| rng.random::<f64>()).collect();
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Copy of the sub-matrix `rows x cols`
    pub fn block(&self, rows: Range<usize>, cols: Range<usize>) -> Matrix {
        let mut block = Matrix::zeros(rows.len(), cols.len());
        for (dst, r) in rows.enumerate() {
            let src = &self.data[r * self.cols + cols.start..r * self.cols + cols.end];
            block.data[dst * block.cols..(dst + 1) * block.cols].copy_from_slice(src);
        }
        block
    }

    /// Overwrite the region starting at `(row, col)` with `block`.
    pub fn set_block(&mut self, row: usize, col: usize, block: &Matrix) {
        for r in 0..block.rows {
            let dst = (row + r) * self.cols + col;
            self.data[dst..dst + block.cols]
                .copy_from_slice(&block.data[r * block.cols..(r + 1) * block.cols]);
        }
    }

    /// `self += a @ b`
    ///
    /// # Panics
    /// Panics if the shapes do not line up.
    pub fn mul_add(&mut self, a: &Matrix, b: &Matrix) {
        assert_eq!(a.cols, b.rows, "inner dimensions must agree");
        assert_eq!((self.rows, self.cols), (a.rows, b.cols), "output shape mismatch");
        // i-k-j order keeps the inner loop on contiguous rows of `b` and `self`
        for i in 0..a.rows {
            let out = &mut self.data[i * self.cols..(i + 1) * self.cols];
            for k in 0..a.cols {
                let aik = a.data[i * a.cols + k];
                let b_row = &b.data[k * b.cols..(k + 1) * b.cols];
                for (c, &bkj) in out.iter_mut().zip(b_row) {
                    *c += aik * bkj;
                }
            }
        }
    }

    /// Sequential reference product `self @ other`
    pub fn matmul(&self, other: &Matrix) -> Matrix {
        let mut out = Matrix::zeros(self.rows, other.cols);
        out.mul_add(self, other);
        out
    }

    pub fn frobenius_norm(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Sum of all entries, the functional value reported for products
    pub fn checksum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Largest entry-wise absolute difference; infinite on shape mismatch
    pub fn max_abs_diff(&self, other: &Matrix) -> f64 {
        if (self.rows, self.cols) != (other.rows, other.cols) {
            return f64::INFINITY;
        }
        self.data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Within `1e-9 x norm` of `reference`
    pub fn approx_eq(&self, reference: &Matrix) -> bool {
        self.max_abs_diff(reference) <= 1e-9 * reference.frobenius_norm().max(1.0)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        &mut self.data[r * self.cols + c]
    }
}
