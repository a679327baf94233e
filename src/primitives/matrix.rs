//! Matrix type for 2D numeric data.

use super::Vector;
use serde::{Deserialize, Serialize};

/// A 2D matrix of floating-point values (row-major storage).
///
/// # Examples
///
/// ```
/// use mezcla::primitives::Matrix;
///
/// let m = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).expect("data length matches rows * cols");
/// assert_eq!(m.shape(), (2, 3));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Copy> Matrix<T> {
    /// Creates a new matrix from a vector of data.
    ///
    /// # Errors
    ///
    /// Returns an error if data length doesn't match rows * cols.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self, &'static str> {
        if data.len() != rows * cols {
            return Err("Data length must equal rows * cols");
        }
        Ok(Self { data, rows, cols })
    }

    /// Returns the shape as (rows, cols).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// Gets element at (row, col).
    ///
    /// # Panics
    ///
    /// Panics if indices are out of bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    /// Sets element at (row, col).
    ///
    /// # Panics
    ///
    /// Panics if indices are out of bounds.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.cols + col] = value;
    }

    /// Returns a row as a Vector.
    #[must_use]
    pub fn row(&self, row_idx: usize) -> Vector<T> {
        let start = row_idx * self.cols;
        let end = start + self.cols;
        Vector::from_slice(&self.data[start..end])
    }

    /// Returns a column as a Vector.
    #[must_use]
    pub fn column(&self, col_idx: usize) -> Vector<T> {
        let data: Vec<T> = (0..self.rows)
            .map(|row| self.data[row * self.cols + col_idx])
            .collect();
        Vector::from_vec(data)
    }

    /// Returns the underlying data as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl Matrix<f64> {
    /// Creates a matrix of zeros.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Creates a matrix of ones.
    #[must_use]
    pub fn ones(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![1.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Creates an identity matrix.
    #[must_use]
    pub fn eye(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self {
            data,
            rows: n,
            cols: n,
        }
    }

    /// Transposes the matrix.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let mut data = vec![0.0; self.rows * self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        Self {
            data,
            rows: self.cols,
            cols: self.rows,
        }
    }

    /// Matrix-matrix multiplication.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn matmul(&self, other: &Self) -> Result<Self, &'static str> {
        if self.cols != other.rows {
            return Err("Matrix dimensions don't match for multiplication");
        }

        let mut result = vec![0.0; self.rows * other.cols];
        for i in 0..self.rows {
            for j in 0..other.cols {
                let mut sum = 0.0;
                for k in 0..self.cols {
                    sum += self.get(i, k) * other.get(k, j);
                }
                result[i * other.cols + j] = sum;
            }
        }

        Ok(Self {
            data: result,
            rows: self.rows,
            cols: other.cols,
        })
    }

    /// Applies a function to every element, returning a new matrix.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Adds another matrix element-wise.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn add(&self, other: &Self) -> Result<Self, &'static str> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err("Matrix dimensions must match for addition");
        }

        let data: Vec<f64> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a + b)
            .collect();

        Ok(Self {
            data,
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// Subtracts another matrix element-wise.
    ///
    /// # Errors
    ///
    /// Returns an error if dimensions don't match.
    pub fn sub(&self, other: &Self) -> Result<Self, &'static str> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err("Matrix dimensions must match for subtraction");
        }

        let data: Vec<f64> = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();

        Ok(Self {
            data,
            rows: self.rows,
            cols: self.cols,
        })
    }

    /// Multiplies each element by a scalar.
    #[must_use]
    pub fn mul_scalar(&self, scalar: f64) -> Self {
        Self {
            data: self.data.iter().map(|x| x * scalar).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Copies a contiguous block of columns `[start, start + width)` into a
    /// new matrix.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the column count.
    #[must_use]
    pub fn slice_columns(&self, start: usize, width: usize) -> Self {
        assert!(
            start + width <= self.cols,
            "Column slice out of bounds: {}..{} with {} columns",
            start,
            start + width,
            self.cols
        );
        let mut data = Vec::with_capacity(self.rows * width);
        for i in 0..self.rows {
            let offset = i * self.cols + start;
            data.extend_from_slice(&self.data[offset..offset + width]);
        }
        Self {
            data,
            rows: self.rows,
            cols: width,
        }
    }

    /// Copies a contiguous block of rows `[start, start + count)` into a
    /// new matrix.
    ///
    /// # Panics
    ///
    /// Panics if the range exceeds the row count.
    #[must_use]
    pub fn slice_rows(&self, start: usize, count: usize) -> Self {
        assert!(
            start + count <= self.rows,
            "Row slice out of bounds: {}..{} with {} rows",
            start,
            start + count,
            self.rows
        );
        let data = self.data[start * self.cols..(start + count) * self.cols].to_vec();
        Self {
            data,
            rows: count,
            cols: self.cols,
        }
    }

    /// Concatenates two matrices horizontally (same row count).
    ///
    /// # Errors
    ///
    /// Returns an error if row counts differ.
    pub fn hcat(&self, other: &Self) -> Result<Self, &'static str> {
        if self.rows != other.rows {
            return Err("Matrix row counts must match for horizontal concatenation");
        }
        let cols = self.cols + other.cols;
        let mut data = Vec::with_capacity(self.rows * cols);
        for i in 0..self.rows {
            data.extend_from_slice(&self.data[i * self.cols..(i + 1) * self.cols]);
            data.extend_from_slice(&other.data[i * other.cols..(i + 1) * other.cols]);
        }
        Ok(Self {
            data,
            rows: self.rows,
            cols,
        })
    }

    /// Inverts a square matrix via Gauss-Jordan elimination with partial
    /// pivoting.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrix is not square or is singular.
    pub fn inverse(&self) -> Result<Self, &'static str> {
        if self.rows != self.cols {
            return Err("Matrix must be square for inversion");
        }

        let n = self.rows;
        let mut aug = self.clone();
        let mut inv = Self::eye(n);

        for col in 0..n {
            // Partial pivot: largest magnitude entry on or below the diagonal.
            let mut pivot_row = col;
            let mut pivot_val = aug.get(col, col).abs();
            for row in (col + 1)..n {
                let v = aug.get(row, col).abs();
                if v > pivot_val {
                    pivot_row = row;
                    pivot_val = v;
                }
            }
            if pivot_val < 1e-12 {
                return Err("Matrix is singular");
            }
            if pivot_row != col {
                for j in 0..n {
                    let a = aug.get(col, j);
                    aug.set(col, j, aug.get(pivot_row, j));
                    aug.set(pivot_row, j, a);
                    let b = inv.get(col, j);
                    inv.set(col, j, inv.get(pivot_row, j));
                    inv.set(pivot_row, j, b);
                }
            }

            let pivot = aug.get(col, col);
            for j in 0..n {
                aug.set(col, j, aug.get(col, j) / pivot);
                inv.set(col, j, inv.get(col, j) / pivot);
            }

            for row in 0..n {
                if row == col {
                    continue;
                }
                let factor = aug.get(row, col);
                if factor == 0.0 {
                    continue;
                }
                for j in 0..n {
                    aug.set(row, j, aug.get(row, j) - factor * aug.get(col, j));
                    inv.set(row, j, inv.get(row, j) - factor * inv.get(col, j));
                }
            }
        }

        Ok(inv)
    }
}
