use rand::Rng;

use crate::dtype::Element;
use crate::error::{MemoryError, Result};
use crate::shape::Shape;

/// A dense row-major matrix in plain host memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T: Element> {
    data: Vec<T>,
    shape: Shape,
}

impl<T: Element> Matrix<T> {
    /// Wrap row-major `data` with the given shape.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(MemoryError::LengthMismatch {
                len: data.len(),
                rows,
                cols,
            });
        }
        Ok(Matrix {
            data,
            shape: Shape::new(rows, cols),
        })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![T::zero(); rows * cols],
            shape: Shape::new(rows, cols),
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |r, c| if r == c { T::one() } else { T::zero() })
    }

    /// Build a matrix by evaluating `f(row, col)` for every element.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Matrix {
            data,
            shape: Shape::new(rows, cols),
        }
    }

    /// Fill a matrix with values drawn uniformly from `[0, 1)`.
    pub fn random_uniform<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        Self::from_fn(rows, cols, |_, _| T::from_f64(rng.gen::<f64>()))
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    /// # Panics
    /// Panics if `(row, col)` is out of range.
    pub fn get(&self, row: usize, col: usize) -> T {
        assert!(row < self.rows() && col < self.cols(), "index ({row}, {col}) out of range for {}", self.shape);
        self.data[self.shape.offset(row, col)]
    }

    /// # Panics
    /// Panics if `(row, col)` is out of range.
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        assert!(row < self.rows() && col < self.cols(), "index ({row}, {col}) out of range for {}", self.shape);
        let offset = self.shape.offset(row, col);
        self.data[offset] = value;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}
