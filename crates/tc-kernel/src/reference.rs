//! Serial reference product and result verification.
//!
//! The dispatcher never checks its own numerics; callers compare against
//! these helpers.

use tc_memory::{Element, Matrix};

/// Naive triple-loop product `a @ b`.
///
/// # Panics
/// Panics if `a.cols() != b.rows()`.
pub fn reference_matmul<T: Element>(a: &Matrix<T>, b: &Matrix<T>) -> Matrix<T> {
    assert_eq!(a.cols(), b.rows(), "reference_matmul: inner dimensions differ");
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    Matrix::from_fn(m, n, |i, j| {
        let mut sum = T::zero();
        for p in 0..k {
            sum = sum + a.get(i, p) * b.get(p, j);
        }
        sum
    })
}

/// Relative error of `actual` against `expected`, `|actual - expected| / |expected|`.
///
/// Falls back to the absolute error when `expected` is zero.
pub fn relative_error<T: Element>(actual: T, expected: T) -> f64 {
    let (actual, expected) = (actual.to_f64(), expected.to_f64());
    let diff = (actual - expected).abs();
    if expected == 0.0 {
        diff
    } else {
        diff / expected.abs()
    }
}

/// Largest element-wise relative error between two matrices of equal shape.
///
/// # Panics
/// Panics if the shapes differ.
pub fn max_relative_error<T: Element>(actual: &Matrix<T>, expected: &Matrix<T>) -> f64 {
    assert_eq!(actual.shape(), expected.shape(), "max_relative_error: shapes differ");
    actual
        .as_slice()
        .iter()
        .zip(expected.as_slice())
        .map(|(&a, &e)| relative_error(a, e))
        .fold(0.0, f64::max)
}

/// Outcome of comparing a result against a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub max_relative_error: f64,
    /// Coordinates whose relative error exceeds the tolerance.
    pub mismatches: Vec<(usize, usize)>,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Compare every element of `actual` with `expected`.
///
/// # Panics
/// Panics if the shapes differ.
pub fn verify<T: Element>(actual: &Matrix<T>, expected: &Matrix<T>, tolerance: f64) -> Verification {
    assert_eq!(actual.shape(), expected.shape(), "verify: shapes differ");
    let mut max_relative_error = 0.0f64;
    let mut mismatches = Vec::new();
    for r in 0..actual.rows() {
        for c in 0..actual.cols() {
            let err = relative_error(actual.get(r, c), expected.get(r, c));
            max_relative_error = max_relative_error.max(err);
            if err > tolerance || err.is_nan() {
                mismatches.push((r, c));
            }
        }
    }
    Verification {
        max_relative_error,
        mismatches,
    }
}
