use std::fmt;

/// A 2D row-major shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    rows: usize,
    cols: usize,
}

impl Shape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Shape { rows, cols }
    }

    /// A single-row shape of `len` elements, used for vectors and tiles.
    pub fn vector(len: usize) -> Self {
        Shape { rows: 1, cols: len }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    /// Row-major strides, `[cols, 1]`.
    pub fn strides(&self) -> [usize; 2] {
        [self.cols, 1]
    }

    /// Flat offset of `(row, col)`. Does not check bounds.
    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.rows, self.cols)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((rows, cols): (usize, usize)) -> Self {
        Shape::new(rows, cols)
    }
}
