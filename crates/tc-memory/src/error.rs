use thiserror::Error;

use crate::tier::MemoryTier;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("{tier} allocation of {requested} bytes exceeds capacity of {available} bytes")]
    Capacity {
        tier: MemoryTier,
        requested: usize,
        available: usize,
    },
    #[error("{tier} memory is not visible to the host")]
    NotHostVisible { tier: MemoryTier },
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("data length {len} does not match shape {rows}x{cols}")]
    LengthMismatch { len: usize, rows: usize, cols: usize },
}

pub type Result<T> = std::result::Result<T, MemoryError>;
