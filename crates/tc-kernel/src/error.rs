use thiserror::Error;

use tc_memory::MemoryError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("tile size must be greater than zero")]
    ZeroTileSize,
    #[error("inner dimension {inner} is not divisible by tile size {tile}")]
    InnerNotDivisible { inner: usize, tile: usize },
    #[error("result columns {cols} are not divisible by tile size {tile}")]
    ColsNotDivisible { cols: usize, tile: usize },
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    MatmulMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("result buffer has shape {got:?}, expected {expected:?}")]
    ResultShape {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("work-group barrier poisoned by a failed work-item")]
    BarrierPoisoned,
    #[error("work-item panicked on compute unit {unit}, lane {lane}: {message}")]
    WorkItemPanicked {
        unit: usize,
        lane: usize,
        message: String,
    },
    #[error("failed to spawn lane thread: {0}")]
    LaneSpawn(String),
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}

impl KernelError {
    /// Whether the error was detected from the launch configuration alone,
    /// before any work-item ran.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            KernelError::ZeroTileSize
                | KernelError::InnerNotDivisible { .. }
                | KernelError::ColsNotDivisible { .. }
                | KernelError::MatmulMismatch { .. }
                | KernelError::ResultShape { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
