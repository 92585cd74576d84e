use thiserror::Error;

use tc_kernel::KernelError;
use tc_memory::MemoryError;

/// Errors surfaced by the device runtime and dispatcher. None are retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Rejected before submission: tile size, operand shapes, config values.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A scratch, global or work-group size limit of the device was exceeded.
    #[error("capacity error: {0}")]
    Capacity(String),
    /// The dispatch failed while running; no partial result is returned.
    #[error("dispatch failure: {0}")]
    DispatchFailure(String),
    #[error("memory error: {0}")]
    Memory(MemoryError),
}

impl From<MemoryError> for RuntimeError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Capacity { .. } => RuntimeError::Capacity(err.to_string()),
            other => RuntimeError::Memory(other),
        }
    }
}

impl From<KernelError> for RuntimeError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Memory(inner) => inner.into(),
            err if err.is_configuration() => RuntimeError::Configuration(err.to_string()),
            err => RuntimeError::DispatchFailure(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tc_memory::MemoryTier;

    #[test]
    fn test_kernel_error_mapping() {
        let err: RuntimeError = KernelError::InnerNotDivisible { inner: 100, tile: 16 }.into();
        assert!(matches!(err, RuntimeError::Configuration(_)));

        let err: RuntimeError = KernelError::BarrierPoisoned.into();
        assert!(matches!(err, RuntimeError::DispatchFailure(_)));

        let err: RuntimeError = KernelError::Memory(MemoryError::Capacity {
            tier: MemoryTier::DeviceScratch,
            requested: 2,
            available: 1,
        })
        .into();
        assert!(matches!(err, RuntimeError::Capacity(_)));
    }

    #[test]
    fn test_memory_error_mapping() {
        let err: RuntimeError = MemoryError::NotHostVisible {
            tier: MemoryTier::DeviceScratch,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "memory error: device-scratch memory is not visible to the host"
        );
    }
}
