use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{MemoryError, Result};
use crate::tier::MemoryTier;

/// Byte budget shared by every live buffer of one tier.
///
/// Buffers reserve their size on allocation and give it back when dropped.
#[derive(Debug)]
pub struct MemoryBudget {
    tier: MemoryTier,
    capacity: usize,
    used: AtomicUsize,
}

impl MemoryBudget {
    pub fn new(tier: MemoryTier, capacity: usize) -> Arc<Self> {
        Arc::new(MemoryBudget {
            tier,
            capacity,
            used: AtomicUsize::new(0),
        })
    }

    pub fn tier(&self) -> MemoryTier {
        self.tier
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by live reservations.
    pub fn in_use(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    /// Reserve `bytes`, released when the returned guard is dropped.
    ///
    /// # Errors
    /// `MemoryError::Capacity` if the live total would exceed the capacity.
    pub fn reserve(self: &Arc<Self>, bytes: usize) -> Result<Reservation> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= self.capacity)
            })
            .map_err(|used| MemoryError::Capacity {
                tier: self.tier,
                requested: bytes,
                available: self.capacity.saturating_sub(used),
            })?;
        Ok(Reservation {
            budget: Arc::clone(self),
            bytes,
        })
    }
}

/// Bytes held against a [`MemoryBudget`].
#[derive(Debug)]
pub struct Reservation {
    budget: Arc<MemoryBudget>,
    bytes: usize,
}

impl Reservation {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.budget.used.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}
