use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::budget::{MemoryBudget, Reservation};
use crate::dtype::Element;
use crate::error::{MemoryError, Result};
use crate::matrix::Matrix;
use crate::shape::Shape;
use crate::tier::MemoryTier;

/// A 2D buffer resident in one memory tier.
///
/// Elements are stored as bit patterns in relaxed atomics, so a buffer can be
/// shared by reference between the work-items of a dispatch. Ordering between
/// work-items comes from group barriers and dispatch completion, not from the
/// buffer itself.
///
/// Host-side copies (`copy_from`, `to_matrix`) are rejected for
/// `DeviceScratch` buffers. Element accessors panic on out-of-range indices.
pub struct MemoryTierBuffer<T: Element> {
    tier: MemoryTier,
    shape: Shape,
    cells: Box<[AtomicU64]>,
    writes: Option<Box<[AtomicU32]>>,
    reservation: Option<Reservation>,
    _elem: PhantomData<T>,
}

impl<T: Element> MemoryTierBuffer<T> {
    /// Allocate a zero-filled buffer without a capacity limit.
    pub fn new(tier: MemoryTier, shape: Shape) -> Self {
        let zero = T::zero().to_bits();
        let cells = (0..shape.numel()).map(|_| AtomicU64::new(zero)).collect();
        MemoryTierBuffer {
            tier,
            shape,
            cells,
            writes: None,
            reservation: None,
            _elem: PhantomData,
        }
    }

    /// Allocate a zero-filled buffer, failing if it needs more than
    /// `capacity` bytes.
    ///
    /// # Errors
    /// Returns `MemoryError::Capacity` when the buffer does not fit.
    pub fn allocate(tier: MemoryTier, shape: Shape, capacity: usize) -> Result<Self> {
        let requested = Self::required_bytes(shape);
        if requested > capacity {
            return Err(MemoryError::Capacity {
                tier,
                requested,
                available: capacity,
            });
        }
        Ok(Self::new(tier, shape))
    }

    /// Allocate a zero-filled buffer in the budget's tier, holding its bytes
    /// against the budget until the buffer is dropped.
    ///
    /// # Errors
    /// Returns `MemoryError::Capacity` when the live total would exceed the
    /// budget.
    pub fn allocate_from(budget: &Arc<MemoryBudget>, shape: Shape) -> Result<Self> {
        let reservation = budget.reserve(Self::required_bytes(shape))?;
        let mut buffer = Self::new(budget.tier(), shape);
        buffer.reservation = Some(reservation);
        Ok(buffer)
    }

    /// Allocate a host-visible buffer initialised from `matrix`.
    ///
    /// # Errors
    /// Returns `NotHostVisible` for `DeviceScratch`.
    pub fn from_matrix(tier: MemoryTier, matrix: &Matrix<T>) -> Result<Self> {
        let buffer = Self::new(tier, matrix.shape());
        buffer.copy_from(matrix)?;
        Ok(buffer)
    }

    /// Bytes needed to hold a buffer of `shape`.
    pub fn required_bytes(shape: Shape) -> usize {
        shape.numel() * T::DTYPE.size_in_bytes()
    }

    /// Count every element write from now on. Used to audit dispatches.
    pub fn with_write_tracking(mut self) -> Self {
        self.writes = Some((0..self.cells.len()).map(|_| AtomicU32::new(0)).collect());
        self
    }

    pub fn tier(&self) -> MemoryTier {
        self.tier
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        Self::required_bytes(self.shape)
    }

    #[inline]
    pub fn read(&self, row: usize, col: usize) -> T {
        self.read_flat(self.checked_offset(row, col))
    }

    #[inline]
    pub fn write(&self, row: usize, col: usize, value: T) {
        self.write_flat(self.checked_offset(row, col), value);
    }

    #[inline]
    pub fn read_flat(&self, index: usize) -> T {
        T::from_bits(self.cells[index].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn write_flat(&self, index: usize, value: T) {
        self.cells[index].store(value.to_bits(), Ordering::Relaxed);
        if let Some(writes) = &self.writes {
            writes[index].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy host data into this buffer. Does not count as device writes.
    ///
    /// # Errors
    /// `NotHostVisible` for scratch buffers, `ShapeMismatch` if shapes differ.
    pub fn copy_from(&self, matrix: &Matrix<T>) -> Result<()> {
        self.ensure_host_visible()?;
        if matrix.shape() != self.shape {
            return Err(MemoryError::ShapeMismatch {
                expected: self.shape.dims(),
                got: matrix.shape().dims(),
            });
        }
        for (cell, &value) in self.cells.iter().zip(matrix.as_slice()) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy the buffer contents into a host matrix.
    ///
    /// # Errors
    /// `NotHostVisible` for scratch buffers.
    pub fn to_matrix(&self) -> Result<Matrix<T>> {
        self.ensure_host_visible()?;
        let data = self
            .cells
            .iter()
            .map(|cell| T::from_bits(cell.load(Ordering::Relaxed)))
            .collect();
        Matrix::from_vec(self.shape.rows(), self.shape.cols(), data)
    }

    /// Per-element write counts, if tracking was enabled.
    pub fn write_counts(&self) -> Option<Vec<u32>> {
        self.writes
            .as_ref()
            .map(|w| w.iter().map(|c| c.load(Ordering::Relaxed)).collect())
    }

    fn ensure_host_visible(&self) -> Result<()> {
        if self.tier.is_host_visible() {
            Ok(())
        } else {
            Err(MemoryError::NotHostVisible { tier: self.tier })
        }
    }

    #[inline]
    fn checked_offset(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.shape.rows() && col < self.shape.cols(),
            "index ({row}, {col}) out of range for {} buffer {}",
            self.tier,
            self.shape
        );
        self.shape.offset(row, col)
    }
}

impl<T: Element> fmt::Debug for MemoryTierBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTierBuffer")
            .field("tier", &self.tier)
            .field("shape", &self.shape)
            .field("dtype", &T::DTYPE)
            .field("tracked", &self.writes.is_some())
            .field("reserved", &self.reservation.as_ref().map(Reservation::bytes))
            .finish()
    }
}
