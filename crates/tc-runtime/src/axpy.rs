//! Scalar `z = alpha * x + y` over host-resident inputs.
//!
//! No work-groups, scratch or barriers: each index is independent, so the
//! device's `parallel_for` is enough. The output lives in device-global
//! memory, which the host can read back directly.

use tc_memory::{Element, MemoryError, MemoryTier, MemoryTierBuffer};

use crate::device::DeviceRuntime;
use crate::error::Result;

/// Compute `z[i] = x[i] * alpha + y[i]` for every element.
///
/// # Errors
/// - `Memory(NotHostVisible)` if either input lives in scratch memory.
/// - `Memory(ShapeMismatch)` if `x` and `y` differ in shape.
/// - `Capacity` if the output does not fit in device-global memory.
pub fn axpy<D, T>(
    device: &D,
    alpha: T,
    x: &MemoryTierBuffer<T>,
    y: &MemoryTierBuffer<T>,
) -> Result<MemoryTierBuffer<T>>
where
    D: DeviceRuntime,
    T: Element,
{
    for input in [x, y] {
        if !input.tier().is_host_visible() {
            return Err(MemoryError::NotHostVisible { tier: input.tier() }.into());
        }
    }
    if x.shape() != y.shape() {
        return Err(MemoryError::ShapeMismatch {
            expected: x.shape().dims(),
            got: y.shape().dims(),
        }
        .into());
    }

    let z = device.allocate::<T>(MemoryTier::DeviceGlobal, x.shape())?;
    device.parallel_for(z.len(), |i| {
        z.write_flat(i, x.read_flat(i) * alpha + y.read_flat(i));
    })?;
    log::debug!("axpy over {} elements done", z.len());
    Ok(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::cpu::CpuDevice;
    use crate::error::RuntimeError;
    use approx::assert_abs_diff_eq;
    use tc_memory::{Matrix, Shape};

    fn host_vector(values: impl Iterator<Item = f64>) -> MemoryTierBuffer<f64> {
        let data: Vec<f64> = values.collect();
        let matrix = Matrix::from_vec(1, data.len(), data).unwrap();
        MemoryTierBuffer::from_matrix(MemoryTier::Host, &matrix).unwrap()
    }

    #[test]
    fn test_axpy_ramp_sums_to_constant() {
        let device = CpuDevice::new(DeviceConfig::default().with_compute_units(4));
        let sz = 1024;
        let x = host_vector((0..sz).map(|i| i as f64));
        let y = host_vector((0..sz).map(|i| (sz - 1 - i) as f64));
        let z = axpy(&device, 1.0, &x, &y).unwrap();
        assert_eq!(z.tier(), MemoryTier::DeviceGlobal);
        for v in z.to_matrix().unwrap().as_slice() {
            assert_abs_diff_eq!(*v, (sz - 1) as f64, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_axpy_scales_x() {
        let device = CpuDevice::default();
        let x = host_vector([1.0, 2.0, 3.0].into_iter());
        let y = host_vector([0.5, 0.5, 0.5].into_iter());
        let z = axpy(&device, -2.0, &x, &y).unwrap();
        assert_eq!(z.to_matrix().unwrap().into_vec(), vec![-1.5, -3.5, -5.5]);
    }

    #[test]
    fn test_axpy_rejects_mismatched_lengths() {
        let device = CpuDevice::default();
        let x = host_vector((0..4).map(f64::from));
        let y = host_vector((0..5).map(f64::from));
        let err = axpy(&device, 1.0, &x, &y).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Memory(MemoryError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_axpy_rejects_scratch_inputs() {
        let device = CpuDevice::default();
        let x = MemoryTierBuffer::<f64>::new(MemoryTier::DeviceScratch, Shape::vector(4));
        let y = host_vector((0..4).map(f64::from));
        let err = axpy(&device, 1.0, &x, &y).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Memory(MemoryError::NotHostVisible {
                tier: MemoryTier::DeviceScratch
            })
        ));
    }
}
