use std::sync::Arc;

use tc_memory::{Element, MemoryTierBuffer};

use crate::context::KernelContext;
use crate::error::{KernelError, Result};
use crate::kernel::Kernel;
use crate::partition::WorkPartition;
use crate::sync::BarrierSite;

/// Blocked matrix multiply `C = A @ B` staging rows of `A` through scratch.
///
/// Each work-group covers one row `m` of `C` and `T` consecutive columns. For
/// every block of `T` inner indices, lane `i` loads `A[m][l + i]` into tile
/// slot `i`; after the `TileLoaded` barrier every lane reads the whole tile,
/// so each element of `A` fetched from global memory is reused `T` times. The
/// `TileConsumed` barrier keeps the next block from overwriting a tile some
/// lane is still reading.
///
/// Accumulation runs over `k = 0..K` in order, the same order as the naive
/// triple loop, so the result does not depend on `T`.
#[derive(Debug)]
pub struct TiledMatMulKernel<T: Element> {
    lhs: Arc<MemoryTierBuffer<T>>,
    rhs: Arc<MemoryTierBuffer<T>>,
    out: Arc<MemoryTierBuffer<T>>,
    partition: WorkPartition,
}

impl<T: Element> TiledMatMulKernel<T> {
    /// Bind operand and result buffers.
    ///
    /// # Errors
    /// `MatmulMismatch` if `lhs.cols != rhs.rows`, `ResultShape` if `out` is
    /// not `lhs.rows x rhs.cols`, and the partition errors for `tile_size`.
    pub fn new(
        lhs: Arc<MemoryTierBuffer<T>>,
        rhs: Arc<MemoryTierBuffer<T>>,
        out: Arc<MemoryTierBuffer<T>>,
        tile_size: usize,
    ) -> Result<Self> {
        let partition = WorkPartition::for_matmul(lhs.shape(), rhs.shape(), tile_size)?;
        let expected = (lhs.shape().rows(), rhs.shape().cols());
        if out.shape().dims() != expected {
            return Err(KernelError::ResultShape {
                expected,
                got: out.shape().dims(),
            });
        }
        Ok(TiledMatMulKernel {
            lhs,
            rhs,
            out,
            partition,
        })
    }

    pub fn partition(&self) -> &WorkPartition {
        &self.partition
    }

    pub fn output(&self) -> &Arc<MemoryTierBuffer<T>> {
        &self.out
    }
}

impl<T: Element> Kernel for TiledMatMulKernel<T> {
    type Elem = T;

    fn name(&self) -> &str {
        "tiled_matmul"
    }

    fn scratch_len(&self, partition: &WorkPartition) -> usize {
        partition.tile_size()
    }

    fn execute(&self, ctx: &KernelContext<'_, T>) -> Result<()> {
        let (m, n) = ctx.global_id();
        let i = ctx.local_id();
        let tile_size = self.partition.tile_size();
        let tile = ctx.scratch();

        let mut sum = T::zero();
        for l in (0..self.partition.inner()).step_by(tile_size) {
            tile.write_flat(i, self.lhs.read(m, l + i));
            ctx.barrier(BarrierSite::TileLoaded)?;

            for k in 0..tile_size {
                sum = sum + tile.read_flat(k) * self.rhs.read(l + k, n);
            }
            ctx.barrier(BarrierSite::TileConsumed)?;
        }

        self.out.write(m, n, sum);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::launch;
    use crate::reference::reference_matmul;
    use crate::sync::{GroupBarrier, GroupSync, LockstepBarrier};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tc_memory::{Matrix, MemoryTier, Shape};

    /// Skips one barrier site and forwards the rest.
    struct Elide<S> {
        inner: S,
        site: BarrierSite,
    }

    impl<S: GroupSync> GroupSync for Elide<S> {
        fn lanes(&self) -> usize {
            self.inner.lanes()
        }

        fn enter(&self, lane: usize) -> Result<()> {
            self.inner.enter(lane)
        }

        fn barrier(&self, lane: usize, site: BarrierSite) -> Result<()> {
            if site == self.site {
                Ok(())
            } else {
                self.inner.barrier(lane, site)
            }
        }

        fn leave(&self, lane: usize) {
            self.inner.leave(lane)
        }

        fn poison(&self) {
            self.inner.poison()
        }
    }

    fn bind(a: &Matrix<f64>, b: &Matrix<f64>, tile: usize) -> TiledMatMulKernel<f64> {
        let lhs = MemoryTierBuffer::from_matrix(MemoryTier::DeviceGlobal, a).unwrap();
        let rhs = MemoryTierBuffer::from_matrix(MemoryTier::DeviceGlobal, b).unwrap();
        let out = MemoryTierBuffer::new(MemoryTier::DeviceGlobal, Shape::new(a.rows(), b.cols()))
            .with_write_tracking();
        TiledMatMulKernel::new(Arc::new(lhs), Arc::new(rhs), Arc::new(out), tile).unwrap()
    }

    fn operands(n: usize, seed: u64) -> (Matrix<f64>, Matrix<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        (
            Matrix::random_uniform(n, n, &mut rng),
            Matrix::random_uniform(n, n, &mut rng),
        )
    }

    #[test]
    fn test_small_known_product() {
        let a = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::from_vec(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        let kernel = bind(&a, &b, 2);
        let stats = launch(&kernel, kernel.partition(), 2, GroupBarrier::new).unwrap();
        assert_eq!(stats.work_items, 4);
        assert_eq!(kernel.output().to_matrix().unwrap().into_vec(), vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_concurrent_matches_reference_bitwise() {
        let (a, b) = operands(32, 1);
        let kernel = bind(&a, &b, 8);
        launch(&kernel, kernel.partition(), 3, GroupBarrier::new).unwrap();
        assert_eq!(kernel.output().to_matrix().unwrap(), reference_matmul(&a, &b));
    }

    #[test]
    fn test_each_result_written_once() {
        let (a, b) = operands(16, 2);
        let kernel = bind(&a, &b, 4);
        launch(&kernel, kernel.partition(), 4, GroupBarrier::new).unwrap();
        let counts = kernel.output().write_counts().unwrap();
        assert!(counts.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_lockstep_with_both_barriers_is_correct() {
        let (a, b) = operands(8, 3);
        let kernel = bind(&a, &b, 4);
        launch(&kernel, kernel.partition(), 2, LockstepBarrier::new).unwrap();
        assert_eq!(kernel.output().to_matrix().unwrap(), reference_matmul(&a, &b));
    }

    #[test]
    fn test_missing_tile_loaded_barrier_breaks_result() {
        let (a, b) = operands(8, 4);
        let kernel = bind(&a, &b, 4);
        launch(&kernel, kernel.partition(), 1, |lanes| Elide {
            inner: LockstepBarrier::new(lanes),
            site: BarrierSite::TileLoaded,
        })
        .unwrap();
        assert_ne!(kernel.output().to_matrix().unwrap(), reference_matmul(&a, &b));
    }

    #[test]
    fn test_missing_tile_consumed_barrier_breaks_result() {
        let (a, b) = operands(8, 5);
        let kernel = bind(&a, &b, 4);
        launch(&kernel, kernel.partition(), 1, |lanes| Elide {
            inner: LockstepBarrier::new(lanes),
            site: BarrierSite::TileConsumed,
        })
        .unwrap();
        assert_ne!(kernel.output().to_matrix().unwrap(), reference_matmul(&a, &b));
    }

    #[test]
    fn test_single_block_boundary() {
        let (a, b) = operands(8, 6);
        let kernel = bind(&a, &b, 8);
        assert_eq!(kernel.partition().blocks(), 1);
        launch(&kernel, kernel.partition(), 2, GroupBarrier::new).unwrap();
        assert_eq!(kernel.output().to_matrix().unwrap(), reference_matmul(&a, &b));
    }

    #[test]
    fn test_rectangular_operands() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Matrix::<f64>::random_uniform(3, 8, &mut rng);
        let b = Matrix::<f64>::random_uniform(8, 12, &mut rng);
        let kernel = bind(&a, &b, 4);
        launch(&kernel, kernel.partition(), 2, GroupBarrier::new).unwrap();
        assert_eq!(kernel.output().to_matrix().unwrap(), reference_matmul(&a, &b));
    }

    #[test]
    fn test_result_shape_mismatch() {
        let lhs = Arc::new(MemoryTierBuffer::<f32>::new(MemoryTier::DeviceGlobal, Shape::new(2, 4)));
        let rhs = Arc::new(MemoryTierBuffer::<f32>::new(MemoryTier::DeviceGlobal, Shape::new(4, 4)));
        let out = Arc::new(MemoryTierBuffer::<f32>::new(MemoryTier::DeviceGlobal, Shape::new(4, 4)));
        let err = TiledMatMulKernel::new(lhs, rhs, out, 2).unwrap_err();
        assert_eq!(err, KernelError::ResultShape { expected: (2, 4), got: (4, 4) });
    }
}
