use std::sync::Arc;
use std::time::{Duration, Instant};

use tc_kernel::{LaunchStats, TiledMatMulKernel, WorkPartition};
use tc_memory::{Element, Matrix, MemoryTier, MemoryTierBuffer};

use crate::config::DispatchConfig;
use crate::device::DeviceRuntime;
use crate::error::{Result, RuntimeError};

/// What a completed matmul dispatch did.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub stats: LaunchStats,
    pub tile_size: usize,
    /// Writes per result element in row-major order, when tracking is on.
    pub write_counts: Option<Vec<u32>>,
    /// Wall time from submission to completion.
    pub elapsed: Duration,
}

impl DispatchReport {
    /// `Some(true)` if every result element was written exactly once,
    /// `None` if writes were not tracked.
    pub fn written_exactly_once(&self) -> Option<bool> {
        self.write_counts
            .as_ref()
            .map(|counts| counts.iter().all(|&c| c == 1))
    }
}

/// Runs the tiled matrix multiply on a device and brings the result home.
///
/// A dispatch is synchronous: [`run`](Dispatcher::run) blocks until every
/// work-group has finished. Configuration is checked before anything is
/// allocated or submitted.
#[derive(Debug)]
pub struct Dispatcher<D: DeviceRuntime> {
    device: D,
    config: DispatchConfig,
}

impl<D: DeviceRuntime> Dispatcher<D> {
    pub fn new(device: D, config: DispatchConfig) -> Self {
        Dispatcher { device, config }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Compute `a @ b`.
    ///
    /// # Errors
    /// - `Configuration` if the tile size is zero or does not divide `K` or `N`,
    ///   or if `a.cols != b.rows`. Nothing is submitted in that case.
    /// - `Capacity` if the operands, result and other live device-global
    ///   buffers exceed the device's global memory, or one work-group does not
    ///   fit the device.
    /// - `DispatchFailure` if any work-item failed.
    pub fn run<T: Element>(&self, a: &Matrix<T>, b: &Matrix<T>) -> Result<Matrix<T>> {
        self.run_with_report(a, b).map(|(c, _)| c)
    }

    /// Like [`run`](Dispatcher::run), also returning what the dispatch did.
    pub fn run_with_report<T: Element>(
        &self,
        a: &Matrix<T>,
        b: &Matrix<T>,
    ) -> Result<(Matrix<T>, DispatchReport)> {
        let tile_size = self.config.tile_size;
        let partition = WorkPartition::for_matmul(a.shape(), b.shape(), tile_size)?;
        self.check_work_group(&partition)?;

        let lhs = self.upload(a)?;
        let rhs = self.upload(b)?;
        let mut out = self
            .device
            .allocate::<T>(MemoryTier::DeviceGlobal, (a.rows(), b.cols()).into())?;
        if self.config.track_writes {
            out = out.with_write_tracking();
        }
        let out = Arc::new(out);

        let kernel = TiledMatMulKernel::new(lhs, rhs, Arc::clone(&out), tile_size)?;
        let partition = *kernel.partition();

        let started = Instant::now();
        let stats = self.device.submit(Arc::new(kernel), partition)?.wait()?;
        let elapsed = started.elapsed();

        let c = out.to_matrix()?;
        log::debug!(
            "{}x{}x{} matmul with T={} finished in {:?}",
            a.rows(),
            a.cols(),
            b.cols(),
            tile_size,
            elapsed
        );
        let report = DispatchReport {
            stats,
            tile_size,
            write_counts: out.write_counts(),
            elapsed,
        };
        Ok((c, report))
    }

    fn check_work_group(&self, partition: &WorkPartition) -> Result<()> {
        let limit = self.device.info().limits.max_work_group_size;
        if partition.work_group_size() > limit {
            return Err(RuntimeError::Capacity(format!(
                "tile size {} exceeds the device work-group limit {limit}",
                partition.work_group_size()
            )));
        }
        Ok(())
    }

    fn upload<T: Element>(&self, matrix: &Matrix<T>) -> Result<Arc<MemoryTierBuffer<T>>> {
        let buffer = self.device.allocate::<T>(MemoryTier::DeviceGlobal, matrix.shape())?;
        buffer.copy_from(matrix)?;
        Ok(Arc::new(buffer))
    }
}
