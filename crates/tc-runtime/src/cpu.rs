use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use tc_kernel::{launch, GroupBarrier, Kernel, LockstepBarrier, WorkPartition};
use tc_memory::{Element, MemoryBudget, MemoryTier, MemoryTierBuffer, Shape};

use crate::config::{DeviceConfig, ExecutionMode};
use crate::device::{DeviceInfo, DeviceRuntime, LocalMemType, PendingDispatch};
use crate::error::{Result, RuntimeError};

/// Device runtime simulated on CPU threads.
///
/// Each compute unit is a work-group slot: it runs one thread per lane and
/// owns one scratch tile and one group barrier for the whole dispatch.
/// Scratch and group sizes are checked against the configured
/// [`DeviceLimits`](crate::DeviceLimits) before anything runs. Device-global
/// buffers share one budget of `global_mem_size` bytes for as long as they
/// are alive.
#[derive(Debug)]
pub struct CpuDevice {
    info: DeviceInfo,
    config: DeviceConfig,
    global: Arc<MemoryBudget>,
    submitted: AtomicU64,
}

impl CpuDevice {
    pub fn new(config: DeviceConfig) -> Self {
        let info = DeviceInfo {
            vendor: "tiled-compute".to_string(),
            name: format!("cpu-sim ({} units, {})", config.compute_units, config.execution_mode),
            local_mem_type: LocalMemType::Local,
            limits: config.limits,
        };
        log::debug!(
            "created {} device: {} compute units, {} KiB scratch",
            config.execution_mode,
            config.compute_units,
            config.limits.local_mem_size / 1024
        );
        CpuDevice {
            info,
            global: MemoryBudget::new(MemoryTier::DeviceGlobal, config.limits.global_mem_size),
            config,
            submitted: AtomicU64::new(0),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(DeviceConfig::from_env()?))
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Number of kernels submitted so far.
    pub fn dispatches_submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Bytes held by live device-global buffers.
    pub fn global_bytes_in_use(&self) -> usize {
        self.global.in_use()
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

impl DeviceRuntime for CpuDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn allocate<T: Element>(&self, tier: MemoryTier, shape: Shape) -> Result<MemoryTierBuffer<T>> {
        let buffer = match tier {
            MemoryTier::Host => MemoryTierBuffer::new(tier, shape),
            MemoryTier::DeviceGlobal => MemoryTierBuffer::allocate_from(&self.global, shape)?,
            // Each work-group slot owns its scratch, so the limit is per buffer.
            MemoryTier::DeviceScratch => {
                MemoryTierBuffer::allocate(tier, shape, self.config.limits.local_mem_size)?
            }
        };
        Ok(buffer)
    }

    fn submit<K: Kernel + 'static>(&self, kernel: Arc<K>, partition: WorkPartition) -> Result<PendingDispatch> {
        let limits = self.config.limits;
        let group_size = partition.work_group_size();
        if group_size > limits.max_work_group_size {
            return Err(RuntimeError::Capacity(format!(
                "work-group size {group_size} exceeds device limit {}",
                limits.max_work_group_size
            )));
        }
        let scratch = Shape::vector(kernel.scratch_len(&partition));
        let scratch_bytes = MemoryTierBuffer::<K::Elem>::required_bytes(scratch);
        if scratch_bytes > limits.local_mem_size {
            return Err(RuntimeError::Capacity(format!(
                "{} needs {scratch_bytes} bytes of scratch per work-group, device has {}",
                kernel.name(),
                limits.local_mem_size
            )));
        }

        let id = self.submitted.fetch_add(1, Ordering::Relaxed);
        let name = kernel.name().to_string();
        let units = self.config.compute_units;
        let mode = self.config.execution_mode;
        log::debug!(
            "submitting dispatch {id} ({name}): global {:?}, local {:?}, {mode}",
            partition.global_range(),
            partition.local_range()
        );

        let handle = thread::Builder::new()
            .name(format!("tc-dispatch-{id}"))
            .spawn(move || match mode {
                ExecutionMode::Concurrent => launch(&*kernel, &partition, units, GroupBarrier::new),
                ExecutionMode::Lockstep => launch(&*kernel, &partition, units, LockstepBarrier::new),
            })
            .map_err(|e| RuntimeError::DispatchFailure(format!("failed to start dispatch {id}: {e}")))?;

        Ok(PendingDispatch::new(id, name, handle))
    }

    fn parallel_for<F: Fn(usize) + Sync>(&self, range: usize, body: F) -> Result<()> {
        if range == 0 {
            return Ok(());
        }
        let units = self.config.compute_units.clamp(1, range);
        let chunk = range.div_ceil(units);
        let body = &body;
        let panicked = thread::scope(|scope| {
            let handles: Vec<_> = (0..units)
                .map(|unit| {
                    scope.spawn(move || {
                        let start = unit * chunk;
                        let end = (start + chunk).min(range);
                        for i in start..end {
                            body(i);
                        }
                    })
                })
                .collect();
            handles.into_iter().filter_map(|h| h.join().err()).count()
        });
        if panicked > 0 {
            log::warn!("parallel_for over {range} items: {panicked} of {units} compute units panicked");
            return Err(RuntimeError::DispatchFailure(format!(
                "{panicked} of {units} compute units panicked"
            )));
        }
        Ok(())
    }
}
