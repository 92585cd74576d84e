use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;

use tc_kernel::{Kernel, KernelError, LaunchStats, WorkPartition};
use tc_memory::{Element, MemoryTier, MemoryTierBuffer, Shape};

use crate::error::{Result, RuntimeError};

/// Kind of memory backing work-group local memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalMemType {
    /// Dedicated on-chip memory.
    Local,
    /// Emulated in global memory.
    Global,
    /// No local memory.
    None,
}

impl fmt::Display for LocalMemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalMemType::Local => write!(f, "local"),
            LocalMemType::Global => write!(f, "global"),
            LocalMemType::None => write!(f, "none"),
        }
    }
}

/// Resource limits a device enforces on allocations and launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Bytes of scratch memory available to one work-group.
    pub local_mem_size: usize,
    /// Bytes of device-global memory.
    pub global_mem_size: usize,
    /// Maximum work-items per work-group.
    pub max_work_group_size: usize,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        DeviceLimits {
            local_mem_size: 64 * 1024,
            global_mem_size: 1 << 30,
            max_work_group_size: 256,
        }
    }
}

/// Static description of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor: String,
    pub name: String,
    pub local_mem_type: LocalMemType,
    pub limits: DeviceLimits,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device {} {}", self.vendor, self.name)?;
        writeln!(f, "  Local memory type {}", self.local_mem_type)?;
        write!(
            f,
            "  Local memory size {} KiB",
            self.limits.local_mem_size as f64 / 1024.0
        )
    }
}

/// The capabilities a dispatcher needs from an accelerator runtime.
///
/// Barriers are not exposed directly: a device builds one group barrier per
/// work-group slot when a kernel is submitted.
pub trait DeviceRuntime: Send + Sync + fmt::Debug {
    fn info(&self) -> &DeviceInfo;

    /// Allocate a zero-filled buffer in `tier`.
    ///
    /// # Errors
    /// `RuntimeError::Capacity` if the tier's limit cannot hold it.
    fn allocate<T: Element>(&self, tier: MemoryTier, shape: Shape) -> Result<MemoryTierBuffer<T>>;

    /// Submit `kernel` over `partition` without waiting for it.
    ///
    /// # Errors
    /// `Capacity` if the work-group or its scratch exceeds device limits,
    /// `DispatchFailure` if the dispatch could not be started.
    fn submit<K: Kernel + 'static>(&self, kernel: Arc<K>, partition: WorkPartition) -> Result<PendingDispatch>;

    /// Run `body(i)` for every `i` in `0..range`, with no work-groups or
    /// scratch, and block until done.
    fn parallel_for<F: Fn(usize) + Sync>(&self, range: usize, body: F) -> Result<()>;
}

/// A submitted dispatch. Dropping it without waiting detaches the work.
#[derive(Debug)]
pub struct PendingDispatch {
    id: u64,
    kernel: String,
    handle: JoinHandle<std::result::Result<LaunchStats, KernelError>>,
}

impl PendingDispatch {
    pub(crate) fn new(
        id: u64,
        kernel: String,
        handle: JoinHandle<std::result::Result<LaunchStats, KernelError>>,
    ) -> Self {
        PendingDispatch { id, kernel, handle }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until every work-group has completed.
    ///
    /// # Errors
    /// `DispatchFailure` if any work-item failed; the dispatch fails as a unit.
    pub fn wait(self) -> Result<LaunchStats> {
        let outcome = self.handle.join().map_err(|_| {
            RuntimeError::DispatchFailure(format!("dispatch {} thread panicked", self.id))
        })?;
        match outcome {
            Ok(stats) => {
                log::debug!(
                    "dispatch {} ({}) completed: {} work-items in {} work-groups",
                    self.id,
                    self.kernel,
                    stats.work_items,
                    stats.work_groups
                );
                Ok(stats)
            }
            Err(err) => {
                log::warn!("dispatch {} ({}) failed: {}", self.id, self.kernel, err);
                Err(RuntimeError::DispatchFailure(err.to_string()))
            }
        }
    }
}
