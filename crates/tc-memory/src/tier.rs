use std::fmt;

/// Memory tier a buffer is resident in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryTier {
    /// Host-allocated memory the device can also read and write.
    Host,
    /// Device-global memory shared between host and device.
    DeviceGlobal,
    /// Fast work-group local memory, alive only for one dispatch.
    DeviceScratch,
}

impl MemoryTier {
    /// Whether host code may copy data in or out of this tier.
    pub fn is_host_visible(&self) -> bool {
        !matches!(self, MemoryTier::DeviceScratch)
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryTier::Host => write!(f, "host"),
            MemoryTier::DeviceGlobal => write!(f, "device-global"),
            MemoryTier::DeviceScratch => write!(f, "device-scratch"),
        }
    }
}
