use tc_memory::Element;

use crate::context::KernelContext;
use crate::error::Result;
use crate::partition::WorkPartition;

/// A kernel body executed once per work-item.
///
/// Buffers are bound to the kernel value itself; per-item state arrives
/// through the [`KernelContext`]. Implementations must call barriers
/// uniformly: every lane of a group passes the same sites in the same order.
pub trait Kernel: Send + Sync {
    type Elem: Element;

    /// Returns the name of this kernel (e.g., "tiled_matmul").
    fn name(&self) -> &str;

    /// Scratch elements needed per work-group.
    fn scratch_len(&self, _partition: &WorkPartition) -> usize {
        0
    }

    fn execute(&self, ctx: &KernelContext<'_, Self::Elem>) -> Result<()>;
}
