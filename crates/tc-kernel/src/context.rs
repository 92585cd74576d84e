use tc_memory::{Element, MemoryTierBuffer};

use crate::error::Result;
use crate::partition::WorkItem;
use crate::sync::{BarrierSite, GroupSync};

/// Everything a work-item may touch besides the kernel's own bound buffers:
/// its coordinates, its group's scratch memory and its group's barrier.
///
/// Built fresh for every work-item and passed by reference to
/// [`Kernel::execute`](crate::Kernel::execute).
pub struct KernelContext<'a, T: Element> {
    item: WorkItem,
    scratch: &'a MemoryTierBuffer<T>,
    sync: &'a dyn GroupSync,
}

impl<'a, T: Element> KernelContext<'a, T> {
    pub fn new(item: WorkItem, scratch: &'a MemoryTierBuffer<T>, sync: &'a dyn GroupSync) -> Self {
        KernelContext { item, scratch, sync }
    }

    pub fn item(&self) -> WorkItem {
        self.item
    }

    /// Global (row, col) of the result element.
    pub fn global_id(&self) -> (usize, usize) {
        self.item.global
    }

    pub fn local_id(&self) -> usize {
        self.item.local
    }

    pub fn group_id(&self) -> usize {
        self.item.group
    }

    /// Work-group local memory, shared with every lane of the group.
    pub fn scratch(&self) -> &'a MemoryTierBuffer<T> {
        self.scratch
    }

    /// Wait until every lane of the group reaches `site`.
    pub fn barrier(&self, site: BarrierSite) -> Result<()> {
        self.sync.barrier(self.item.local, site)
    }
}
