use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tc_memory::{Element, MemoryTier, MemoryTierBuffer, Shape};

use crate::context::KernelContext;
use crate::error::{KernelError, Result};
use crate::kernel::Kernel;
use crate::partition::WorkPartition;
use crate::sync::GroupSync;

/// Summary of a completed launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaunchStats {
    pub work_groups: usize,
    pub work_items: usize,
    pub compute_units: usize,
}

/// Run `kernel` over every work-item of `partition` and block until done.
///
/// Work-groups are dealt round-robin to `compute_units` slots. Each slot owns
/// one scratch buffer and one `GroupSync` built by `make_sync(lanes)`, and runs
/// one thread per lane; lane `i` executes local id `i` of every group dealt to
/// its slot, in order. Groups on different slots never synchronize.
///
/// If any lane fails or panics, its slot's sync is poisoned so the remaining
/// lanes of that slot return instead of waiting forever, and the first
/// non-poison error is reported.
pub fn launch<K, S, F>(
    kernel: &K,
    partition: &WorkPartition,
    compute_units: usize,
    make_sync: F,
) -> Result<LaunchStats>
where
    K: Kernel + ?Sized,
    S: GroupSync,
    F: Fn(usize) -> S,
{
    let groups = partition.work_group_count();
    if groups == 0 {
        return Ok(LaunchStats::default());
    }
    let lanes = partition.work_group_size();
    let units = compute_units.clamp(1, groups);
    let scratch_shape = Shape::vector(kernel.scratch_len(partition));

    log::debug!(
        "launching {} over {} work-groups of {} on {} compute units",
        kernel.name(),
        groups,
        lanes,
        units
    );

    let slots: Vec<(MemoryTierBuffer<K::Elem>, S)> = (0..units)
        .map(|_| {
            (
                MemoryTierBuffer::new(MemoryTier::DeviceScratch, scratch_shape),
                make_sync(lanes),
            )
        })
        .collect();

    let outcomes: Vec<Result<usize>> = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(units * lanes);
        for (unit, (scratch, sync)) in slots.iter().enumerate() {
            for lane in 0..lanes {
                let lane_run = Lane {
                    unit,
                    units,
                    lane,
                    scratch,
                    sync,
                };
                let spawned = thread::Builder::new()
                    .name(format!("tc-unit{unit}-lane{lane}"))
                    .spawn_scoped(scope, move || lane_run.run(kernel, partition));
                match spawned {
                    Ok(handle) => handles.push((unit, lane, handle)),
                    Err(err) => {
                        sync.poison();
                        return vec![Err(KernelError::LaneSpawn(err.to_string()))];
                    }
                }
            }
        }
        handles
            .into_iter()
            .map(|(unit, lane, handle)| {
                handle.join().unwrap_or_else(|payload| {
                    Err(KernelError::WorkItemPanicked {
                        unit,
                        lane,
                        message: panic_message(payload),
                    })
                })
            })
            .collect()
    });

    let mut work_items = 0;
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(executed) => work_items += executed,
            Err(err) => errors.push(err),
        }
    }
    if let Some(first) = errors.first() {
        let primary = errors
            .iter()
            .find(|e| **e != KernelError::BarrierPoisoned)
            .unwrap_or(first);
        return Err(primary.clone());
    }

    Ok(LaunchStats {
        work_groups: groups,
        work_items,
        compute_units: units,
    })
}

struct Lane<'a, T: Element, S> {
    unit: usize,
    units: usize,
    lane: usize,
    scratch: &'a MemoryTierBuffer<T>,
    sync: &'a S,
}

impl<T: Element, S: GroupSync> Lane<'_, T, S> {
    fn run<K>(self, kernel: &K, partition: &WorkPartition) -> Result<usize>
    where
        K: Kernel<Elem = T> + ?Sized,
    {
        log::trace!("unit {} lane {} started", self.unit, self.lane);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute_groups(kernel, partition)));
        let result = match outcome {
            Ok(Ok(executed)) => Ok(executed),
            Ok(Err(err)) => {
                self.sync.poison();
                Err(err)
            }
            Err(payload) => {
                self.sync.poison();
                Err(KernelError::WorkItemPanicked {
                    unit: self.unit,
                    lane: self.lane,
                    message: panic_message(payload),
                })
            }
        };
        log::trace!("unit {} lane {} stopped", self.unit, self.lane);
        result
    }

    fn execute_groups<K>(&self, kernel: &K, partition: &WorkPartition) -> Result<usize>
    where
        K: Kernel<Elem = T> + ?Sized,
    {
        self.sync.enter(self.lane)?;
        let mut executed = 0;
        for group in (self.unit..partition.work_group_count()).step_by(self.units) {
            let item = partition.work_item(group, self.lane);
            let ctx = KernelContext::new(item, self.scratch, self.sync);
            kernel.execute(&ctx)?;
            executed += 1;
        }
        self.sync.leave(self.lane);
        Ok(executed)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
