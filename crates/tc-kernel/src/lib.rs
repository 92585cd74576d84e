//! `tc-kernel` - Work partitioning, group barriers and kernels for tiled-compute.
//!
//! This crate provides:
//! - `WorkPartition`, the split of a result index space into work-groups
//! - `GroupSync` barriers: concurrent (`GroupBarrier`) and deterministic
//!   (`LockstepBarrier`)
//! - The `Kernel` trait and its per-work-item `KernelContext`
//! - `TiledMatMulKernel`, a scratch-tiled matrix multiply
//! - `launch`, which runs a kernel over a partition on CPU threads
//! - Serial reference helpers for verifying results

pub mod context;
pub mod error;
pub mod kernel;
pub mod launch;
pub mod matmul;
pub mod partition;
pub mod reference;
pub mod sync;

// Re-export primary types at the crate root for convenience.
pub use context::KernelContext;
pub use error::{KernelError, Result};
pub use kernel::Kernel;
pub use launch::{launch, LaunchStats};
pub use matmul::TiledMatMulKernel;
pub use partition::{WorkItem, WorkPartition};
pub use sync::{BarrierSite, GroupBarrier, GroupSync, LockstepBarrier};
