//! `tc-runtime` - Simulated device runtime and dispatcher for tiled-compute.
//!
//! This crate provides:
//! - The `DeviceRuntime` trait: allocation per memory tier, kernel submission
//!   and blocking completion
//! - `CpuDevice`, a device simulated on CPU threads with configurable limits
//!   and a deterministic lockstep mode
//! - `Dispatcher`, which runs the tiled matrix multiply end to end
//! - `axpy`, a range-only kernel over host-visible buffers
//! - Environment-driven configuration

pub mod axpy;
pub mod config;
pub mod cpu;
pub mod device;
pub mod dispatcher;
pub mod error;

// Re-export primary types at the crate root for convenience.
pub use axpy::axpy;
pub use config::{DeviceConfig, DispatchConfig, ExecutionMode};
pub use cpu::CpuDevice;
pub use device::{DeviceInfo, DeviceLimits, DeviceRuntime, LocalMemType, PendingDispatch};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{Result, RuntimeError};
