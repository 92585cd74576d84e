//! `tc-memory` - Memory tiers, buffers and dense matrices for tiled-compute.
//!
//! This crate provides:
//! - A `MemoryTier` tag (host, device-global, device-scratch)
//! - `MemoryTierBuffer`, a shareable 2D buffer resident in one tier
//! - `MemoryBudget`, the live-byte budget of a tier
//! - A host-side row-major `Matrix`
//! - The `Element` trait for the scalar types buffers can hold

pub mod buffer;
pub mod budget;
pub mod dtype;
pub mod error;
pub mod matrix;
pub mod shape;
pub mod tier;

// Re-export primary types at the crate root for convenience.
pub use buffer::MemoryTierBuffer;
pub use budget::{MemoryBudget, Reservation};
pub use dtype::{DType, Element};
pub use error::{MemoryError, Result};
pub use matrix::Matrix;
pub use shape::Shape;
pub use tier::MemoryTier;
