//! chunkpool - recycling memory pool for host and device chunks
//!
//! Numerical kernels request scratch memory over and over, usually in
//! repeating sizes. Going to the host allocator or the GPU runtime for every
//! request is expensive, so [`MemoryPool`] keeps released chunks and hands
//! them out again, growing a chunk only when no available one is big enough.
//!
//! Host and device memory are tracked side by side but never mixed: a chunk
//! keeps the [`MemoryKind`] it was created with.

#![allow(clippy::new_without_default)]

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod pool;

pub use backend::{DummyBackend, MemoryBackend, MemoryKind, SystemBackend};
#[cfg(feature = "rocm")]
pub use backend::HipBackend;
pub use config::{BackendChoice, PoolConfig};
pub use error::{ConfigError, PoolError, PoolResult};
pub use pool::{MemoryPool, MemoryStats, PoolUsage};
