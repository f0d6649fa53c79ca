//! Memory backends
//!
//! A backend performs the real, expensive allocation and release of host and
//! device memory. The pool calls into it only on resize-on-miss and teardown.
//!
//! - [`SystemBackend`] - host allocator, serves both kinds from host RAM
//! - [`DummyBackend`] - fake addresses with call accounting, for tests
//! - [`HipBackend`] - ROCm/HIP device and pinned host memory (`rocm` feature)

use std::fmt;
use std::ptr::NonNull;

use serde::Serialize;

pub mod dummy;
pub mod error;
#[cfg(feature = "rocm")]
pub mod hip;
pub mod system;

pub use dummy::{DummyBackend, DummyBackendStats};
pub use error::{BackendError, BackendResult};
#[cfg(feature = "rocm")]
pub use hip::HipBackend;
pub use system::SystemBackend;

/// Memory class a chunk belongs to. Fixed for the lifetime of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Ordinary host-resident memory
    Host,
    /// Device-resident memory
    Device,
}

impl MemoryKind {
    pub fn is_device(self) -> bool {
        matches!(self, MemoryKind::Device)
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Host => write!(f, "host"),
            MemoryKind::Device => write!(f, "device"),
        }
    }
}

/// System-level allocator for host and device memory.
///
/// Calls are assumed to be orders of magnitude slower than a pool hit.
/// Implementations must be usable from any thread; the pool serializes its
/// own calls but makes no promise about which thread they come from.
pub trait MemoryBackend: Send + Sync {
    /// Allocate `size` bytes of `kind` memory. `size` is never zero.
    fn allocate(&self, size: usize, kind: MemoryKind) -> BackendResult<NonNull<u8>>;

    /// Release a region previously returned by [`allocate`](Self::allocate)
    /// with the same `size` and `kind`. Must not fail.
    fn release(&self, ptr: NonNull<u8>, size: usize, kind: MemoryKind);

    /// Short name used in log output
    fn name(&self) -> &'static str {
        "backend"
    }
}

impl<B: MemoryBackend + ?Sized> MemoryBackend for Box<B> {
    fn allocate(&self, size: usize, kind: MemoryKind) -> BackendResult<NonNull<u8>> {
        (**self).allocate(size, kind)
    }

    fn release(&self, ptr: NonNull<u8>, size: usize, kind: MemoryKind) {
        (**self).release(ptr, size, kind)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
