//! Host allocator backend
//!
//! Serves both memory kinds from host RAM through the global allocator.
//! This is the backend for builds without a GPU runtime: device chunks are
//! still tracked separately by the pool, they just live in host memory.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use super::{BackendError, BackendResult, MemoryBackend, MemoryKind};

/// Backend on top of `std::alloc`
#[derive(Debug, Clone)]
pub struct SystemBackend {
    alignment: usize,
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBackend {
    /// Default alignment, one cache line
    pub const DEFAULT_ALIGNMENT: usize = 64;

    pub fn new() -> Self {
        Self {
            alignment: Self::DEFAULT_ALIGNMENT,
        }
    }

    /// Create a backend with a custom alignment (must be a power of two)
    pub fn with_alignment(alignment: usize) -> BackendResult<Self> {
        if !alignment.is_power_of_two() {
            return Err(BackendError::InvalidLayout { size: 0, alignment });
        }
        Ok(Self { alignment })
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    fn layout(&self, size: usize) -> BackendResult<Layout> {
        Layout::from_size_align(size, self.alignment).map_err(|_| BackendError::InvalidLayout {
            size,
            alignment: self.alignment,
        })
    }
}

impl MemoryBackend for SystemBackend {
    fn allocate(&self, size: usize, kind: MemoryKind) -> BackendResult<NonNull<u8>> {
        if size == 0 {
            return Err(BackendError::InvalidLayout {
                size,
                alignment: self.alignment,
            });
        }
        let layout = self.layout(size)?;

        // SAFETY: layout has a non-zero size
        let ptr = unsafe { alloc::alloc(layout) };

        tracing::trace!("SystemBackend: allocated {} {} bytes at {:?}", size, kind, ptr);
        NonNull::new(ptr).ok_or(BackendError::OutOfMemory { size, kind })
    }

    fn release(&self, ptr: NonNull<u8>, size: usize, kind: MemoryKind) {
        let layout = match self.layout(size) {
            Ok(layout) => layout,
            Err(err) => {
                // Cannot happen for a region this backend handed out
                tracing::error!("SystemBackend: refusing to free {:?}: {}", ptr, err);
                return;
            }
        };
        tracing::trace!("SystemBackend: freeing {} {} bytes at {:?}", size, kind, ptr);

        // SAFETY: ptr was returned by `allocate` with the same size and alignment
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }

    fn name(&self) -> &'static str {
        "system"
    }
}
