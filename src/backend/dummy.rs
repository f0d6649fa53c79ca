//! Dummy backend for unit testing
//!
//! Hands out fake addresses (`16 + offset`) instead of real memory.
//! Addresses are unique and never reused, so the pool can be exercised without touching
//! host or GPU memory. Every call is counted so tests can assert exactly how
//! often the pool went to the backend.
//!
//! The pool never dereferences the addresses it lends; neither may callers
//! of a pool built on this backend.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::Mutex;

use super::{BackendError, BackendResult, MemoryBackend, MemoryKind};

/// Base of the fake address space
const FAKE_BASE: usize = 16;

/// Call accounting for [`DummyBackend`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DummyBackendStats {
    /// Number of allocate() calls for host memory
    pub host_allocs: usize,
    /// Number of allocate() calls for device memory
    pub device_allocs: usize,
    /// Number of release() calls (both kinds)
    pub releases: usize,
    /// Bytes handed out and not yet released
    pub live_bytes: usize,
    /// Total bytes ever handed out
    pub total_allocated_bytes: usize,
}

impl DummyBackendStats {
    /// Total allocate() calls across both kinds
    pub fn allocs(&self) -> usize {
        self.host_allocs + self.device_allocs
    }
}

#[derive(Debug, Default)]
struct DummyState {
    next_offset: usize,
    live: HashMap<usize, (usize, MemoryKind)>,
    stats: DummyBackendStats,
}

/// Fake-address backend with call accounting
#[derive(Debug)]
pub struct DummyBackend {
    state: Mutex<DummyState>,
    /// Alignment of handed-out addresses
    alignment: usize,
    /// Maximum live bytes before allocate() reports exhaustion
    limit: Option<usize>,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DummyState::default()),
            alignment: 8,
            limit: None,
        }
    }

    /// Fail allocations once more than `bytes` would be live
    pub fn with_limit(mut self, bytes: usize) -> Self {
        self.limit = Some(bytes);
        self
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> DummyBackendStats {
        self.lock().stats.clone()
    }

    /// Number of regions handed out and not yet released
    pub fn live_regions(&self) -> usize {
        self.lock().live.len()
    }

    /// Whether `ptr` is a region this backend currently considers live
    pub fn is_live(&self, ptr: NonNull<u8>) -> bool {
        self.lock().live.contains_key(&(ptr.as_ptr() as usize))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DummyState> {
        // Poisoned only by a failed assertion in release()
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn align_offset(&self, offset: usize) -> usize {
        ((offset + self.alignment - 1) / self.alignment) * self.alignment
    }
}

impl MemoryBackend for DummyBackend {
    fn allocate(&self, size: usize, kind: MemoryKind) -> BackendResult<NonNull<u8>> {
        let mut state = self.lock();

        if let Some(limit) = self.limit {
            if state.stats.live_bytes + size > limit {
                return Err(BackendError::OutOfMemory { size, kind });
            }
        }

        let offset = self.align_offset(state.next_offset);
        // Zero-size regions still get a distinct address
        state.next_offset = offset + size.max(1);
        let addr = FAKE_BASE + offset;

        state.live.insert(addr, (size, kind));
        match kind {
            MemoryKind::Host => state.stats.host_allocs += 1,
            MemoryKind::Device => state.stats.device_allocs += 1,
        }
        state.stats.live_bytes += size;
        state.stats.total_allocated_bytes += size;

        NonNull::new(addr as *mut u8).ok_or(BackendError::OutOfMemory { size, kind })
    }

    fn release(&self, ptr: NonNull<u8>, size: usize, kind: MemoryKind) {
        let mut state = self.lock();
        let addr = ptr.as_ptr() as usize;

        match state.live.remove(&addr) {
            Some(region) => assert_eq!(
                region,
                (size, kind),
                "DummyBackend: release of {:#x} does not match its allocation",
                addr
            ),
            None => panic!("DummyBackend: release of unknown region {:#x}", addr),
        }
        state.stats.releases += 1;
        state.stats.live_bytes -= size;
    }

    fn name(&self) -> &'static str {
        "dummy"
    }
}
