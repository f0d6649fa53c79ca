//! Shared fixtures for pool integration tests
//!
//! Most tests run against [`DummyBackend`], which hands out fake addresses
//! and counts every backend call, so they never touch real host or GPU
//! memory. Tests that need to write through the returned pointers use
//! [`SystemBackend`] instead.

#![allow(dead_code)]

use std::ptr::NonNull;

use chunkpool::{DummyBackend, MemoryKind, MemoryPool, SystemBackend};
use once_cell::sync::Lazy;
pub use serial_test::serial;

/// Installs the tracing subscriber once for the whole test binary
static TEST_LOGGING: Lazy<()> = Lazy::new(chunkpool::logging::init_logging_default);

pub fn init_test_logging() {
    Lazy::force(&TEST_LOGGING);
}

/// Pool over a fresh fake-address backend
pub fn dummy_pool() -> MemoryPool<DummyBackend> {
    init_test_logging();
    MemoryPool::new(DummyBackend::new())
}

/// Pool over real host memory
pub fn system_pool() -> MemoryPool<SystemBackend> {
    init_test_logging();
    MemoryPool::new(SystemBackend::new())
}

/// Put chunks of the given sizes into the available set.
///
/// All chunks are acquired first and then released in order, so the last
/// size ends up at the head of the available set. Returns their addresses.
pub fn seed_available(
    pool: &MemoryPool<DummyBackend>,
    kind: MemoryKind,
    sizes: &[usize],
) -> Vec<NonNull<u8>> {
    let ptrs: Vec<NonNull<u8>> = sizes
        .iter()
        .map(|&size| pool.acquire(size, kind).expect("non-zero size"))
        .collect();
    for &ptr in &ptrs {
        pool.release(Some(ptr));
    }
    ptrs
}
