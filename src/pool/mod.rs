//! Recycling memory pool for host and device chunks
//!
//! Calls into the memory backend are orders of magnitude slower than handing
//! out a chunk that was released earlier. The pool keeps every chunk it ever
//! allocated and lends it out again, growing it when a request no longer
//! fits.
//!
//! # Ownership
//!
//! The pool owns every backing region for the whole lifetime of its chunk.
//! Callers only borrow the raw address from [`MemoryPool::acquire`] until the
//! matching [`MemoryPool::release`]; the address never moves in between.
//!
//! # Concurrency
//!
//! One mutex guards both chunk sets and the statistics. Acquire and release,
//! including the backend calls of a resize, run entirely under that lock.
//! The lock is never held while the caller uses the memory.
//!
//! [`MemoryPool::drain`] takes `&mut self`, so no other thread can be inside
//! the pool while it runs.
//!
//! # Fatal conditions
//!
//! Releasing an address the pool did not lend, draining while chunks are
//! still lent, and a failing backend allocation are caller or system bugs.
//! They panic with a diagnostic and are never reported as `Result`s.
//!
//! # Example
//!
//! ```rust
//! use chunkpool::{MemoryPool, SystemBackend};
//!
//! let mut pool = MemoryPool::new(SystemBackend::new());
//!
//! let buffer = pool.acquire_host(4096);
//! assert!(buffer.is_some());
//! pool.release(buffer);
//!
//! // Served from the pool, no new backend allocation
//! let again = pool.acquire_host(1024);
//! assert_eq!(pool.snapshot().host_mallocs, 1);
//! pool.release(again);
//!
//! pool.drain();
//! ```

mod chunk;
mod policy;
mod stats;

use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::{MemoryBackend, MemoryKind, SystemBackend};
use crate::config::{BackendChoice, PoolConfig};
use crate::error::PoolResult;

use chunk::{Chunk, ChunkList};
use policy::Selection;

pub use stats::{MemoryStats, PoolUsage};

/// State guarded by the pool lock
#[derive(Debug, Default)]
struct Registry {
    available: ChunkList,
    allocated: ChunkList,
    stats: MemoryStats,
    next_id: u64,
}

impl Registry {
    fn new_chunk(&mut self, kind: MemoryKind) -> Chunk {
        let id = self.next_id;
        self.next_id += 1;
        Chunk::empty(id, kind)
    }

    fn usage(&self) -> PoolUsage {
        PoolUsage {
            available_chunks: self.available.len(),
            available_bytes: self.available.bytes(None),
            allocated_chunks: self.allocated.len(),
            allocated_bytes: self.allocated.bytes(None),
        }
    }
}

/// Recycling pool of host and device memory chunks
///
/// Construct one at runtime start and share it by reference (or `Arc`)
/// with every worker. Drop or [`drain`](Self::drain) it at shutdown.
#[derive(Debug)]
pub struct MemoryPool<B: MemoryBackend = SystemBackend> {
    backend: B,
    registry: Mutex<Registry>,
    report_on_drain: bool,
}

impl Default for MemoryPool<SystemBackend> {
    fn default() -> Self {
        Self::new(SystemBackend::new())
    }
}

impl MemoryPool<Box<dyn MemoryBackend>> {
    /// Build a pool with the backend selected by `config`
    pub fn from_config(config: &PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let backend: Box<dyn MemoryBackend> = match config.backend {
            BackendChoice::System => Box::new(SystemBackend::with_alignment(config.alignment)?),
            #[cfg(feature = "rocm")]
            BackendChoice::Hip => Box::new(crate::backend::HipBackend::new(config.device_id)?),
            #[cfg(not(feature = "rocm"))]
            BackendChoice::Hip => {
                return Err(crate::error::ConfigError::BackendUnavailable(
                    "HIP backend requires the `rocm` feature".to_string(),
                )
                .into())
            }
        };

        tracing::info!("MemoryPool: created with {} backend", backend.name());
        Ok(Self::new(backend).with_report_on_drain(config.report_on_drain))
    }
}

impl<B: MemoryBackend> MemoryPool<B> {
    /// Create an empty pool on top of `backend`
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registry: Mutex::new(Registry::default()),
            report_on_drain: false,
        }
    }

    /// Log the statistics snapshot whenever the pool is drained
    pub fn with_report_on_drain(mut self, report_on_drain: bool) -> Self {
        self.report_on_drain = report_on_drain;
        self
    }

    /// The backend this pool allocates from
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Borrow `size` bytes of host memory. See [`acquire`](Self::acquire).
    pub fn acquire_host(&self, size: usize) -> Option<NonNull<u8>> {
        self.acquire(size, MemoryKind::Host)
    }

    /// Borrow `size` bytes of device memory. See [`acquire`](Self::acquire).
    pub fn acquire_device(&self, size: usize) -> Option<NonNull<u8>> {
        self.acquire(size, MemoryKind::Device)
    }

    /// Borrow at least `size` bytes of `kind` memory.
    ///
    /// Returns `None` for `size == 0` without touching the pool. Otherwise
    /// the returned address stays valid until it is passed to
    /// [`release`](Self::release).
    ///
    /// # Panics
    ///
    /// If the backend cannot provide memory for a resize.
    pub fn acquire(&self, size: usize, kind: MemoryKind) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }

        let mut registry = self.lock();

        let mut chunk = match policy::select(&registry.available, size, kind) {
            Selection::Fit(pos) | Selection::Undersized(pos) => registry.available.remove(pos),
            Selection::Fresh => registry.new_chunk(kind),
        };
        debug_assert_eq!(chunk.kind(), kind);

        if chunk.size() < size {
            registry.stats.record_growth(kind, size - chunk.size());
            self.resize(&mut chunk, size);
        } else {
            tracing::trace!(
                "MemoryPool: reusing {} chunk {} ({} bytes) for {} bytes",
                kind,
                chunk.id(),
                chunk.size(),
                size
            );
        }

        let memory = chunk.memory();
        registry.allocated.push(chunk);
        memory
    }

    /// Return memory obtained from [`acquire`](Self::acquire) to the pool.
    ///
    /// `None` is a no-op. The chunk keeps its size and backing region; no
    /// backend call is made.
    ///
    /// # Panics
    ///
    /// If `memory` is not currently lent out by this pool (double release or
    /// foreign memory).
    pub fn release(&self, memory: Option<NonNull<u8>>) {
        let Some(ptr) = memory else {
            return;
        };

        let mut registry = self.lock();
        let Some(pos) = registry.allocated.find(ptr) else {
            drop(registry);
            tracing::error!("MemoryPool: release of unknown address {:?}", ptr);
            panic!(
                "MemoryPool: release of {:?} which is not allocated from this pool \
                 (double release or foreign memory)",
                ptr
            );
        };

        let chunk = registry.allocated.remove(pos);
        tracing::trace!(
            "MemoryPool: released {} chunk {} ({} bytes)",
            chunk.kind(),
            chunk.id(),
            chunk.size()
        );
        registry.available.push(chunk);
    }

    /// Free every available chunk back to the backend.
    ///
    /// Statistics are kept. The pool can be used again afterwards.
    ///
    /// # Panics
    ///
    /// If any chunk is still lent out; that is a leak in the caller.
    pub fn drain(&mut self) {
        let registry = match self.registry.get_mut() {
            Ok(registry) => registry,
            Err(_) => panic!("MemoryPool: drain of a pool corrupted by an earlier panic"),
        };

        if !registry.allocated.is_empty() {
            tracing::error!(
                "MemoryPool: drain with {} chunk(s) ({} bytes) still allocated",
                registry.allocated.len(),
                registry.allocated.bytes(None)
            );
            panic!(
                "MemoryPool: memory leak detected, {} chunk(s) still allocated at drain",
                registry.allocated.len()
            );
        }

        let (chunks, bytes) = release_all(&self.backend, &mut registry.available);
        tracing::info!(
            "MemoryPool: drained {} chunk(s), {} bytes returned to {} backend",
            chunks,
            bytes,
            self.backend.name()
        );
        if self.report_on_drain {
            tracing::info!("MemoryPool statistics: {}", registry.stats);
        }
    }

    /// Copy of the cumulative growth counters
    pub fn snapshot(&self) -> MemoryStats {
        self.lock().stats
    }

    /// Point-in-time view of both chunk sets
    pub fn usage(&self) -> PoolUsage {
        self.lock().usage()
    }

    /// Capacity of the available chunks of `kind`
    pub fn available_bytes(&self, kind: MemoryKind) -> usize {
        self.lock().available.bytes(Some(kind))
    }

    /// Replace the chunk's backing region with one of exactly `size` bytes
    fn resize(&self, chunk: &mut Chunk, size: usize) {
        let kind = chunk.kind();
        let old_size = chunk.size();

        if let Some(old) = chunk.take_memory() {
            self.backend.release(old, old_size, kind);
        }

        match self.backend.allocate(size, kind) {
            Ok(memory) => {
                tracing::debug!(
                    "MemoryPool: grew {} chunk {} from {} to {} bytes",
                    kind,
                    chunk.id(),
                    old_size,
                    size
                );
                chunk.install(memory, size);
            }
            Err(err) => {
                tracing::error!(
                    "MemoryPool: {} backend failed to allocate {} {} bytes: {}",
                    self.backend.name(),
                    size,
                    kind,
                    err
                );
                panic!("MemoryPool: backend allocation failed: {}", err);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("MemoryPool: registry lock poisoned, pool state is corrupt"),
        }
    }
}

impl<B: MemoryBackend> Drop for MemoryPool<B> {
    fn drop(&mut self) {
        let registry = self
            .registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);

        if !registry.allocated.is_empty() {
            // Those addresses may still be in use; leaking is the only safe option
            tracing::error!(
                "MemoryPool: dropped with {} chunk(s) ({} bytes) still allocated, leaking them",
                registry.allocated.len(),
                registry.allocated.bytes(None)
            );
        }
        release_all(&self.backend, &mut registry.available);
    }
}

/// Hand every chunk in `list` back to the backend
fn release_all<B: MemoryBackend>(backend: &B, list: &mut ChunkList) -> (usize, usize) {
    let mut chunks = 0;
    let mut bytes = 0;
    for mut chunk in list.take_all() {
        if let Some(memory) = chunk.take_memory() {
            backend.release(memory, chunk.size(), chunk.kind());
            bytes += chunk.size();
        }
        chunks += 1;
    }
    (chunks, bytes)
}
