//! Pool statistics
//!
//! [`MemoryStats`] counts resize-on-miss events only: bytes grown and number
//! of backend allocations per kind. The counters are cumulative for the
//! lifetime of the pool and are not reset by a drain.
//!
//! [`PoolUsage`] is a point-in-time view of both chunk sets.

use std::fmt;

use serde::Serialize;

use crate::backend::MemoryKind;

const MB: f64 = 1024.0 * 1024.0;

/// Cumulative growth counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Bytes grown for host chunks
    pub host_size: usize,
    /// Number of host backend allocations
    pub host_mallocs: u64,
    /// Bytes grown for device chunks
    pub device_size: usize,
    /// Number of device backend allocations
    pub device_mallocs: u64,
}

impl MemoryStats {
    /// Account for a chunk of `kind` growing by `delta` bytes
    pub(crate) fn record_growth(&mut self, kind: MemoryKind, delta: usize) {
        match kind {
            MemoryKind::Host => {
                self.host_size += delta;
                self.host_mallocs += 1;
            }
            MemoryKind::Device => {
                self.device_size += delta;
                self.device_mallocs += 1;
            }
        }
    }

    /// Bytes grown for `kind`
    pub fn bytes_grown(&self, kind: MemoryKind) -> usize {
        match kind {
            MemoryKind::Host => self.host_size,
            MemoryKind::Device => self.device_size,
        }
    }

    /// Backend allocations for `kind`
    pub fn grow_count(&self, kind: MemoryKind) -> u64 {
        match kind {
            MemoryKind::Host => self.host_mallocs,
            MemoryKind::Device => self.device_mallocs,
        }
    }
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host: {} allocations, {:.2} MB; device: {} allocations, {:.2} MB",
            self.host_mallocs,
            self.host_size as f64 / MB,
            self.device_mallocs,
            self.device_size as f64 / MB
        )
    }
}

/// Snapshot of the available and allocated sets
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolUsage {
    /// Chunks free for reuse
    pub available_chunks: usize,
    /// Capacity of the chunks free for reuse
    pub available_bytes: usize,
    /// Chunks currently lent out
    pub allocated_chunks: usize,
    /// Capacity of the chunks currently lent out
    pub allocated_bytes: usize,
}

impl PoolUsage {
    /// Total chunks owned by the pool
    pub fn chunks(&self) -> usize {
        self.available_chunks + self.allocated_chunks
    }

    /// Total backing bytes owned by the pool
    pub fn bytes(&self) -> usize {
        self.available_bytes + self.allocated_bytes
    }
}
