//! Chunk records and the two chunk sets
//!
//! A [`ChunkList`] is scanned linearly from its head, newest entry first.
//! The number of live chunks is bounded by the number of outstanding
//! requests, not by bytes, so there is no index.

use std::ptr::NonNull;

use crate::backend::MemoryKind;

/// One contiguous backing region owned by the pool
#[derive(Debug)]
pub(crate) struct Chunk {
    /// Identifier for log output only
    id: u64,
    /// Backing region; `None` only for a fresh chunk before its first resize
    memory: Option<NonNull<u8>>,
    /// Capacity of `memory` in bytes, never decreases
    size: usize,
    kind: MemoryKind,
}

// SAFETY: a chunk is only ever reachable through the pool's registry, which
// is guarded by a mutex; the region itself is never dereferenced by the pool.
unsafe impl Send for Chunk {}

impl Chunk {
    /// Fresh chunk with no backing memory
    pub(crate) fn empty(id: u64, kind: MemoryKind) -> Self {
        Self {
            id,
            memory: None,
            size: 0,
            kind,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_memory(id: u64, memory: NonNull<u8>, size: usize, kind: MemoryKind) -> Self {
        Self {
            id,
            memory: Some(memory),
            size,
            kind,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn memory(&self) -> Option<NonNull<u8>> {
        self.memory
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn kind(&self) -> MemoryKind {
        self.kind
    }

    /// Detach the backing region, leaving the chunk without memory.
    /// The recorded size is kept so it can be passed to the backend.
    pub(crate) fn take_memory(&mut self) -> Option<NonNull<u8>> {
        self.memory.take()
    }

    /// Install a new, larger backing region
    pub(crate) fn install(&mut self, memory: NonNull<u8>, size: usize) {
        assert!(self.memory.is_none(), "chunk {} still owns a region", self.id);
        assert!(
            size >= self.size,
            "chunk {} cannot shrink from {} to {} bytes",
            self.id,
            self.size,
            size
        );
        self.memory = Some(memory);
        self.size = size;
    }

    pub(crate) fn holds(&self, ptr: NonNull<u8>) -> bool {
        self.memory == Some(ptr)
    }
}

/// Position of a chunk inside a [`ChunkList`], valid until the list changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkPos(usize);

/// Set of chunks with head insertion and linear scan from the head
#[derive(Debug, Default)]
pub(crate) struct ChunkList {
    // The head of the list is the last element
    chunks: Vec<Chunk>,
}

impl ChunkList {
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert at the head
    pub(crate) fn push(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    /// Unlink the chunk at `pos`, keeping the order of the others
    pub(crate) fn remove(&mut self, pos: ChunkPos) -> Chunk {
        self.chunks.remove(pos.0)
    }

    /// Iterate from the head (most recently inserted) to the tail
    pub(crate) fn iter(&self) -> impl Iterator<Item = (ChunkPos, &Chunk)> + '_ {
        self.chunks
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, chunk)| (ChunkPos(idx), chunk))
    }

    /// Find the chunk whose backing region starts at `ptr`
    pub(crate) fn find(&self, ptr: NonNull<u8>) -> Option<ChunkPos> {
        self.iter()
            .find(|(_, chunk)| chunk.holds(ptr))
            .map(|(pos, _)| pos)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, pos: ChunkPos) -> &Chunk {
        &self.chunks[pos.0]
    }

    pub(crate) fn len(&self) -> usize {
        self.chunks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of chunk capacities, optionally restricted to one kind
    pub(crate) fn bytes(&self, kind: Option<MemoryKind>) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| kind.map_or(true, |k| chunk.kind == k))
            .map(|chunk| chunk.size)
            .sum()
    }

    /// Unlink every chunk, head first
    pub(crate) fn take_all(&mut self) -> impl Iterator<Item = Chunk> {
        std::mem::take(&mut self.chunks).into_iter().rev()
    }
}
