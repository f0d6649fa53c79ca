//! Chunk selection for a `(size, kind)` request
//!
//! Two candidates are tracked while scanning the available set from its
//! head:
//! - the smallest chunk with `size >= requested` (an exact match ends the scan)
//! - the largest chunk with `size < requested`
//!
//! The first is preferred. The second is grown in place, which keeps the
//! backend delta as small as possible. A fresh chunk is only created when
//! no chunk of the requested kind is available at all. On equal sizes the
//! candidate closest to the head wins.

use super::chunk::{ChunkList, ChunkPos};
use crate::backend::MemoryKind;

/// Outcome of a scan of the available set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Selection {
    /// A chunk large enough for the request
    Fit(ChunkPos),
    /// The largest undersized chunk; must be grown before use
    Undersized(ChunkPos),
    /// No chunk of the requested kind is available
    Fresh,
}

pub(crate) fn select(available: &ChunkList, size: usize, kind: MemoryKind) -> Selection {
    let mut fit: Option<(ChunkPos, usize)> = None;
    let mut undersized: Option<(ChunkPos, usize)> = None;

    for (pos, chunk) in available.iter() {
        if chunk.kind() != kind {
            continue;
        }
        let candidate = chunk.size();

        if candidate < size {
            if undersized.map_or(true, |(_, best)| best < candidate) {
                undersized = Some((pos, candidate));
            }
        } else if fit.map_or(true, |(_, best)| candidate < best) {
            fit = Some((pos, candidate));
            if candidate == size {
                break;
            }
        }
    }

    match (fit, undersized) {
        (Some((pos, _)), _) => Selection::Fit(pos),
        (None, Some((pos, _))) => Selection::Undersized(pos),
        (None, None) => Selection::Fresh,
    }
}
