//! Memory backend error types

use thiserror::Error;

use super::MemoryKind;

/// Errors reported by a [`MemoryBackend`](super::MemoryBackend).
///
/// The pool never recovers from these: an allocation error on the
/// resize-on-miss path is fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("out of {kind} memory: failed to allocate {size} bytes")]
    OutOfMemory { size: usize, kind: MemoryKind },
    #[error("invalid allocation layout: size={size} alignment={alignment}")]
    InvalidLayout { size: usize, alignment: usize },
    #[error("{call} failed with HIP error code {code}")]
    Hip { call: &'static str, code: i32 },
}

/// Backend result type
pub type BackendResult<T> = Result<T, BackendError>;

impl BackendError {
    /// Kind of memory the failed request was for, when known
    pub fn kind(&self) -> Option<MemoryKind> {
        match self {
            BackendError::OutOfMemory { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
