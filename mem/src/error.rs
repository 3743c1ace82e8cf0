//! Error types for buffer operations

use thiserror::Error;

/// Error type for buffer operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The byte count of a sequence does not match the length declared by
    /// transport framing.
    #[error("length mismatch: declared {declared}, received {received}")]
    LengthMismatch { declared: usize, received: usize },
}
