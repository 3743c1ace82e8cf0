//! Error types for codec and compressor operations

use thiserror::Error;

/// Error type for codec and compressor operations
#[derive(Error, Debug)]
pub enum Error {
    /// The byte count of a sequence does not match the length declared by
    /// transport framing.
    #[error("length mismatch: declared {declared}, received {received}")]
    LengthMismatch { declared: usize, received: usize },

    /// A codec was handed a message type it does not understand.
    #[error("unsupported message type, expected {0}")]
    UnsupportedMessage(&'static str),

    /// A codec failed to serialize or deserialize a message.
    #[error("codec: {0}")]
    Codec(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An I/O failure while compressing or decompressing.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<conduit_mem::Error> for Error {
    fn from(err: conduit_mem::Error) -> Self {
        match err {
            conduit_mem::Error::LengthMismatch { declared, received } => {
                Self::LengthMismatch { declared, received }
            }
        }
    }
}
