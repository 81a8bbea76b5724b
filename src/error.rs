use std::io;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the encoder and the reader.
///
/// The encoder guarantees that no complete frame is committed past a
/// `frame_end` boundary when it fails; partial bytes may still have reached
/// the sink (the frame hook is the recovery seam for transactional sinks).
#[derive(Debug, Error)]
pub enum Error {
    /// Unparseable format string, unsupported verb, or a verb whose argument
    /// has an incompatible type.
    #[error("malformed format string: {0}")]
    BadFormat(String),

    /// Argument count does not match the format string's verb count.
    #[error("argument count mismatch: format expects {expected}, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// The sink reported an I/O failure.
    #[error("sink write failed: {0}")]
    Write(#[from] io::Error),

    /// The stream carries a hash with no entry in the decode index.
    #[error("unknown format hash {hash:#010x}")]
    UnknownHash { hash: u32 },

    /// The stream carries a filename hash with no entry in the decode index.
    #[error("unknown filename hash {hash:#06x}")]
    UnknownFilename { hash: u16 },

    /// The string index in the frame does not match the handler's index.
    #[error("string index mismatch: frame has {frame}, handler has {handler}")]
    IndexMismatch { frame: u32, handler: u32 },

    /// The stream ended in the middle of a frame.
    #[error("truncated stream: needed {needed} bytes at offset {offset}")]
    ShortRead { needed: usize, offset: usize },
}
