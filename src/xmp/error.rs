//! Error types for the embedding layer.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single embed or read-back call.
///
/// These never escape the dispatcher as panics; batch callers see them as a
/// per-file `false` plus a log line.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The file signature doesn't match the container its extension claims.
    #[error("not a {expected} file")]
    FormatMismatch { expected: &'static str },

    /// Read, write, rename or permission failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Length fields disagree with the bytes actually present.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// The packet can't be expressed in the container's length field.
    #[error("packet of {size} bytes exceeds the {limit}-byte limit")]
    PacketTooLarge { size: usize, limit: usize },

    /// No embedder handles this file extension.
    #[error("unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),
}

/// Result alias used by every embedder.
pub type EmbedResult<T> = Result<T, EmbedError>;
