/// Engine error taxonomy.
///
/// Parse-level failures are recoverable: the offending command is logged
/// and dropped, and the engine stays ready. `Internal` marks a broken
/// invariant and is fatal (nonzero exit).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// FEN text that violates the grammar or describes a structurally
    /// impossible placement.
    #[error("malformed position: {0}")]
    MalformedPosition(String),

    /// Move text that does not decode, or names no legal move in the
    /// current position.
    #[error("malformed move: {0}")]
    MalformedMove(String),

    /// Unknown command or parameter shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Broken internal invariant.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
