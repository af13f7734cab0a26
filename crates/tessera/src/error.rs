//! Unified error type for Tessera.

use tessera_buffer::BufferError;
use tessera_protocol::ProtocolError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates a `From` impl,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TesseraError {
    /// Framing failed (bad length header, oversized frame).
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Encoding or decoding an object failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The socket failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An earlier error left the connection's session state unusable.
    ///
    /// The two ends can no longer be assumed to agree on their code
    /// tables, so every call after the first failure returns this.
    #[error("connection closed after an earlier failure")]
    Poisoned,

    /// The peer closed the connection in the middle of a frame.
    #[error("connection closed mid-frame with {0} bytes buffered")]
    UnexpectedEof(usize),
}
