//! Error types for the protocol layer.
//!
//! Buffer-level failures (short reads, bad UTF-8) are wrapped so callers
//! deal with one error type per layer. Everything else here means either
//! the local setup is wrong (an unregistered type) or the two ends of a
//! session no longer agree on their tables.

use tessera_buffer::BufferError;

/// Errors that can occur while encoding or decoding objects.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Reading or writing the underlying bytes failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// The type is not in the registry.
    ///
    /// On encode this is a configuration error: there is no fallback
    /// encoding for unregistered types. On decode it means the peer sent
    /// a type name this side never registered.
    #[error("type `{0}` is not registered")]
    UnknownType(String),

    /// A second, different type was registered under an existing name.
    #[error("type name `{0}` is already registered to a different type")]
    DuplicateType(String),

    /// The peer described a code that is already mapped to something else.
    ///
    /// The two sides' tables have diverged. This is fatal: nothing decoded
    /// on this session afterwards can be trusted.
    #[error("code {code} is mapped to `{existing}` but the peer described it as `{incoming}`")]
    ConflictingMapping {
        code: u16,
        existing: String,
        incoming: String,
    },

    /// A bare reference arrived for a code that was never described.
    #[error("{kind} code {code} referenced before it was described")]
    UnmappedCode { code: u16, kind: &'static str },

    /// A code that is not valid on the wire (0 as a table slot, or
    /// `i16::MIN`, which has no positive counterpart).
    #[error("invalid code {0} on this channel")]
    InvalidCode(i16),

    /// The session ran out of codes.
    #[error("session code space exhausted")]
    TooManyMappings,

    /// An acknowledgment named a type or string that was never mapped.
    #[error("acknowledged mapping `{0}` was never assigned")]
    UnknownMapping(String),

    /// A decoded object was not of the type the caller asked for.
    #[error("expected `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Objects nested inside polymorphic fields went deeper than the
    /// configured limit.
    #[error("objects nested deeper than {0} levels")]
    NestingTooDeep(usize),

    /// The bytes are well-formed but break a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A configuration document could not be parsed.
    #[cfg(feature = "json")]
    #[error("invalid configuration: {0}")]
    Config(serde_json::Error),
}
