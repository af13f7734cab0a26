/// Errors that can occur while reading or writing byte buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// An `offset`/`len` pair does not fit inside the slice it refers to.
    ///
    /// This is a programmer error: the caller asked for bytes that do not
    /// exist. It is never retried.
    #[error("range {offset}..{offset}+{len} out of bounds for {available} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        available: usize,
    },

    /// `reset_to_mark()` was called without a prior `mark()`.
    #[error("reset requested but no mark is set")]
    NoMarkSet,

    /// A typed read needed more bytes than the source had left.
    #[error("unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A string is too long for its u16 length prefix.
    #[error("string of {0} bytes exceeds the u16 length prefix")]
    StringTooLong(usize),

    /// A length-prefixed string was not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A frame header declared a length smaller than the header itself.
    #[error("invalid frame length {0}")]
    InvalidFrameLength(u32),

    /// A frame is larger than the reader (or the u32 header) allows.
    #[error("frame of {len} bytes exceeds the limit of {max}")]
    FrameTooLarge { len: usize, max: usize },
}
