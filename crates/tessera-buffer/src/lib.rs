//! Byte buffers for Tessera.
//!
//! This is the bottom layer of the workspace. It knows nothing about
//! objects, types, or sessions; it only moves bytes around:
//!
//! - **Sink** ([`ByteSink`]): a growable, append-only write buffer.
//! - **Source** ([`ByteSource`]): a bounded read view with mark/reset.
//! - **Frames** ([`FrameWriter`], [`FrameReader`]): the 4-byte
//!   length-prefixed framing used on the reliable channel.
//! - **Errors** ([`BufferError`]): what can go wrong while doing so.
//!
//! ```text
//! Encoder → ByteSink → FrameWriter → socket → FrameReader → ByteSource → Decoder
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod error;
mod frame;
mod sink;
mod source;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use error::BufferError;
pub use frame::{DEFAULT_MAX_FRAME_LEN, FrameReader, FrameWriter, HEADER_SIZE};
pub use sink::ByteSink;
pub use source::ByteSource;
