//! Length-prefixed frames for the reliable, stream-oriented channel.
//!
//! A stream transport (TCP) has no message boundaries, so every message
//! is wrapped in a frame:
//!
//! ```text
//! [u32 big-endian: total frame length, header included][payload]
//! ```
//!
//! [`FrameWriter`] builds frames in place: it reserves the header up front,
//! lets the encoder append the payload, and patches the length in at the
//! end. No byte of the payload is ever copied to make room for the header.
//!
//! [`FrameReader`] is the other half. Bytes arrive from the socket in
//! arbitrary chunks; the reader buffers them and hands out one complete
//! payload at a time.

use crate::{BufferError, ByteSink, ByteSource};

/// Size of the length header at the start of every frame.
pub const HEADER_SIZE: usize = 4;

/// Default upper bound on the size of an incoming frame (512 KiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 512 * 1024;

const HEADER_PLACEHOLDER: [u8; HEADER_SIZE] = [0; HEADER_SIZE];

// ---------------------------------------------------------------------------
// FrameWriter
// ---------------------------------------------------------------------------

/// Builds one frame at a time on top of a [`ByteSink`].
///
/// The writer is meant to be owned by the single task that writes to a
/// connection. It has no internal locking.
///
/// ```
/// use tessera_buffer::FrameWriter;
///
/// let mut frame = FrameWriter::new();
/// frame.payload_mut().put_slice(b"abc");
/// assert_eq!(frame.finalize_frame().unwrap(), &[0, 0, 0, 7, b'a', b'b', b'c']);
///
/// frame.reset_frame();
/// assert_eq!(frame.payload_len(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct FrameWriter {
    sink: ByteSink,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::with_capacity(ByteSink::DEFAULT_CAPACITY)
    }

    /// Creates a writer whose sink starts with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut sink = ByteSink::with_capacity(capacity);
        sink.put_slice(&HEADER_PLACEHOLDER);
        Self { sink }
    }

    /// The sink to append payload bytes to.
    ///
    /// The header placeholder is already in the sink; callers only append.
    pub fn payload_mut(&mut self) -> &mut ByteSink {
        &mut self.sink
    }

    /// Number of payload bytes written so far (header excluded).
    pub fn payload_len(&self) -> usize {
        self.sink.len() - HEADER_SIZE
    }

    /// Writes the total frame length into the header and returns the whole
    /// frame, header included, ready for a single write to the socket.
    ///
    /// # Errors
    /// [`BufferError::FrameTooLarge`] if the frame does not fit a u32 length.
    pub fn finalize_frame(&mut self) -> Result<&[u8], BufferError> {
        let len = self.sink.len();
        let declared = u32::try_from(len).map_err(|_| BufferError::FrameTooLarge {
            len,
            max: u32::MAX as usize,
        })?;
        self.sink.overwrite(0, &declared.to_be_bytes())?;
        Ok(self.sink.flip())
    }

    /// Discards the current frame and re-reserves the header.
    pub fn reset_frame(&mut self) {
        self.sink.clear();
        self.sink.put_slice(&HEADER_PLACEHOLDER);
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// FrameReader
// ---------------------------------------------------------------------------

/// Reassembles frames from a byte stream delivered in arbitrary chunks.
///
/// The payload returned by [`next_frame`](Self::next_frame) borrows the
/// reader's buffer. The frame's bytes are released on the next call to
/// `push` or `next_frame`.
#[derive(Debug)]
pub struct FrameReader {
    buffer: Vec<u8>,
    /// Length of the frame most recently handed out, still at the front
    /// of `buffer`.
    served: usize,
    max_frame_len: usize,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a reader that rejects frames longer than `max_frame_len`
    /// bytes (header included).
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            served: 0,
            max_frame_len,
        }
    }

    /// Appends bytes received from the transport.
    pub fn push(&mut self, chunk: &[u8]) {
        self.compact();
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of buffered bytes not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.served
    }

    /// Returns the payload of the next complete frame, or `None` if more
    /// bytes are needed.
    ///
    /// # Errors
    /// - [`BufferError::InvalidFrameLength`] if the header declares fewer
    ///   bytes than the header itself.
    /// - [`BufferError::FrameTooLarge`] if the header declares more than
    ///   the configured maximum.
    ///
    /// Both leave the stream unrecoverable; the connection should be closed.
    pub fn next_frame(&mut self) -> Result<Option<ByteSource<'_>>, BufferError> {
        self.compact();
        if self.buffer.len() < HEADER_SIZE {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&self.buffer[..HEADER_SIZE]);
        let declared = u32::from_be_bytes(header);
        let len = declared as usize;

        if len < HEADER_SIZE {
            return Err(BufferError::InvalidFrameLength(declared));
        }
        if len > self.max_frame_len {
            return Err(BufferError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if self.buffer.len() < len {
            return Ok(None);
        }

        self.served = len;
        Ok(Some(ByteSource::new(&self.buffer[HEADER_SIZE..len])))
    }

    /// Drops the frame handed out last.
    fn compact(&mut self) {
        if self.served > 0 {
            self.buffer.drain(..self.served);
            self.served = 0;
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
