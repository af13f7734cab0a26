//! A sequential read view over a fixed byte slice.
//!
//! [`ByteSource`] borrows its data, so it never copies or owns a payload.
//! It supports a single checkpoint (`mark`) that a caller can rewind to,
//! which lets a decoder peek ahead and back out if the bytes turn out to
//! belong to someone else.

use crate::BufferError;

/// Bounded, sequential reader over borrowed bytes.
#[derive(Debug, Clone)]
pub struct ByteSource<'a> {
    data: &'a [u8],
    position: usize,
    mark: Option<usize>,
}

impl<'a> ByteSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            mark: None,
        }
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Returns the next byte, or `None` at end of data.
    ///
    /// Running out of bytes is an ordinary condition here, so it is
    /// reported through `Option` rather than as an error.
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.position)?;
        self.position += 1;
        Some(byte)
    }

    /// Copies up to `len` bytes into `dst[offset..offset + len]`.
    ///
    /// Returns the number of bytes copied, which is `min(len, remaining)`.
    /// Returns `Ok(None)` when `len > 0` and nothing is left to read.
    ///
    /// # Errors
    /// [`BufferError::OutOfBounds`] if the destination range does not fit
    /// inside `dst`.
    pub fn read_into(
        &mut self,
        dst: &mut [u8],
        offset: usize,
        len: usize,
    ) -> Result<Option<usize>, BufferError> {
        match offset.checked_add(len) {
            Some(end) if end <= dst.len() => {}
            _ => {
                return Err(BufferError::OutOfBounds {
                    offset,
                    len,
                    available: dst.len(),
                });
            }
        }
        if len == 0 {
            return Ok(Some(0));
        }
        if self.is_exhausted() {
            return Ok(None);
        }

        let count = len.min(self.remaining());
        dst[offset..offset + count]
            .copy_from_slice(&self.data[self.position..self.position + count]);
        self.position += count;
        Ok(Some(count))
    }

    /// Advances by `min(n, remaining)` and returns how far it moved.
    pub fn skip(&mut self, n: usize) -> usize {
        let skipped = n.min(self.remaining());
        self.position += skipped;
        skipped
    }

    /// Records the current position as the rewind point.
    pub fn mark(&mut self) {
        self.mark = Some(self.position);
    }

    /// Rewinds to the position recorded by the last [`mark`](Self::mark).
    ///
    /// The mark stays set, so a caller may rewind to it more than once.
    pub fn reset_to_mark(&mut self) -> Result<(), BufferError> {
        let mark = self.mark.ok_or(BufferError::NoMarkSet)?;
        self.position = mark;
        Ok(())
    }

    /// Borrows the next `n` bytes and advances past them.
    pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8], BufferError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(BufferError::UnexpectedEnd {
                needed: n,
                remaining,
            });
        }
        let data = self.data;
        let bytes = &data[self.position..self.position + n];
        self.position += n;
        Ok(bytes)
    }

    /// The unread tail, without consuming it.
    pub fn as_slice(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    // -----------------------------------------------------------------
    // Typed readers
    // -----------------------------------------------------------------

    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        self.read_byte().ok_or(BufferError::UnexpectedEnd {
            needed: 1,
            remaining: 0,
        })
    }

    pub fn read_i8(&mut self) -> Result<i8, BufferError> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    /// Any nonzero byte reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool, BufferError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, BufferError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, BufferError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, BufferError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, BufferError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, BufferError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// Reads a u16 length prefix followed by that many UTF-8 bytes.
    pub fn read_utf(&mut self) -> Result<String, BufferError> {
        let len = usize::from(self.read_u16()?);
        let bytes = self.read_exact(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| BufferError::InvalidUtf8)
    }
}
