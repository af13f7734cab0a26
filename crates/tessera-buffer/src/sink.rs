//! The growable byte sink that every encoder writes into.
//!
//! A [`ByteSink`] is an append-only buffer with an explicit write position.
//! It starts small and doubles on overflow, so a long-lived sink that is
//! cleared between messages quickly settles at the size of the largest
//! message it has carried and stops allocating.
//!
//! All multi-byte values are written big-endian ("network order").

use crate::{BufferError, ByteSource};

/// An append-only byte buffer that grows on demand.
///
/// ## Growth
///
/// When a write does not fit, the capacity becomes
/// `max(capacity * 2, position + needed)`. A fresh buffer is allocated,
/// the written prefix is copied over, and the old buffer is dropped.
/// Bytes already written are never lost or reordered by growth.
#[derive(Debug, Clone)]
pub struct ByteSink {
    /// Backing storage. Its length is the sink's capacity; only
    /// `buf[..position]` holds written data.
    buf: Vec<u8>,
    position: usize,
}

impl ByteSink {
    /// The capacity used by [`ByteSink::new`].
    pub const DEFAULT_CAPACITY: usize = 32;

    /// Creates an empty sink with [`DEFAULT_CAPACITY`](Self::DEFAULT_CAPACITY).
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates an empty sink with room for `capacity` bytes.
    ///
    /// A capacity of zero is bumped to one so doubling always makes progress.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)],
            position: 0,
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.position
    }

    /// Returns `true` if nothing has been written since the last clear.
    pub fn is_empty(&self) -> bool {
        self.position == 0
    }

    /// Current capacity of the backing buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Appends a single byte.
    pub fn write_byte(&mut self, byte: u8) {
        self.expand(1);
        self.buf[self.position] = byte;
        self.position += 1;
    }

    /// Appends `len` bytes of `src` starting at `offset`.
    ///
    /// # Errors
    /// Returns [`BufferError::OutOfBounds`] if `offset + len` runs past the
    /// end of `src`. Nothing is written in that case.
    pub fn write_bytes(
        &mut self,
        src: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<(), BufferError> {
        let end = match offset.checked_add(len) {
            Some(end) if end <= src.len() => end,
            _ => {
                return Err(BufferError::OutOfBounds {
                    offset,
                    len,
                    available: src.len(),
                });
            }
        };
        self.put_slice(&src[offset..end]);
        Ok(())
    }

    /// Appends the whole of `src`.
    pub fn put_slice(&mut self, src: &[u8]) {
        if src.is_empty() {
            return;
        }
        self.expand(src.len());
        self.buf[self.position..self.position + src.len()].copy_from_slice(src);
        self.position += src.len();
    }

    /// Overwrites already-written bytes starting at `at`.
    ///
    /// Used to patch headers after the payload size is known.
    ///
    /// # Errors
    /// Returns [`BufferError::OutOfBounds`] unless the whole range lies
    /// inside the written region `[0, len())`.
    pub fn overwrite(&mut self, at: usize, bytes: &[u8]) -> Result<(), BufferError> {
        match at.checked_add(bytes.len()) {
            Some(end) if end <= self.position => {
                self.buf[at..end].copy_from_slice(bytes);
                Ok(())
            }
            _ => Err(BufferError::OutOfBounds {
                offset: at,
                len: bytes.len(),
                available: self.position,
            }),
        }
    }

    /// Returns the written range `[0, len())`, ready to be read or sent.
    pub fn flip(&self) -> &[u8] {
        &self.buf[..self.position]
    }

    /// Returns a [`ByteSource`] over the written range.
    pub fn reader(&self) -> ByteSource<'_> {
        ByteSource::new(self.flip())
    }

    /// Discards the written bytes. The capacity is retained.
    pub fn clear(&mut self) {
        self.position = 0;
    }

    // -----------------------------------------------------------------
    // Typed writers
    // -----------------------------------------------------------------

    pub fn write_u8(&mut self, value: u8) {
        self.write_byte(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_byte(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.put_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.put_slice(&value.to_be_bytes());
    }

    /// Writes a u16 length prefix followed by the UTF-8 bytes of `value`.
    ///
    /// # Errors
    /// Returns [`BufferError::StringTooLong`] if the encoded string is
    /// longer than `u16::MAX` bytes.
    pub fn write_utf(&mut self, value: &str) -> Result<(), BufferError> {
        let len = u16::try_from(value.len())
            .map_err(|_| BufferError::StringTooLong(value.len()))?;
        self.write_u16(len);
        self.put_slice(value.as_bytes());
        Ok(())
    }

    /// Makes room for `needed` more bytes.
    fn expand(&mut self, needed: usize) {
        let required = self.position + needed;
        let capacity = self.buf.len();
        if required <= capacity {
            return;
        }

        let new_capacity = (capacity * 2).max(required);
        let mut grown = vec![0; new_capacity];
        grown[..self.position].copy_from_slice(&self.buf[..self.position]);
        self.buf = grown;

        tracing::trace!(from = capacity, to = new_capacity, "byte sink grew");
    }
}

impl Default for ByteSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sink_is_empty() {
        let sink = ByteSink::new();
        assert!(sink.is_empty());
        assert_eq!(sink.capacity(), ByteSink::DEFAULT_CAPACITY);
        assert_eq!(sink.flip(), &[] as &[u8]);
    }

    #[test]
    fn test_write_byte_appends() {
        let mut sink = ByteSink::new();
        sink.write_byte(1);
        sink.write_byte(2);
        assert_eq!(sink.flip(), &[1, 2]);
    }

    #[test]
    fn test_growth_doubles_capacity() {
        let mut sink = ByteSink::with_capacity(4);
        sink.put_slice(&[1, 2, 3, 4]);
        assert_eq!(sink.capacity(), 4);

        sink.write_byte(5);
        assert_eq!(sink.capacity(), 8);
        assert_eq!(sink.flip(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_growth_jumps_to_required_size() {
        // A write larger than double the capacity sizes the buffer to fit.
        let mut sink = ByteSink::with_capacity(4);
        sink.write_byte(9);
        sink.put_slice(&[0xAA; 20]);
        assert_eq!(sink.capacity(), 21);
        assert_eq!(sink.len(), 21);
        assert_eq!(sink.flip()[0], 9);
    }

    #[test]
    fn test_zero_capacity_still_grows() {
        let mut sink = ByteSink::with_capacity(0);
        sink.write_byte(7);
        sink.write_byte(8);
        assert_eq!(sink.flip(), &[7, 8]);
    }

    #[test]
    fn test_write_bytes_with_offset() {
        let mut sink = ByteSink::new();
        sink.write_bytes(&[1, 2, 3, 4, 5], 1, 3).unwrap();
        assert_eq!(sink.flip(), &[2, 3, 4]);
    }

    #[test]
    fn test_write_bytes_zero_length_is_noop() {
        let mut sink = ByteSink::new();
        sink.write_bytes(&[1, 2, 3], 3, 0).unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_write_bytes_out_of_bounds() {
        let mut sink = ByteSink::new();
        let err = sink.write_bytes(&[1, 2, 3], 2, 2).unwrap_err();
        assert_eq!(
            err,
            BufferError::OutOfBounds {
                offset: 2,
                len: 2,
                available: 3
            }
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_write_bytes_overflowing_offset() {
        let mut sink = ByteSink::new();
        let result = sink.write_bytes(&[1], usize::MAX, 2);
        assert!(matches!(result, Err(BufferError::OutOfBounds { .. })));
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut sink = ByteSink::with_capacity(2);
        sink.put_slice(&[0; 10]);
        let grown = sink.capacity();

        sink.clear();
        assert!(sink.is_empty());
        assert_eq!(sink.capacity(), grown);
    }

    #[test]
    fn test_typed_writes_are_big_endian() {
        let mut sink = ByteSink::new();
        sink.write_u16(0x0102);
        sink.write_i32(-2);
        sink.write_bool(true);
        assert_eq!(sink.flip(), &[0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE, 0x01]);
    }

    #[test]
    fn test_write_utf_prefixes_length() {
        let mut sink = ByteSink::new();
        sink.write_utf("hi").unwrap();
        assert_eq!(sink.flip(), &[0x00, 0x02, b'h', b'i']);
    }

    #[test]
    fn test_write_utf_rejects_oversized_string() {
        let mut sink = ByteSink::new();
        let long = "x".repeat(u16::MAX as usize + 1);
        assert_eq!(
            sink.write_utf(&long),
            Err(BufferError::StringTooLong(u16::MAX as usize + 1))
        );
    }

    #[test]
    fn test_overwrite_patches_written_bytes() {
        let mut sink = ByteSink::new();
        sink.put_slice(&[0, 0, 0, 9]);
        sink.overwrite(1, &[7, 8]).unwrap();
        assert_eq!(sink.flip(), &[0, 7, 8, 9]);
    }

    #[test]
    fn test_overwrite_past_position_fails() {
        let mut sink = ByteSink::new();
        sink.put_slice(&[1, 2]);
        assert!(matches!(
            sink.overwrite(1, &[0, 0]),
            Err(BufferError::OutOfBounds { .. })
        ));
    }
}
