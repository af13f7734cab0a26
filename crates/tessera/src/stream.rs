//! Objects over a reliable, ordered byte stream.
//!
//! [`ObjectStream`] owns one connection and both halves of its session:
//! an encoder for what it sends and a decoder for what it receives. Each
//! `send` produces one length-prefixed frame; `recv` reassembles frames
//! from whatever chunks the socket delivers.
//!
//! Any error poisons the stream. A failed encode may already have
//! assigned codes the peer will never hear about, and a failed decode
//! means the bytes that follow cannot be located, so there is no safe way
//! to continue on the same connection.

use std::collections::VecDeque;
use std::sync::Arc;

use tessera_buffer::{FrameReader, FrameWriter};
use tessera_protocol::{
    Delivery, Object, ObjectDecoder, ObjectEncoder, ProtocolError, Registry, StreamConfig,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::TesseraError;

const READ_CHUNK: usize = 8 * 1024;

/// A framed, session-caching object connection.
///
/// Works over anything that is `AsyncRead + AsyncWrite`: a `TcpStream`,
/// a TLS stream, or an in-memory `tokio::io::duplex` pipe in tests.
pub struct ObjectStream<S> {
    io: S,
    frame: FrameWriter,
    frames: FrameReader,
    encoder: ObjectEncoder,
    decoder: ObjectDecoder,
    inbox: VecDeque<Box<dyn Object>>,
    chunk: Vec<u8>,
    poisoned: bool,
}

impl ObjectStream<TcpStream> {
    /// Connects to `addr` over TCP.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        registry: Arc<Registry>,
    ) -> Result<Self, TesseraError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        tracing::debug!(peer = ?stream.peer_addr().ok(), "object stream connected");
        Ok(Self::new(stream, registry))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ObjectStream<S> {
    pub fn new(io: S, registry: Arc<Registry>) -> Self {
        Self::with_config(io, registry, &StreamConfig::default())
    }

    pub fn with_config(io: S, registry: Arc<Registry>, config: &StreamConfig) -> Self {
        Self {
            io,
            frame: FrameWriter::with_capacity(config.initial_capacity),
            frames: FrameReader::with_max_frame_len(config.max_frame_len),
            encoder: ObjectEncoder::with_config(Arc::clone(&registry), config),
            decoder: ObjectDecoder::with_config(registry, Delivery::Reliable, config),
            inbox: VecDeque::new(),
            chunk: vec![0; READ_CHUNK],
            poisoned: false,
        }
    }

    /// Sends one object in its own frame.
    pub async fn send(&mut self, object: &dyn Object) -> Result<(), TesseraError> {
        self.send_batch(&[object]).await
    }

    /// Sends several objects in a single frame.
    pub async fn send_batch(&mut self, objects: &[&dyn Object]) -> Result<(), TesseraError> {
        self.ensure_usable()?;
        let result = self.write_frame(objects).await;
        self.poison_on_error(result)
    }

    /// Receives the next object.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly,
    /// between frames.
    pub async fn recv(&mut self) -> Result<Option<Box<dyn Object>>, TesseraError> {
        self.ensure_usable()?;
        let result = self.read_next().await;
        self.poison_on_error(result)
    }

    /// Returns `true` once an error has made the stream unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn encoder(&self) -> &ObjectEncoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &ObjectDecoder {
        &self.decoder
    }

    pub fn get_ref(&self) -> &S {
        &self.io
    }

    /// Gives back the underlying connection. Buffered input is discarded.
    pub fn into_inner(self) -> S {
        self.io
    }

    async fn write_frame(&mut self, objects: &[&dyn Object]) -> Result<(), TesseraError> {
        self.frame.reset_frame();
        for object in objects {
            self.encoder.write_object(self.frame.payload_mut(), *object)?;
        }
        let bytes = self.frame.finalize_frame()?;
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        tracing::trace!(objects = objects.len(), bytes = bytes.len(), "frame sent");
        Ok(())
    }

    async fn read_next(&mut self) -> Result<Option<Box<dyn Object>>, TesseraError> {
        loop {
            if let Some(object) = self.inbox.pop_front() {
                return Ok(Some(object));
            }

            if let Some(mut payload) = self.frames.next_frame()? {
                while !payload.is_exhausted() {
                    let object = self.decoder.read_object(&mut payload)?.ok_or_else(|| {
                        ProtocolError::InvalidMessage("null object at the top level of a frame".into())
                    })?;
                    self.inbox.push_back(object);
                }
                continue;
            }

            let n = self.io.read(&mut self.chunk).await?;
            if n == 0 {
                let buffered = self.frames.buffered();
                return if buffered == 0 {
                    Ok(None)
                } else {
                    Err(TesseraError::UnexpectedEof(buffered))
                };
            }
            self.frames.push(&self.chunk[..n]);
        }
    }

    fn ensure_usable(&self) -> Result<(), TesseraError> {
        if self.poisoned {
            Err(TesseraError::Poisoned)
        } else {
            Ok(())
        }
    }

    fn poison_on_error<T>(&mut self, result: Result<T, TesseraError>) -> Result<T, TesseraError> {
        if let Err(err) = &result {
            tracing::warn!(error = %err, "object stream failed, closing session");
            self.poisoned = true;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_close_between_frames() {
        let registry = Arc::new(Registry::with_basic_types());
        let (a, b) = tokio::io::duplex(64);
        let mut sender = ObjectStream::new(a, Arc::clone(&registry));
        let mut receiver = ObjectStream::new(b, registry);

        sender.send(&5u32).await.unwrap();
        drop(sender);

        let object = receiver.recv().await.unwrap().unwrap();
        assert_eq!(object.downcast_ref::<u32>(), Some(&5));
        assert!(receiver.recv().await.unwrap().is_none());
        assert!(!receiver.is_poisoned());
    }

    #[tokio::test]
    async fn test_close_mid_frame_is_an_error() {
        let registry = Arc::new(Registry::with_basic_types());
        let (mut raw, b) = tokio::io::duplex(64);
        let mut receiver = ObjectStream::new(b, registry);

        // Header promises 10 bytes; only 6 arrive.
        raw.write_all(&[0, 0, 0, 10, 1, 2]).await.unwrap();
        drop(raw);

        let err = receiver.recv().await.unwrap_err();
        assert!(matches!(err, TesseraError::UnexpectedEof(6)));
        assert!(matches!(receiver.recv().await, Err(TesseraError::Poisoned)));
    }
}
