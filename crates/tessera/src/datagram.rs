//! Objects over UDP.
//!
//! A [`DatagramChannel`] sends one object per datagram through a
//! [`DatagramSequencer`], so type and intern descriptors are repeated
//! until the peer's piggybacked acknowledgments confirm them. Lost,
//! duplicated and reordered datagrams are expected; stale ones are
//! silently dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use tessera_buffer::{ByteSink, ByteSource};
use tessera_protocol::{DatagramSequencer, Object, ProtocolError, Registry};
use tokio::net::{ToSocketAddrs, UdpSocket};

use crate::TesseraError;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_LEN: usize = 65_507;

/// A connected UDP socket speaking the unreliable object protocol.
pub struct DatagramChannel {
    socket: UdpSocket,
    sequencer: DatagramSequencer,
    sink: ByteSink,
    recv_buf: Vec<u8>,
    poisoned: bool,
}

impl DatagramChannel {
    /// Binds to `local` and connects to `peer`.
    pub async fn bind(
        local: impl ToSocketAddrs,
        peer: impl ToSocketAddrs,
        registry: Arc<Registry>,
    ) -> Result<Self, TesseraError> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        tracing::debug!(
            local = ?socket.local_addr().ok(),
            peer = ?socket.peer_addr().ok(),
            "datagram channel connected"
        );
        Ok(Self::new(socket, registry))
    }

    /// Wraps a socket that is already connected to its peer.
    pub fn new(socket: UdpSocket, registry: Arc<Registry>) -> Self {
        Self {
            socket,
            sequencer: DatagramSequencer::new(registry),
            sink: ByteSink::new(),
            recv_buf: vec![0; MAX_DATAGRAM_LEN],
            poisoned: false,
        }
    }

    /// Sends `object` in one datagram and returns its sequence number.
    ///
    /// An encode error does not close the channel: the failed datagram is
    /// never sent and its mappings are described again next time.
    pub async fn send(&mut self, object: &dyn Object) -> Result<u32, TesseraError> {
        if self.poisoned {
            return Err(TesseraError::Poisoned);
        }
        self.sink.clear();
        let seq = self.sequencer.write_datagram(&mut self.sink, object)?;
        let datagram = self.sink.flip();
        if datagram.len() > MAX_DATAGRAM_LEN {
            return Err(ProtocolError::InvalidMessage(format!(
                "datagram of {} bytes exceeds {MAX_DATAGRAM_LEN}",
                datagram.len()
            ))
            .into());
        }
        self.socket.send(datagram).await?;
        tracing::trace!(seq, bytes = datagram.len(), "datagram sent");
        Ok(seq)
    }

    /// Receives the next datagram.
    ///
    /// Returns `Ok(None)` for a stale datagram (duplicate or overtaken),
    /// which is dropped. A decode error closes the channel, since the
    /// peer's tables can no longer be trusted.
    pub async fn recv(&mut self) -> Result<Option<Box<dyn Object>>, TesseraError> {
        if self.poisoned {
            return Err(TesseraError::Poisoned);
        }
        let n = self.socket.recv(&mut self.recv_buf).await?;
        let mut source = ByteSource::new(&self.recv_buf[..n]);
        match self.sequencer.read_datagram(&mut source) {
            Ok(object) => Ok(object),
            Err(err) => {
                tracing::warn!(error = %err, "datagram channel failed, closing session");
                self.poisoned = true;
                Err(err.into())
            }
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TesseraError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn sequencer(&self) -> &DatagramSequencer {
        &self.sequencer
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }
}
