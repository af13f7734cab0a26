//! Numbered datagrams with piggybacked acknowledgments.
//!
//! The unreliable encoder needs to be told when the peer has cached a
//! descriptor. A [`DatagramSequencer`] gets that information for free:
//! every outgoing datagram carries its own sequence number and the number
//! of the last datagram received from the peer.
//!
//! ```text
//! [u32 seq][u32 last received][object]
//! ```
//!
//! When the sequencer writes a datagram that described new mappings, it
//! keeps a send record `{seq, pending set}`. When the peer later
//! acknowledges that `seq`, those mappings are confirmed. Records older
//! than the acknowledged one belong to datagrams that were lost or
//! overtaken; they are dropped, and their mappings stay unconfirmed, so
//! the next datagram that uses them describes them again.

use std::collections::VecDeque;
use std::sync::Arc;

use tessera_buffer::{ByteSink, ByteSource};
use tracing::debug;

use crate::{Object, ObjectDecoder, ObjectEncoder, PendingAckSet, ProtocolError, Registry, Unreliable};

/// Most send records kept while waiting for acknowledgments. Past this
/// the oldest is dropped; its mappings stay unconfirmed and are described
/// again.
pub const MAX_SEND_RECORDS: usize = 256;

/// Which mappings a sent datagram described.
#[derive(Debug)]
struct SendRecord {
    seq: u32,
    described: PendingAckSet,
}

/// Pairs an unreliable encoder and decoder for one peer.
#[derive(Debug)]
pub struct DatagramSequencer {
    encoder: ObjectEncoder<Unreliable>,
    decoder: ObjectDecoder,
    last_sent: u32,
    last_received: u32,
    missed: u32,
    send_records: VecDeque<SendRecord>,
}

impl DatagramSequencer {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_parts(
            ObjectEncoder::unreliable(Arc::clone(&registry)),
            ObjectDecoder::unreliable(registry),
        )
    }

    /// Builds a sequencer around an existing encoder and decoder.
    pub fn with_parts(encoder: ObjectEncoder<Unreliable>, decoder: ObjectDecoder) -> Self {
        Self {
            encoder,
            decoder,
            last_sent: 0,
            last_received: 0,
            missed: 0,
            send_records: VecDeque::new(),
        }
    }

    /// Writes one datagram carrying `object` and returns its sequence number.
    ///
    /// On error the sink holds a partial datagram and must not be sent.
    /// The session stays usable: the failed datagram's mappings were never
    /// recorded, so they are described again the next time they are used.
    pub fn write_datagram(
        &mut self,
        sink: &mut ByteSink,
        object: &dyn Object,
    ) -> Result<u32, ProtocolError> {
        self.last_sent = self.last_sent.wrapping_add(1);
        let seq = self.last_sent;
        sink.write_u32(seq);
        sink.write_u32(self.last_received);

        self.encoder.begin_datagram();
        self.encoder.write_object(sink, object)?;

        let described = self.encoder.take_pending();
        if !described.is_empty() {
            if self.send_records.len() >= MAX_SEND_RECORDS {
                if let Some(dropped) = self.send_records.pop_front() {
                    debug!(seq = dropped.seq, "dropping unacknowledged send record");
                }
            }
            self.send_records.push_back(SendRecord { seq, described });
        }
        Ok(seq)
    }

    /// Reads one datagram.
    ///
    /// Returns `Ok(None)` for a duplicate or out-of-order datagram, which
    /// is dropped without being decoded.
    ///
    /// # Errors
    /// Any decode error. A [`ProtocolError::ConflictingMapping`] means the
    /// session is beyond repair.
    pub fn read_datagram(
        &mut self,
        source: &mut ByteSource<'_>,
    ) -> Result<Option<Box<dyn Object>>, ProtocolError> {
        let seq = source.read_u32()?;
        let acked = source.read_u32()?;

        if seq <= self.last_received {
            debug!(seq, last_received = self.last_received, "dropping stale datagram");
            return Ok(None);
        }
        self.missed = seq - self.last_received - 1;
        self.last_received = seq;
        if self.missed > 0 {
            debug!(seq, missed = self.missed, "datagrams missed");
        }

        self.confirm_through(acked)?;

        let object = self.decoder.read_object(source)?;
        object
            .map(Some)
            .ok_or_else(|| ProtocolError::InvalidMessage("datagram carries a null object".into()))
    }

    /// Applies the peer's acknowledgment of `acked`.
    fn confirm_through(&mut self, acked: u32) -> Result<(), ProtocolError> {
        while let Some(record) = self.send_records.front() {
            if record.seq > acked {
                break;
            }
            let Some(record) = self.send_records.pop_front() else {
                break;
            };
            if record.seq == acked {
                debug!(seq = acked, mappings = record.described.len(), "datagram acknowledged");
                self.encoder.note_mappings_received(&record.described)?;
            }
        }
        Ok(())
    }

    /// Number of the last datagram written.
    pub fn last_sent(&self) -> u32 {
        self.last_sent
    }

    /// Number of the last datagram accepted.
    pub fn last_received(&self) -> u32 {
        self.last_received
    }

    /// Datagrams skipped between the last two accepted ones.
    pub fn missed_count(&self) -> u32 {
        self.missed
    }

    /// Sent datagrams that described mappings and are not yet acknowledged.
    pub fn unacknowledged(&self) -> usize {
        self.send_records.len()
    }

    pub fn encoder(&self) -> &ObjectEncoder<Unreliable> {
        &self.encoder
    }

    pub fn decoder(&self) -> &ObjectDecoder {
        &self.decoder
    }
}
