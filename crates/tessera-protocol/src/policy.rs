//! Cache policies: how type and intern references are written.
//!
//! The encoder assigns codes the same way on every channel. What differs
//! is what it may assume about the receiver:
//!
//! - [`Reliable`]: every byte arrives, in order. A descriptor is written
//!   once, the first time its code is used, and never again. The code is
//!   negated when a descriptor follows, so the receiver can check it
//!   against a code it already holds.
//! - [`Unreliable`]: datagrams may be lost. A descriptor is repeated until
//!   the application confirms the peer has it.
//!
//! ## Unreliable reference states
//!
//! ```text
//!   unconfirmed, not yet described this round  →  -code, 1, descriptor
//!   unconfirmed, already described this round  →  -code, 0
//!   confirmed                                   →  +code
//! ```
//!
//! "This round" is the [`PendingAckSet`]: the identities whose descriptor
//! has been written since it was last cleared.

use std::collections::HashSet;

use tessera_buffer::ByteSink;

use crate::ProtocolError;

/// Encoder-side state of one type or intern code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub code: u16,
    /// Whether the receiver is known to have cached this code.
    pub confirmed: bool,
}

impl Mapping {
    /// The code as it appears on the wire: negative until confirmed.
    pub fn wire_code(&self) -> i16 {
        // Codes never exceed i16::MAX; the encoder enforces the limit.
        let code = self.code as i16;
        if self.confirmed { code } else { -code }
    }
}

/// The delivery guarantees a channel provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Reliable,
    Unreliable,
}

/// The identity a code stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKey<'a> {
    Type(&'static str),
    Intern(&'a str),
}

impl MappingKey<'_> {
    /// The text written as the descriptor.
    pub fn descriptor(&self) -> &str {
        match self {
            Self::Type(name) => name,
            Self::Intern(value) => value,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Type(_) => "type",
            Self::Intern(_) => "intern",
        }
    }
}

/// Strategy for writing type and intern references.
///
/// The encoder owns one policy per session and calls it for every
/// reference it writes.
pub trait CachePolicy: Send + 'static {
    fn delivery(&self) -> Delivery;

    /// State of a freshly assigned code.
    fn create_mapping(&self, code: u16) -> Mapping;

    /// Writes the first reference to a newly assigned code.
    fn write_new_mapping(
        &mut self,
        sink: &mut ByteSink,
        key: MappingKey<'_>,
        mapping: Mapping,
    ) -> Result<(), ProtocolError>;

    /// Writes a reference to a code that was assigned earlier.
    fn write_existing_mapping(
        &mut self,
        sink: &mut ByteSink,
        key: MappingKey<'_>,
        mapping: Mapping,
    ) -> Result<(), ProtocolError>;
}

// ---------------------------------------------------------------------------
// Reliable
// ---------------------------------------------------------------------------

/// `-code` and the descriptor once, bare `+code` thereafter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reliable;

impl CachePolicy for Reliable {
    fn delivery(&self) -> Delivery {
        Delivery::Reliable
    }

    fn create_mapping(&self, code: u16) -> Mapping {
        Mapping {
            code,
            confirmed: true,
        }
    }

    fn write_new_mapping(
        &mut self,
        sink: &mut ByteSink,
        key: MappingKey<'_>,
        mapping: Mapping,
    ) -> Result<(), ProtocolError> {
        sink.write_i16(-mapping.wire_code());
        sink.write_utf(key.descriptor())?;
        Ok(())
    }

    fn write_existing_mapping(
        &mut self,
        sink: &mut ByteSink,
        _key: MappingKey<'_>,
        mapping: Mapping,
    ) -> Result<(), ProtocolError> {
        sink.write_i16(mapping.wire_code());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unreliable
// ---------------------------------------------------------------------------

/// Marker after a negative code: a descriptor follows.
pub const MARKER_DESCRIPTOR: u8 = 1;

/// Marker after a negative code: bare reference.
pub const MARKER_BARE: u8 = 0;

/// Type names and intern values described since the set was last cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingAckSet {
    types: HashSet<&'static str>,
    interns: HashSet<String>,
}

impl PendingAckSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key`. Returns `false` if it was already present.
    pub fn insert(&mut self, key: MappingKey<'_>) -> bool {
        match key {
            MappingKey::Type(name) => self.types.insert(name),
            MappingKey::Intern(value) => self.interns.insert(value.to_owned()),
        }
    }

    pub fn contains(&self, key: MappingKey<'_>) -> bool {
        match key {
            MappingKey::Type(name) => self.types.contains(name),
            MappingKey::Intern(value) => self.interns.contains(value),
        }
    }

    pub fn types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.iter().copied()
    }

    pub fn interns(&self) -> impl Iterator<Item = &str> {
        self.interns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len() + self.interns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.interns.is_empty()
    }

    pub fn clear(&mut self) {
        self.types.clear();
        self.interns.clear();
    }
}

/// Repeats descriptors until the application confirms the peer has them.
#[derive(Debug, Clone, Default)]
pub struct Unreliable {
    pending: PendingAckSet,
}

impl Unreliable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &PendingAckSet {
        &self.pending
    }

    pub(crate) fn pending_mut(&mut self) -> &mut PendingAckSet {
        &mut self.pending
    }

    fn write_described(
        &mut self,
        sink: &mut ByteSink,
        key: MappingKey<'_>,
        mapping: Mapping,
    ) -> Result<(), ProtocolError> {
        sink.write_i16(mapping.wire_code());
        sink.write_u8(MARKER_DESCRIPTOR);
        sink.write_utf(key.descriptor())?;
        self.pending.insert(key);
        Ok(())
    }
}

impl CachePolicy for Unreliable {
    fn delivery(&self) -> Delivery {
        Delivery::Unreliable
    }

    fn create_mapping(&self, code: u16) -> Mapping {
        Mapping {
            code,
            confirmed: false,
        }
    }

    fn write_new_mapping(
        &mut self,
        sink: &mut ByteSink,
        key: MappingKey<'_>,
        mapping: Mapping,
    ) -> Result<(), ProtocolError> {
        self.write_described(sink, key, mapping)
    }

    fn write_existing_mapping(
        &mut self,
        sink: &mut ByteSink,
        key: MappingKey<'_>,
        mapping: Mapping,
    ) -> Result<(), ProtocolError> {
        if mapping.confirmed {
            sink.write_i16(mapping.wire_code());
            Ok(())
        } else if self.pending.contains(key) {
            sink.write_i16(mapping.wire_code());
            sink.write_u8(MARKER_BARE);
            Ok(())
        } else {
            tracing::trace!(
                code = mapping.code,
                kind = key.kind(),
                "re-describing unconfirmed mapping"
            );
            self.write_described(sink, key, mapping)
        }
    }
}
