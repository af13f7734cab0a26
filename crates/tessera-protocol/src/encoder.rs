//! The encoding half of a session.
//!
//! An [`ObjectEncoder`] owns everything one direction of one connection
//! needs to write objects: the code assignments for types and interned
//! strings, and the cache policy that decides how references are written.
//! It writes into a caller-provided [`ByteSink`], so the same encoder can
//! feed a frame writer (reliable) or a datagram buffer (unreliable).
//!
//! Payload hooks never see the encoder directly. They get an
//! [`ObjectWriter`], a short-lived view bundling the sink with the session
//! state, which is what lets a nested object or interned string inside a
//! payload share the session's tables.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_buffer::{BufferError, ByteSink};
use tracing::{debug, trace};

use crate::{
    CachePolicy, Field, Mapping, MappingKey, Object, PendingAckSet, ProtocolError, Registry,
    Reliable, StreamConfig, Unreliable,
};

/// Code assignments for one session.
#[derive(Debug)]
struct EncoderTables {
    registry: Arc<Registry>,
    types: HashMap<&'static str, Mapping>,
    interns: HashMap<String, Mapping>,
    next_type_code: u16,
    next_intern_code: u16,
    code_limit: u16,
}

/// Hands out the next code, starting at 1. Code 0 is null on the wire.
fn assign_code(next: &mut u16, limit: u16) -> Result<u16, ProtocolError> {
    if *next > limit {
        return Err(ProtocolError::TooManyMappings);
    }
    let code = *next;
    *next += 1;
    Ok(code)
}

/// Writes objects for one session direction.
///
/// The policy parameter picks the channel: `ObjectEncoder` (the default,
/// [`Reliable`]) for ordered streams, `ObjectEncoder<Unreliable>` for
/// datagrams.
#[derive(Debug)]
pub struct ObjectEncoder<P: CachePolicy = Reliable> {
    tables: EncoderTables,
    policy: P,
}

impl ObjectEncoder<Reliable> {
    /// A reliable-channel encoder with the default configuration.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, &StreamConfig::default())
    }
}

impl ObjectEncoder<Unreliable> {
    /// An unreliable-channel encoder with the default configuration.
    pub fn unreliable(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, &StreamConfig::default())
    }

    /// Marks every identity in `acked` as cached by the peer.
    ///
    /// Call this once the application knows, by whatever means, that the
    /// peer received the descriptors in question. From then on those
    /// identities are written as bare positive codes.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownMapping`] if an identity was never assigned
    /// a code by this encoder. Identities before it are still confirmed.
    pub fn note_mappings_received(&mut self, acked: &PendingAckSet) -> Result<(), ProtocolError> {
        for type_name in acked.types() {
            self.note_type_mapping_received(type_name)?;
        }
        for value in acked.interns() {
            self.note_intern_mapping_received(value)?;
        }
        Ok(())
    }

    pub fn note_type_mapping_received(&mut self, type_name: &str) -> Result<(), ProtocolError> {
        let mapping = self
            .tables
            .types
            .get_mut(type_name)
            .ok_or_else(|| ProtocolError::UnknownMapping(type_name.to_owned()))?;
        if !mapping.confirmed {
            mapping.confirmed = true;
            debug!(code = mapping.code, type_name, "type mapping confirmed");
        }
        Ok(())
    }

    pub fn note_intern_mapping_received(&mut self, value: &str) -> Result<(), ProtocolError> {
        let mapping = self
            .tables
            .interns
            .get_mut(value)
            .ok_or_else(|| ProtocolError::UnknownMapping(value.to_owned()))?;
        if !mapping.confirmed {
            mapping.confirmed = true;
            debug!(code = mapping.code, value, "intern mapping confirmed");
        }
        Ok(())
    }

    /// Identities described since the pending set was last cleared.
    pub fn pending(&self) -> &PendingAckSet {
        self.policy.pending()
    }

    /// Starts a new round: the next use of every unconfirmed identity
    /// carries its descriptor again.
    pub fn begin_datagram(&mut self) {
        self.policy.pending_mut().clear();
    }

    /// Takes the identities described in the current round, leaving the
    /// pending set empty.
    pub fn take_pending(&mut self) -> PendingAckSet {
        std::mem::take(self.policy.pending_mut())
    }
}

impl<P: CachePolicy + Default> ObjectEncoder<P> {
    pub fn with_config(registry: Arc<Registry>, config: &StreamConfig) -> Self {
        Self::with_policy(registry, P::default(), config)
    }
}

impl<P: CachePolicy> ObjectEncoder<P> {
    pub fn with_policy(registry: Arc<Registry>, policy: P, config: &StreamConfig) -> Self {
        Self {
            tables: EncoderTables {
                registry,
                types: HashMap::new(),
                interns: HashMap::new(),
                next_type_code: 1,
                next_intern_code: 1,
                code_limit: config.code_limit(),
            },
            policy,
        }
    }

    /// A writer over `sink` that shares this session's state.
    pub fn writer<'a>(&'a mut self, sink: &'a mut ByteSink) -> ObjectWriter<'a> {
        ObjectWriter {
            sink,
            tables: &mut self.tables,
            policy: &mut self.policy,
        }
    }

    /// Writes `object` (type reference + payload) to `sink`.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownType`] if the object's type, or the type of
    /// anything nested in it, is not registered. The sink may hold a
    /// partial object afterwards and should be discarded.
    ///
    /// On a reliable channel the encoder must be discarded too: codes
    /// assigned before the failure are never described again, and the peer
    /// did not receive them. An unreliable encoder stays usable, since an
    /// unconfirmed code is described again in the next round.
    pub fn write_object(&mut self, sink: &mut ByteSink, object: &dyn Object) -> Result<(), ProtocolError> {
        self.writer(sink).write_object(Some(object))
    }

    /// Like [`write_object`](Self::write_object), but `None` writes the
    /// null code.
    pub fn write_nullable(
        &mut self,
        sink: &mut ByteSink,
        object: Option<&dyn Object>,
    ) -> Result<(), ProtocolError> {
        self.writer(sink).write_object(object)
    }

    /// The mapping assigned to a type name, if any.
    pub fn mapping(&self, type_name: &str) -> Option<Mapping> {
        self.tables.types.get(type_name).copied()
    }

    /// The mapping assigned to an interned string, if any.
    pub fn intern_mapping(&self, value: &str) -> Option<Mapping> {
        self.tables.interns.get(value).copied()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.tables.registry
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }
}

// ---------------------------------------------------------------------------
// ObjectWriter
// ---------------------------------------------------------------------------

/// The view of a session handed to payload hooks.
pub struct ObjectWriter<'a> {
    sink: &'a mut ByteSink,
    tables: &'a mut EncoderTables,
    policy: &'a mut dyn CachePolicy,
}

impl ObjectWriter<'_> {
    /// The raw sink, for payloads that write bytes directly.
    pub fn sink(&mut self) -> &mut ByteSink {
        &mut *self.sink
    }

    /// Writes a type reference and payload, or the null code for `None`.
    pub fn write_object(&mut self, object: Option<&dyn Object>) -> Result<(), ProtocolError> {
        let Some(object) = object else {
            self.sink.write_i16(0);
            return Ok(());
        };
        // Resolve before assigning a code, so an unregistered type leaves
        // the tables untouched.
        let entry = Arc::clone(self.tables.registry.resolve(object)?);
        self.write_reference(MappingKey::Type(entry.name()))?;
        (entry.write)(object, self)
    }

    /// Writes an interned string reference, or the null code for `None`.
    pub fn write_intern(&mut self, value: Option<&str>) -> Result<(), ProtocolError> {
        match value {
            Some(value) => self.write_reference(MappingKey::Intern(value)),
            None => {
                self.sink.write_i16(0);
                Ok(())
            }
        }
    }

    /// Writes `value` with its default field encoding.
    pub fn write_field<T: Field>(&mut self, value: &T) -> Result<(), ProtocolError> {
        value.write_field(self)
    }

    fn write_reference(&mut self, key: MappingKey<'_>) -> Result<(), ProtocolError> {
        let existing = match key {
            MappingKey::Type(name) => self.tables.types.get(name),
            MappingKey::Intern(value) => self.tables.interns.get(value),
        };
        if let Some(&mapping) = existing {
            return self.policy.write_existing_mapping(self.sink, key, mapping);
        }

        // Reject an oversized descriptor before it takes a code.
        let descriptor_len = key.descriptor().len();
        if descriptor_len > usize::from(u16::MAX) {
            return Err(BufferError::StringTooLong(descriptor_len).into());
        }

        let tables = &mut *self.tables;
        let mapping = match key {
            MappingKey::Type(name) => {
                let code = assign_code(&mut tables.next_type_code, tables.code_limit)?;
                let mapping = self.policy.create_mapping(code);
                tables.types.insert(name, mapping);
                mapping
            }
            MappingKey::Intern(value) => {
                let code = assign_code(&mut tables.next_intern_code, tables.code_limit)?;
                let mapping = self.policy.create_mapping(code);
                tables.interns.insert(value.to_owned(), mapping);
                mapping
            }
        };
        trace!(code = mapping.code, kind = key.kind(), descriptor = key.descriptor(), "assigned code");
        self.policy.write_new_mapping(self.sink, key, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::with_basic_types())
    }

    #[test]
    fn test_codes_start_at_one_and_are_sequential() {
        let mut encoder = ObjectEncoder::new(registry());
        let mut sink = ByteSink::new();
        encoder.write_object(&mut sink, &7i32).unwrap();
        encoder.write_object(&mut sink, &String::from("x")).unwrap();
        encoder.write_object(&mut sink, &8i32).unwrap();

        assert_eq!(encoder.mapping("i32").unwrap().code, 1);
        assert_eq!(encoder.mapping("String").unwrap().code, 2);
        assert!(encoder.mapping("u8").is_none());
    }

    #[test]
    fn test_null_is_code_zero() {
        let mut encoder = ObjectEncoder::new(registry());
        let mut sink = ByteSink::new();
        encoder.write_nullable(&mut sink, None).unwrap();
        assert_eq!(sink.flip(), &[0, 0]);
    }

    #[test]
    fn test_unknown_type_assigns_no_code() {
        #[derive(Debug)]
        struct Unregistered;

        impl crate::Streamable for Unregistered {
            const TYPE_NAME: &'static str = "test.Unregistered";

            fn write_payload(&self, _out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
                Ok(())
            }

            fn read_payload(
                _input: &mut crate::ObjectReader<'_, '_>,
            ) -> Result<Self, ProtocolError> {
                Ok(Unregistered)
            }
        }

        let mut encoder = ObjectEncoder::new(registry());
        let mut sink = ByteSink::new();
        let err = encoder.write_object(&mut sink, &Unregistered).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(_)));
        assert!(encoder.mapping("test.Unregistered").is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_oversized_intern_does_not_take_a_code() {
        let mut encoder = ObjectEncoder::new(registry());
        let mut sink = ByteSink::new();
        let huge = "x".repeat(usize::from(u16::MAX) + 1);

        let err = encoder.writer(&mut sink).write_intern(Some(huge.as_str())).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Buffer(BufferError::StringTooLong(len)) if len == huge.len()
        ));
        assert!(encoder.intern_mapping(&huge).is_none());

        encoder.writer(&mut sink).write_intern(Some("ok")).unwrap();
        assert_eq!(encoder.intern_mapping("ok").unwrap().code, 1);
    }

    #[test]
    fn test_code_space_exhaustion() {
        let config = StreamConfig {
            max_mappings: 2,
            ..StreamConfig::default()
        };
        let mut encoder = ObjectEncoder::<Reliable>::with_config(registry(), &config);
        let mut sink = ByteSink::new();
        let mut writer = encoder.writer(&mut sink);
        writer.write_intern(Some("a")).unwrap();
        writer.write_intern(Some("b")).unwrap();
        writer.write_intern(Some("a")).unwrap();

        let err = writer.write_intern(Some("c")).unwrap_err();
        assert!(matches!(err, ProtocolError::TooManyMappings));
    }

    #[test]
    fn test_intern_codes_are_separate_from_type_codes() {
        let mut encoder = ObjectEncoder::new(registry());
        let mut sink = ByteSink::new();
        encoder.write_object(&mut sink, &1u8).unwrap();
        encoder.writer(&mut sink).write_intern(Some("lobby")).unwrap();

        assert_eq!(encoder.mapping("u8").unwrap().code, 1);
        assert_eq!(encoder.intern_mapping("lobby").unwrap().code, 1);
    }

    #[test]
    fn test_acknowledging_unknown_mapping_fails() {
        let mut encoder = ObjectEncoder::unreliable(registry());
        let err = encoder.note_type_mapping_received("i32").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMapping(name) if name == "i32"));
    }

    #[test]
    fn test_take_pending_empties_the_round() {
        let mut encoder = ObjectEncoder::unreliable(registry());
        let mut sink = ByteSink::new();
        encoder.write_object(&mut sink, &1i64).unwrap();

        let pending = encoder.take_pending();
        assert_eq!(pending.types().collect::<Vec<_>>(), vec!["i64"]);
        assert!(encoder.pending().is_empty());
    }
}
