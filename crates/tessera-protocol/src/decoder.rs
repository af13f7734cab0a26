//! The decoding half of a session.
//!
//! An [`ObjectDecoder`] mirrors an encoder on the other end of a channel.
//! It keeps the codes the peer has described in two [`SessionTable`]s and
//! resolves every incoming reference against them.
//!
//! How a reference is laid out depends on the channel:
//!
//! ```text
//! reliable:    [i16 code]                     0 = null, > 0 bare
//!                [utf descriptor]             only if code < 0
//! unreliable:  [i16 code]                     0 = null, > 0 bare
//!                [u8 marker]                  only if code < 0
//!                  [utf descriptor]           only if marker == 1
//! ```
//!
//! A descriptor for a code that is already mapped must name the same
//! type or string, otherwise the session fails with
//! [`ProtocolError::ConflictingMapping`].
//!
//! Polymorphic fields nest objects inside objects. The decoder counts how
//! deep it is and refuses to go past [`StreamConfig::max_depth`], so a
//! hostile peer cannot exhaust the stack.

use std::sync::Arc;

use tessera_buffer::ByteSource;
use tracing::trace;

use crate::policy::{MARKER_BARE, MARKER_DESCRIPTOR};
use crate::{
    Delivery, Descriptor, Field, InternEntry, Object, ProtocolError, Registry, SessionTable,
    StreamConfig, Streamable, TypeDescriptor, TypeEntry,
};

/// A decoded reference, before it is resolved against a table.
enum Reference {
    Null,
    Bare(u16),
    Described(u16, String),
}

fn read_reference(source: &mut ByteSource<'_>, delivery: Delivery) -> Result<Reference, ProtocolError> {
    let raw = source.read_i16()?;
    if raw == 0 {
        return Ok(Reference::Null);
    }
    if raw > 0 {
        return Ok(Reference::Bare(raw.unsigned_abs()));
    }

    // i16::MIN has no positive counterpart.
    let code = raw.unsigned_abs();
    if code > i16::MAX as u16 {
        return Err(ProtocolError::InvalidCode(raw));
    }
    match delivery {
        Delivery::Reliable => Ok(Reference::Described(code, source.read_utf()?)),
        Delivery::Unreliable => match source.read_u8()? {
            MARKER_BARE => Ok(Reference::Bare(code)),
            MARKER_DESCRIPTOR => Ok(Reference::Described(code, source.read_utf()?)),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown reference marker {other}"
            ))),
        },
    }
}

/// Reads objects for one session direction.
#[derive(Debug)]
pub struct ObjectDecoder {
    registry: Arc<Registry>,
    types: SessionTable<TypeDescriptor>,
    interns: SessionTable<InternEntry>,
    delivery: Delivery,
    max_depth: usize,
    depth: usize,
}

impl ObjectDecoder {
    pub fn new(registry: Arc<Registry>, delivery: Delivery) -> Self {
        Self::with_config(registry, delivery, &StreamConfig::default())
    }

    pub fn with_config(registry: Arc<Registry>, delivery: Delivery, config: &StreamConfig) -> Self {
        Self {
            registry,
            types: SessionTable::new(),
            interns: SessionTable::new(),
            delivery,
            max_depth: config.max_depth,
            depth: 0,
        }
    }

    /// A decoder for an ordered stream.
    pub fn reliable(registry: Arc<Registry>) -> Self {
        Self::new(registry, Delivery::Reliable)
    }

    /// A decoder for datagrams.
    pub fn unreliable(registry: Arc<Registry>) -> Self {
        Self::new(registry, Delivery::Unreliable)
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn types(&self) -> &SessionTable<TypeDescriptor> {
        &self.types
    }

    pub fn interns(&self) -> &SessionTable<InternEntry> {
        &self.interns
    }

    /// A reader over `source` that shares this session's state.
    pub fn reader<'a, 'b>(&'a mut self, source: &'a mut ByteSource<'b>) -> ObjectReader<'a, 'b> {
        ObjectReader {
            source,
            decoder: self,
        }
    }

    /// Reads one object, or `None` for the null code.
    pub fn read_object(
        &mut self,
        source: &mut ByteSource<'_>,
    ) -> Result<Option<Box<dyn Object>>, ProtocolError> {
        self.reader(source).read_object()
    }

    /// Reads one non-null object of type `T`.
    pub fn read_as<T: Streamable>(&mut self, source: &mut ByteSource<'_>) -> Result<T, ProtocolError> {
        self.reader(source).read_as()
    }

    /// Maps a type code to `type_name`, or checks that it already is.
    ///
    /// # Errors
    /// - [`ProtocolError::ConflictingMapping`] if the code stands for a
    ///   different type.
    /// - [`ProtocolError::UnknownType`] if `type_name` is not registered.
    pub fn map_type(&mut self, code: u16, type_name: &str) -> Result<&TypeDescriptor, ProtocolError> {
        let registry = &self.registry;
        let descriptor = self.types.map_with(code, type_name, || {
            let entry = registry
                .lookup(type_name)
                .ok_or_else(|| ProtocolError::UnknownType(type_name.to_owned()))?;
            trace!(code, type_name, "mapped type code");
            Ok(TypeDescriptor {
                code,
                entry: Arc::clone(entry),
            })
        })?;
        Ok(descriptor)
    }

    /// Maps an intern code to `value`, or checks that it already is.
    pub fn map_intern(&mut self, code: u16, value: &str) -> Result<&InternEntry, ProtocolError> {
        self.interns.map_with(code, value, || {
            trace!(code, value, "mapped intern code");
            Ok(InternEntry {
                code,
                value: value.to_owned(),
            })
        })
    }

    fn read_type(&mut self, source: &mut ByteSource<'_>) -> Result<Option<Arc<TypeEntry>>, ProtocolError> {
        let descriptor = match read_reference(source, self.delivery)? {
            Reference::Null => return Ok(None),
            Reference::Bare(code) => self.types.get(code).ok_or(ProtocolError::UnmappedCode {
                code,
                kind: TypeDescriptor::KIND,
            })?,
            Reference::Described(code, name) => self.map_type(code, &name)?,
        };
        Ok(Some(Arc::clone(&descriptor.entry)))
    }

    fn read_intern(&mut self, source: &mut ByteSource<'_>) -> Result<Option<String>, ProtocolError> {
        let entry = match read_reference(source, self.delivery)? {
            Reference::Null => return Ok(None),
            Reference::Bare(code) => self.interns.get(code).ok_or(ProtocolError::UnmappedCode {
                code,
                kind: InternEntry::KIND,
            })?,
            Reference::Described(code, value) => self.map_intern(code, &value)?,
        };
        Ok(Some(entry.value.clone()))
    }
}

// ---------------------------------------------------------------------------
// ObjectReader
// ---------------------------------------------------------------------------

/// The view of a session handed to payload hooks.
pub struct ObjectReader<'a, 'b> {
    source: &'a mut ByteSource<'b>,
    decoder: &'a mut ObjectDecoder,
}

impl<'b> ObjectReader<'_, 'b> {
    /// The raw source, for payloads that read bytes directly.
    pub fn source(&mut self) -> &mut ByteSource<'b> {
        &mut *self.source
    }

    /// Reads a type reference and payload, or `None` for the null code.
    ///
    /// # Errors
    /// [`ProtocolError::NestingTooDeep`] if this object sits deeper than
    /// the configured limit inside other objects.
    pub fn read_object(&mut self) -> Result<Option<Box<dyn Object>>, ProtocolError> {
        let Some(entry) = self.decoder.read_type(self.source)? else {
            return Ok(None);
        };
        if self.decoder.depth >= self.decoder.max_depth {
            return Err(ProtocolError::NestingTooDeep(self.decoder.max_depth));
        }
        self.decoder.depth += 1;
        let result = (entry.read)(self);
        self.decoder.depth -= 1;
        result.map(Some)
    }

    /// Reads one non-null object and checks that it is a `T`.
    ///
    /// # Errors
    /// [`ProtocolError::TypeMismatch`] if the object is of another type.
    pub fn read_as<T: Streamable>(&mut self) -> Result<T, ProtocolError> {
        let object = self
            .read_object()?
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("expected `{}`, found null", T::TYPE_NAME)))?;
        let found = object.type_name();
        object
            .downcast::<T>()
            .map(|boxed| *boxed)
            .ok_or(ProtocolError::TypeMismatch {
                expected: T::TYPE_NAME,
                found,
            })
    }

    /// Reads an interned string reference, or `None` for the null code.
    pub fn read_intern(&mut self) -> Result<Option<String>, ProtocolError> {
        self.decoder.read_intern(self.source)
    }

    /// Reads a value with its default field encoding.
    pub fn read_field<T: Field>(&mut self) -> Result<T, ProtocolError> {
        T::read_field(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::with_basic_types())
    }

    #[test]
    fn test_null_reference() {
        let mut decoder = ObjectDecoder::reliable(registry());
        let mut source = ByteSource::new(&[0, 0]);
        assert!(decoder.read_object(&mut source).unwrap().is_none());
    }

    #[test]
    fn test_reliable_rejects_min_code() {
        let mut decoder = ObjectDecoder::reliable(registry());
        let mut source = ByteSource::new(&[0x80, 0x00]);
        assert!(matches!(
            decoder.read_object(&mut source),
            Err(ProtocolError::InvalidCode(i16::MIN))
        ));
    }

    #[test]
    fn test_reliable_bare_reference_must_be_mapped() {
        let mut decoder = ObjectDecoder::reliable(registry());
        let mut source = ByteSource::new(&[0, 3]);
        assert!(matches!(
            decoder.read_object(&mut source),
            Err(ProtocolError::UnmappedCode { code: 3, kind: "type" })
        ));
    }

    #[test]
    fn test_reliable_described_code_that_is_already_mapped() {
        let mut decoder = ObjectDecoder::reliable(registry());
        // u8 described as code 2, value 7, then described again identically.
        let bytes = [0xFF, 0xFE, 0, 2, b'u', b'8', 7, 0xFF, 0xFE, 0, 2, b'u', b'8', 8];
        let mut source = ByteSource::new(&bytes);
        assert_eq!(decoder.read_as::<u8>(&mut source).unwrap(), 7);
        assert_eq!(decoder.read_as::<u8>(&mut source).unwrap(), 8);
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_unreliable_bare_reference_must_be_mapped() {
        let mut decoder = ObjectDecoder::unreliable(registry());
        let mut source = ByteSource::new(&[0, 3]);
        assert!(matches!(
            decoder.read_object(&mut source),
            Err(ProtocolError::UnmappedCode { code: 3, kind: "type" })
        ));

        let mut source = ByteSource::new(&[0xFF, 0xFD, MARKER_BARE]);
        assert!(matches!(
            decoder.read_object(&mut source),
            Err(ProtocolError::UnmappedCode { code: 3, kind: "type" })
        ));
    }

    #[test]
    fn test_unreliable_unknown_marker() {
        let mut decoder = ObjectDecoder::unreliable(registry());
        let mut source = ByteSource::new(&[0xFF, 0xFD, 7]);
        assert!(matches!(
            decoder.read_object(&mut source),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_descriptor_for_unregistered_type() {
        let mut decoder = ObjectDecoder::reliable(registry());
        let mut source = ByteSource::new(&[0xFF, 0xFF, 0, 3, b'a', b'.', b'Z']);
        assert!(matches!(
            decoder.read_object(&mut source),
            Err(ProtocolError::UnknownType(name)) if name == "a.Z"
        ));
        assert!(!decoder.types().contains(1));
    }

    #[test]
    fn test_map_type_conflict_is_fatal() {
        let mut decoder = ObjectDecoder::reliable(registry());
        decoder.map_type(5, "i32").unwrap();
        decoder.map_type(5, "i32").unwrap();

        let err = decoder.map_type(5, "u8").unwrap_err();
        assert!(matches!(err, ProtocolError::ConflictingMapping { code: 5, .. }));
        assert_eq!(decoder.types().get(5).unwrap().type_name(), "i32");
    }

    #[test]
    fn test_read_as_type_mismatch() {
        let mut decoder = ObjectDecoder::reliable(registry());
        // i32 described with code 1, payload 9.
        let bytes = [0xFF, 0xFF, 0, 3, b'i', b'3', b'2', 0, 0, 0, 9];
        let mut source = ByteSource::new(&bytes);
        let err = decoder.read_as::<String>(&mut source).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TypeMismatch { expected: "String", found: "i32" }
        ));
    }
}
