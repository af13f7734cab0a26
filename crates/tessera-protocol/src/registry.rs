//! The type registry: which types a session may stream, and how.
//!
//! There is no runtime reflection. Each streamable type is registered once
//! at setup time, which records a pair of plain function pointers that
//! know the concrete type. Encoding looks the entry up by the value's
//! `TypeId`; decoding looks it up by the name that arrived on the wire.
//!
//! A registry is built before any session exists and then shared,
//! read-only, behind an `Arc`:
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_protocol::Registry;
//!
//! let mut registry = Registry::with_basic_types();
//! // registry.register::<MyMessage>()?;
//! let registry = Arc::new(registry);
//! assert!(registry.lookup("String").is_some());
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{CodecKind, Object, ObjectReader, ObjectWriter, ProtocolError, Streamable};

/// Type-erased encoder for one registered type.
pub type WriteFn = fn(&dyn Object, &mut ObjectWriter<'_>) -> Result<(), ProtocolError>;

/// Type-erased decoder for one registered type.
pub type ReadFn = fn(&mut ObjectReader<'_, '_>) -> Result<Box<dyn Object>, ProtocolError>;

/// Everything a session needs to stream one registered type.
pub struct TypeEntry {
    name: &'static str,
    codec_kind: CodecKind,
    pub(crate) write: WriteFn,
    pub(crate) read: ReadFn,
}

impl TypeEntry {
    /// Builds the entry for `T`.
    pub fn of<T: Streamable>() -> Self {
        Self {
            name: T::TYPE_NAME,
            codec_kind: T::CODEC,
            write: write_erased::<T>,
            read: read_erased::<T>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn codec_kind(&self) -> CodecKind {
        self.codec_kind
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("name", &self.name)
            .field("codec_kind", &self.codec_kind)
            .finish_non_exhaustive()
    }
}

fn write_erased<T: Streamable>(
    value: &dyn Object,
    out: &mut ObjectWriter<'_>,
) -> Result<(), ProtocolError> {
    let value = value
        .as_any()
        .downcast_ref::<T>()
        .ok_or(ProtocolError::TypeMismatch {
            expected: T::TYPE_NAME,
            found: value.type_name(),
        })?;
    value.write_payload(out)
}

fn read_erased<T: Streamable>(
    input: &mut ObjectReader<'_, '_>,
) -> Result<Box<dyn Object>, ProtocolError> {
    Ok(Box::new(T::read_payload(input)?))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Maps Rust types and wire names to their [`TypeEntry`].
#[derive(Debug, Default)]
pub struct Registry {
    by_type: HashMap<TypeId, Arc<TypeEntry>>,
    by_name: HashMap<&'static str, Arc<TypeEntry>>,
}

impl Registry {
    /// An empty registry. Not even the basic scalars can be streamed as
    /// top-level objects until they are registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the scalar and string streamers.
    pub fn with_basic_types() -> Self {
        let mut registry = Self::new();
        crate::field::register_basic_types(&mut registry);
        registry
    }

    /// Registers `T` under its [`Streamable::TYPE_NAME`].
    ///
    /// Registering the same type twice is harmless.
    ///
    /// # Errors
    /// [`ProtocolError::DuplicateType`] if another type already uses the name.
    pub fn register<T: Streamable>(&mut self) -> Result<(), ProtocolError> {
        if let Some(existing) = self.by_name.get(T::TYPE_NAME) {
            return if self.by_type.contains_key(&TypeId::of::<T>()) {
                Ok(())
            } else {
                Err(ProtocolError::DuplicateType(existing.name.to_owned()))
            };
        }
        self.insert::<T>();
        tracing::debug!(type_name = T::TYPE_NAME, codec = %T::CODEC, "registered streamable type");
        Ok(())
    }

    pub(crate) fn insert<T: Streamable>(&mut self) {
        let entry = Arc::new(TypeEntry::of::<T>());
        self.by_type.insert(TypeId::of::<T>(), Arc::clone(&entry));
        self.by_name.insert(T::TYPE_NAME, entry);
    }

    /// Finds the entry for a value about to be encoded.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownType`] if the value's type was never registered.
    pub fn resolve(&self, value: &dyn Object) -> Result<&Arc<TypeEntry>, ProtocolError> {
        self.by_type
            .get(&value.as_any().type_id())
            .ok_or_else(|| ProtocolError::UnknownType(value.type_name().to_owned()))
    }

    /// Finds the entry for a type name received from the wire.
    pub fn lookup(&self, name: &str) -> Option<&Arc<TypeEntry>> {
        self.by_name.get(name)
    }

    pub fn contains<T: Streamable>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
