//! Decoder-side session tables.
//!
//! A [`SessionTable`] maps the codes a peer has assigned to what they stand
//! for. It is indexed directly by code and only ever grows. Under
//! reordering a descriptor for code 7 may arrive before code 3 was ever
//! seen, so the table fills the gap with empty slots that are populated
//! when (and if) those codes are described.

use std::fmt;
use std::sync::Arc;

use crate::{CodecKind, ProtocolError, TypeEntry};

/// Something a session code can stand for.
pub trait Descriptor {
    /// Used in error messages: "type" or "intern".
    const KIND: &'static str;

    /// The identity that must match whenever the code is described again.
    fn descriptor(&self) -> &str;
}

/// A type code known to the decoder.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub code: u16,
    pub entry: Arc<TypeEntry>,
}

impl TypeDescriptor {
    pub fn type_name(&self) -> &'static str {
        self.entry.name()
    }

    pub fn codec_kind(&self) -> CodecKind {
        self.entry.codec_kind()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("code", &self.code)
            .field("type_name", &self.type_name())
            .field("codec_kind", &self.codec_kind())
            .finish()
    }
}

impl Descriptor for TypeDescriptor {
    const KIND: &'static str = "type";

    fn descriptor(&self) -> &str {
        self.type_name()
    }
}

/// An interned string known to the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternEntry {
    pub code: u16,
    pub value: String,
}

impl Descriptor for InternEntry {
    const KIND: &'static str = "intern";

    fn descriptor(&self) -> &str {
        &self.value
    }
}

/// Append-only, code-indexed table of descriptors for one session.
#[derive(Debug, Clone)]
pub struct SessionTable<T> {
    slots: Vec<Option<T>>,
}

impl<T: Descriptor> SessionTable<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// The descriptor for `code`, if it has been mapped.
    pub fn get(&self, code: u16) -> Option<&T> {
        self.slots.get(usize::from(code))?.as_ref()
    }

    pub fn contains(&self, code: u16) -> bool {
        self.get(code).is_some()
    }

    /// Number of mapped codes. Placeholders are not counted.
    pub fn mapped(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Maps `code` to the descriptor named `incoming`, or checks that it
    /// already is.
    ///
    /// `build` is only called when the slot is empty. A code that is
    /// already mapped to a different name is never rebound.
    ///
    /// # Errors
    /// - [`ProtocolError::ConflictingMapping`] if `code` already stands for
    ///   something else.
    /// - [`ProtocolError::InvalidCode`] for code 0, which always means null.
    /// - Whatever `build` returns.
    pub fn map_with(
        &mut self,
        code: u16,
        incoming: &str,
        build: impl FnOnce() -> Result<T, ProtocolError>,
    ) -> Result<&T, ProtocolError> {
        if code == 0 {
            return Err(ProtocolError::InvalidCode(0));
        }

        let index = usize::from(code);
        if index >= self.slots.len() {
            if index > self.slots.len() {
                tracing::trace!(code, kind = T::KIND, "session table grew past unseen codes");
            }
            self.slots.resize_with(index + 1, || None);
        }

        let slot = &mut self.slots[index];
        match slot {
            Some(existing) => {
                if existing.descriptor() != incoming {
                    return Err(ProtocolError::ConflictingMapping {
                        code,
                        existing: existing.descriptor().to_owned(),
                        incoming: incoming.to_owned(),
                    });
                }
                Ok(existing)
            }
            None => Ok(slot.insert(build()?)),
        }
    }
}

impl<T: Descriptor> Default for SessionTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
