//! The streamable payload contract.
//!
//! Two traits describe an object that can travel over a session:
//!
//! - [`Streamable`] is what an application type implements. It names the
//!   type on the wire and says how to write and read its fields. Because
//!   `read_payload` returns `Self`, it cannot be called through a trait
//!   object.
//! - [`Object`] is the object-safe view of the same thing. Every
//!   `Streamable` is an `Object` through a blanket impl, so heterogeneous
//!   values can be passed around as `&dyn Object` or `Box<dyn Object>` and
//!   downcast back to their concrete type on the receiving side.
//!
//! Most types never write `Streamable` by hand; the [`streamable!`] macro
//! generates the declaration-order field encoding.
//!
//! [`streamable!`]: crate::streamable!

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ObjectReader, ObjectWriter, ProtocolError};

/// How a type's payload is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecKind {
    /// A built-in scalar or string streamer.
    Basic,
    /// Declared fields written in declaration order (the `streamable!` macro).
    Fields,
    /// Hand-written `write_payload` / `read_payload` hooks.
    Custom,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Fields => write!(f, "fields"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// A type that can be written to and restored from a session.
///
/// ## Trait bounds explained
///
/// - `'static` → the type owns its data, so it can be identified by
///   `TypeId` and stored as a `Box<dyn Object>`.
/// - `Send + Sync` → decoded objects can be handed to other tasks.
/// - `Debug` → objects show up in logs and test failures.
///
/// ## Custom hooks
///
/// A hand-written impl is free to write any subset of its state, and may
/// still use the default field encodings through
/// [`ObjectWriter::write_field`] and [`ObjectReader::read_field`]:
///
/// ```rust
/// use tessera_protocol::{ObjectReader, ObjectWriter, ProtocolError, Streamable};
///
/// #[derive(Debug)]
/// struct Health {
///     current: u16,
///     max: u16,
///     // Recomputed locally, never sent.
///     ratio: f32,
/// }
///
/// impl Streamable for Health {
///     const TYPE_NAME: &'static str = "game.Health";
///
///     fn write_payload(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
///         out.write_field(&self.current)?;
///         out.write_field(&self.max)
///     }
///
///     fn read_payload(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
///         let current: u16 = input.read_field()?;
///         let max: u16 = input.read_field()?;
///         let ratio = if max == 0 { 0.0 } else { f32::from(current) / f32::from(max) };
///         Ok(Self { current, max, ratio })
///     }
/// }
/// ```
pub trait Streamable: fmt::Debug + Send + Sync + Sized + 'static {
    /// Stable name that identifies this type on the wire.
    const TYPE_NAME: &'static str;

    /// How the payload is produced. Only informational.
    const CODEC: CodecKind = CodecKind::Custom;

    /// Writes this value's payload. The type reference has already been
    /// written by the caller.
    fn write_payload(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError>;

    /// Builds a value from its payload.
    fn read_payload(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError>;
}

/// Object-safe view of a [`Streamable`] value.
///
/// Implemented automatically; there is no reason to implement it by hand.
pub trait Object: Any + fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;
    fn codec_kind(&self) -> CodecKind;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Streamable> Object for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn codec_kind(&self) -> CodecKind {
        T::CODEC
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl<'o> dyn Object + 'o {
    /// Returns `true` if the object is a `T`.
    pub fn is<T: Object>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Converts a boxed object into its concrete type.
    ///
    /// Returns `None` (and drops the object) if it is not a `T`. Check with
    /// [`is`](Self::is) first when the object must be kept on mismatch.
    pub fn downcast<T: Object>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast().ok()
    }
}
