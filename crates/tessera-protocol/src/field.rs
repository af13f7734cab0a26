//! Field encodings.
//!
//! A [`Field`] is anything that can appear inside a payload. Scalars and
//! strings use their basic streamers; containers and nested objects are
//! built from those:
//!
//! | Field type | Encoding |
//! |---|---|
//! | `bool` | u8, nonzero is `true` |
//! | integers, floats | big-endian, natural width |
//! | `String` | u16 length + UTF-8 |
//! | `Option<T>` | u8 presence flag, then `T` if present |
//! | `Vec<T>` | i32 element count, then each element |
//! | any `Streamable` | its payload, no type reference |
//! | `Box<dyn Object>` | type reference + payload (polymorphic) |
//!
//! Strings tagged for interning go through [`InternField`] instead and
//! are sent in full only the first time a session sees them.

use crate::{CodecKind, Object, ObjectReader, ObjectWriter, ProtocolError, Streamable};

/// A value that can be written as part of a payload.
pub trait Field: Sized {
    fn write_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError>;
    fn read_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError>;
}

/// A nested streamable value is written bare. Its concrete type is fixed
/// by the enclosing field, so no type reference is needed.
impl<T: Streamable> Field for T {
    fn write_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        self.write_payload(out)
    }

    fn read_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        T::read_payload(input)
    }
}

impl<T: Field> Field for Option<T> {
    fn write_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        match self {
            Some(value) => {
                out.sink().write_bool(true);
                value.write_field(out)
            }
            None => {
                out.sink().write_bool(false);
                Ok(())
            }
        }
    }

    fn read_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        if input.source().read_bool()? {
            T::read_field(input).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Longest run accepted for elements whose encoding is zero bytes long.
pub const MAX_EMPTY_ELEMENTS: usize = 1 << 16;

impl<T: Field> Field for Vec<T> {
    fn write_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        let count = i32::try_from(self.len()).map_err(|_| {
            ProtocolError::InvalidMessage(format!("{} elements exceed the i32 count", self.len()))
        })?;
        out.sink().write_i32(count);
        for element in self {
            element.write_field(out)?;
        }
        Ok(())
    }

    fn read_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        let count = input.source().read_i32()?;
        let count = usize::try_from(count)
            .map_err(|_| ProtocolError::InvalidMessage(format!("negative element count {count}")))?;

        // Most elements take at least one byte, so the remaining input
        // bounds how much is worth preallocating.
        let mut elements = Vec::with_capacity(count.min(input.source().remaining()));
        for _ in 0..count {
            let before = input.source().position();
            elements.push(T::read_field(input)?);
            // Empty payloads consume nothing, so the input cannot bound
            // the count for them.
            if input.source().position() == before && count > MAX_EMPTY_ELEMENTS {
                return Err(ProtocolError::InvalidMessage(format!(
                    "{count} elements with an empty encoding exceed {MAX_EMPTY_ELEMENTS}"
                )));
            }
        }
        Ok(elements)
    }
}

/// Polymorphic field: the concrete type travels with the value.
impl Field for Box<dyn Object> {
    fn write_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        out.write_object(Some(&**self))
    }

    fn read_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        input
            .read_object()?
            .ok_or_else(|| ProtocolError::InvalidMessage("null in a required object field".into()))
    }
}

// ---------------------------------------------------------------------------
// Interned fields
// ---------------------------------------------------------------------------

/// A string field routed through the session's intern pool.
pub trait InternField: Sized {
    fn write_intern_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError>;
    fn read_intern_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError>;
}

impl InternField for String {
    fn write_intern_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        out.write_intern(Some(self.as_str()))
    }

    fn read_intern_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        input
            .read_intern()?
            .ok_or_else(|| ProtocolError::InvalidMessage("null in a required intern field".into()))
    }
}

/// `None` is the null intern code, so no presence flag is needed.
impl InternField for Option<String> {
    fn write_intern_field(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        out.write_intern(self.as_deref())
    }

    fn read_intern_field(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        input.read_intern()
    }
}

// ---------------------------------------------------------------------------
// Basic streamers
// ---------------------------------------------------------------------------

macro_rules! basic_streamable {
    ($($ty:ty => $name:literal, $write:ident, $read:ident;)*) => {$(
        impl Streamable for $ty {
            const TYPE_NAME: &'static str = $name;
            const CODEC: CodecKind = CodecKind::Basic;

            fn write_payload(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
                out.sink().$write(*self);
                Ok(())
            }

            fn read_payload(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
                Ok(input.source().$read()?)
            }
        }
    )*};
}

basic_streamable! {
    bool => "bool", write_bool, read_bool;
    i8 => "i8", write_i8, read_i8;
    u8 => "u8", write_u8, read_u8;
    i16 => "i16", write_i16, read_i16;
    u16 => "u16", write_u16, read_u16;
    i32 => "i32", write_i32, read_i32;
    u32 => "u32", write_u32, read_u32;
    i64 => "i64", write_i64, read_i64;
    u64 => "u64", write_u64, read_u64;
    f32 => "f32", write_f32, read_f32;
    f64 => "f64", write_f64, read_f64;
}

impl Streamable for String {
    const TYPE_NAME: &'static str = "String";
    const CODEC: CodecKind = CodecKind::Basic;

    fn write_payload(&self, out: &mut ObjectWriter<'_>) -> Result<(), ProtocolError> {
        out.sink().write_utf(self)?;
        Ok(())
    }

    fn read_payload(input: &mut ObjectReader<'_, '_>) -> Result<Self, ProtocolError> {
        Ok(input.source().read_utf()?)
    }
}

/// Registers every basic streamer with `registry`.
pub(crate) fn register_basic_types(registry: &mut crate::Registry) {
    registry.insert::<bool>();
    registry.insert::<i8>();
    registry.insert::<u8>();
    registry.insert::<i16>();
    registry.insert::<u16>();
    registry.insert::<i32>();
    registry.insert::<u32>();
    registry.insert::<i64>();
    registry.insert::<u64>();
    registry.insert::<f32>();
    registry.insert::<f64>();
    registry.insert::<String>();
}
