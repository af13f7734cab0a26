/// Implements [`Streamable`](crate::Streamable) for a struct by streaming
/// its fields in the order they are listed.
///
/// ```rust
/// use tessera_protocol::streamable;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct PlayerMoved {
///     player: String,
///     x: f32,
///     y: f32,
///     // Client-side interpolation state, never sent.
///     smoothing: f32,
/// }
///
/// streamable! {
///     PlayerMoved = "game.PlayerMoved" {
///         #[intern] player,
///         x,
///         y,
///     }
///     skip { smoothing }
/// }
/// ```
///
/// - Every listed field must implement [`Field`](crate::Field).
/// - `#[intern]` sends the field through the session's string pool; the
///   field must implement [`InternField`](crate::InternField).
/// - Fields under `skip` are not streamed and are set to
///   `Default::default()` when the value is read back.
///
/// Every field of the struct must appear in exactly one of the two lists,
/// otherwise the generated struct literal does not compile.
#[macro_export]
macro_rules! streamable {
    // Internal rules: one field write / read.
    (@write $out:ident, $value:expr) => {
        $out.write_field(&$value)?
    };
    (@write $out:ident, $value:expr, intern) => {
        $crate::InternField::write_intern_field(&$value, $out)?
    };
    (@read $input:ident) => {
        $input.read_field()?
    };
    (@read $input:ident, intern) => {
        $crate::InternField::read_intern_field($input)?
    };

    (
        $ty:ty = $name:literal {
            $( $(#[$attr:ident])? $field:ident ),* $(,)?
        }
        $( skip { $( $skipped:ident ),* $(,)? } )?
    ) => {
        impl $crate::Streamable for $ty {
            const TYPE_NAME: &'static str = $name;
            const CODEC: $crate::CodecKind = $crate::CodecKind::Fields;

            #[allow(unused_variables)]
            fn write_payload(
                &self,
                out: &mut $crate::ObjectWriter<'_>,
            ) -> ::std::result::Result<(), $crate::ProtocolError> {
                $( $crate::streamable!(@write out, self.$field $(, $attr)?); )*
                ::std::result::Result::Ok(())
            }

            #[allow(unused_variables)]
            fn read_payload(
                input: &mut $crate::ObjectReader<'_, '_>,
            ) -> ::std::result::Result<Self, $crate::ProtocolError> {
                $( let $field = $crate::streamable!(@read input $(, $attr)?); )*
                ::std::result::Result::Ok(Self {
                    $( $field, )*
                    $( $( $skipped: ::std::default::Default::default(), )* )?
                })
            }
        }
    };
}
