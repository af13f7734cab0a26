//! The Tessera object streaming protocol.
//!
//! This crate turns application objects into bytes and back, caching type
//! names and tagged strings per session so each is sent in full only as
//! often as the channel requires:
//!
//! - **Contract** ([`Streamable`], [`Object`], [`streamable!`]): what an
//!   application type provides to be streamed.
//! - **Registry** ([`Registry`]): which types a session may stream.
//! - **Sessions** ([`ObjectEncoder`], [`ObjectDecoder`]): per-connection
//!   code tables, with a [`CachePolicy`] for reliable or unreliable
//!   delivery.
//! - **Datagrams** ([`DatagramSequencer`]): sequence numbers and automatic
//!   acknowledgment for the unreliable channel.
//!
//! # Architecture
//!
//! ```text
//! Application objects → Protocol (this crate) → Buffer (bytes, frames)
//! ```
//!
//! Nothing here does I/O. Encoders write into a `ByteSink`, decoders read
//! from a `ByteSource`; the `tessera` crate moves those bytes over sockets.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_buffer::ByteSink;
//! use tessera_protocol::{streamable, ObjectDecoder, ObjectEncoder, Registry};
//!
//! #[derive(Debug, PartialEq)]
//! struct Foo {
//!     x: i32,
//!     y: String,
//! }
//!
//! streamable! { Foo = "pkg.Foo" { x, y } }
//!
//! let mut registry = Registry::new();
//! registry.register::<Foo>().unwrap();
//! let registry = Arc::new(registry);
//!
//! let mut encoder = ObjectEncoder::new(Arc::clone(&registry));
//! let mut sink = ByteSink::new();
//! encoder.write_object(&mut sink, &Foo { x: 1, y: "hi".into() }).unwrap();
//!
//! let mut decoder = ObjectDecoder::reliable(registry);
//! let foo: Foo = decoder.read_as(&mut sink.reader()).unwrap();
//! assert_eq!(foo, Foo { x: 1, y: "hi".into() });
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod config;
mod decoder;
mod encoder;
mod error;
mod field;
mod macros;
mod policy;
mod registry;
mod sequencer;
mod streamable;
mod table;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use config::StreamConfig;
pub use decoder::{ObjectDecoder, ObjectReader};
pub use encoder::{ObjectEncoder, ObjectWriter};
pub use error::ProtocolError;
pub use field::{Field, InternField, MAX_EMPTY_ELEMENTS};
pub use policy::{
    CachePolicy, Delivery, MARKER_BARE, MARKER_DESCRIPTOR, Mapping, MappingKey, PendingAckSet,
    Reliable, Unreliable,
};
pub use registry::{ReadFn, Registry, TypeEntry, WriteFn};
pub use sequencer::{DatagramSequencer, MAX_SEND_RECORDS};
pub use streamable::{CodecKind, Object, Streamable};
pub use table::{Descriptor, InternEntry, SessionTable, TypeDescriptor};
