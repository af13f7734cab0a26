//! # Tessera
//!
//! Compact object streaming for networked games.
//!
//! Tessera sends application objects over a connection and caches type
//! names and tagged strings per session, so repeated values cost a couple
//! of bytes instead of their full description. It works over two kinds
//! of channel:
//!
//! - [`ObjectStream`]: a reliable, ordered stream (TCP). Each descriptor
//!   is sent exactly once per session.
//! - [`DatagramChannel`]: unreliable datagrams (UDP). Descriptors are
//!   repeated until the peer acknowledges them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tessera::prelude::*;
//!
//! #[derive(Debug)]
//! struct Chat {
//!     channel: String,
//!     text: String,
//! }
//!
//! streamable! { Chat = "demo.Chat" { #[intern] channel, text } }
//!
//! # async fn run() -> Result<(), TesseraError> {
//! let mut registry = Registry::with_basic_types();
//! registry.register::<Chat>()?;
//! let registry = Arc::new(registry);
//!
//! let mut stream = ObjectStream::connect("127.0.0.1:7000", registry).await?;
//! stream.send(&Chat { channel: "general".into(), text: "hi".into() }).await?;
//! if let Some(reply) = stream.recv().await? {
//!     println!("{reply:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod datagram;
mod error;
mod stream;

pub use datagram::{DatagramChannel, MAX_DATAGRAM_LEN};
pub use error::TesseraError;
pub use stream::ObjectStream;

/// Re-exports of the lower layers.
pub use tessera_buffer as buffer;
pub use tessera_protocol as protocol;

/// The types most applications need.
pub mod prelude {
    pub use crate::{DatagramChannel, ObjectStream, TesseraError};
    pub use tessera_protocol::{
        CodecKind, Field, InternField, Object, ObjectReader, ObjectWriter, ProtocolError,
        Registry, StreamConfig, Streamable, streamable,
    };
}
