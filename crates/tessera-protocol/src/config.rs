//! Stream configuration.

use serde::{Deserialize, Serialize};

#[cfg(feature = "json")]
use crate::ProtocolError;

/// Tunables for one streaming session.
///
/// Every field has a default, so a configuration document only needs to
/// name the values it changes:
///
/// ```rust
/// # #[cfg(feature = "json")] {
/// use tessera_protocol::StreamConfig;
///
/// let config = StreamConfig::from_json(r#"{ "max_mappings": 256 }"#).unwrap();
/// assert_eq!(config.max_mappings, 256);
/// assert_eq!(config.initial_capacity, 32);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Starting capacity of outgoing buffers. They grow on demand.
    pub initial_capacity: usize,

    /// Largest incoming frame accepted on the reliable channel, header
    /// included.
    pub max_frame_len: usize,

    /// Most type codes (and, separately, intern codes) one session may
    /// assign. Codes travel as i16, so values above `i16::MAX` are clamped.
    pub max_mappings: u16,

    /// How deeply objects may nest through polymorphic fields on decode.
    pub max_depth: usize,
}

impl StreamConfig {
    /// Parses a configuration from JSON. Missing fields keep their defaults.
    #[cfg(feature = "json")]
    pub fn from_json(json: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(json).map_err(ProtocolError::Config)
    }

    /// `max_mappings`, clamped to what fits on the wire.
    pub fn code_limit(&self) -> u16 {
        self.max_mappings.min(i16::MAX as u16)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 32,
            max_frame_len: 512 * 1024,
            max_mappings: i16::MAX as u16,
            max_depth: 64,
        }
    }
}
