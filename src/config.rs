//! Session configuration.
//!
//! [`SessionConfig`] carries every tunable of a [`Session`](crate::Session).
//! It can be built in code (usually through
//! [`SessionBuilder`](crate::SessionBuilder)) or loaded from JSON, where
//! missing fields fall back to their defaults:
//!
//! ```
//! use xbee_session::SessionConfig;
//!
//! let config = SessionConfig::from_json(r#"{ "call_timeout_ms": 2500 }"#).unwrap();
//! assert_eq!(config.call_timeout_ms, 2500);
//! assert_eq!(config.max_frame_payload, 1024);
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_FRAME_PAYLOAD;

/// Default per-call timeout, in milliseconds.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 1000;

/// Default depth of the writer queue.
pub const DEFAULT_WRITE_CHANNEL_CAPACITY: usize = 64;

/// Default transport read size.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Configuration for a session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long `write` and the AT calls wait for their response.
    pub call_timeout_ms: u64,
    /// Frames announcing a longer payload are treated as line noise.
    pub max_frame_payload: usize,
    /// How many encoded frames may queue for the writer task.
    pub write_channel_capacity: usize,
    /// Bytes requested from the transport per read.
    pub read_chunk_size: usize,
    /// Hop limit for transmitted data; 0 means the network maximum.
    pub broadcast_radius: u8,
}

impl SessionConfig {
    /// Parse a JSON document, filling absent fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[inline]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            max_frame_payload: DEFAULT_MAX_FRAME_PAYLOAD,
            write_channel_capacity: DEFAULT_WRITE_CHANNEL_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            broadcast_radius: 0,
        }
    }
}
