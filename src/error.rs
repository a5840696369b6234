//! Error types for xbee-session.

use std::time::Duration;

use thiserror::Error;

use crate::codec::{AtStatus, TxDeliveryStatus};

/// Main error type for all session, codec and transport operations.
#[derive(Debug, Error)]
pub enum XbeeError {
    /// I/O error on the underlying serial port or socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON configuration.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// Serial port could not be opened.
    #[cfg(feature = "serial")]
    #[error("serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// The first byte of a frame was not the start delimiter.
    #[error("invalid start delimiter 0x{0:02X}")]
    InvalidDelimiter(u8),

    /// Trailing checksum byte does not match the payload.
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Length field disagrees with the number of bytes present.
    #[error("length mismatch: header declares {declared} bytes, frame carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Frame payload shorter than the fixed layout of its type.
    #[error("truncated 0x{frame_type:02X} frame: need {needed} bytes, got {actual}")]
    Truncated {
        frame_type: u8,
        needed: usize,
        actual: usize,
    },

    /// Payload does not fit in the 16-bit length field.
    #[error("payload of {0} bytes exceeds the frame length field")]
    PayloadTooLarge(usize),

    /// Payload carried a different API identifier than the decoder expects.
    #[error("unexpected frame type 0x{actual:02X}, expected 0x{expected:02X}")]
    UnexpectedFrameType { expected: u8, actual: u8 },

    /// A response referenced a mark that is not outstanding.
    #[error("no call is waiting on mark {0}")]
    UnknownMark(u8),

    /// All 255 marks are in use.
    #[error("no marks available")]
    NoMarksAvailable,

    /// The radio rejected an AT command.
    #[error("AT command {mnemonic} failed: {status:?}")]
    AtCommandFailed { mnemonic: String, status: AtStatus },

    /// A transmission was not delivered.
    #[error("transmission failed after {retries} retries: {status:?}")]
    DeliveryFailed {
        status: TxDeliveryStatus,
        retries: u8,
    },

    /// No response arrived within the call timeout.
    #[error("timed out after {0:?} waiting for response")]
    Timeout(Duration),

    /// AT mnemonics are exactly two ASCII characters.
    #[error("invalid AT mnemonic {0:?}")]
    InvalidMnemonic(String),

    /// A connection to this address is already open.
    #[error("address {0:016X} already in use")]
    AddressInUse(u64),

    /// Device string could not be parsed.
    #[error("invalid device: {0}")]
    InvalidDevice(String),

    /// Transport closed, or the session was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Result type alias using XbeeError.
pub type Result<T> = std::result::Result<T, XbeeError>;
