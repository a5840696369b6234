//! Codec module - frame data for the API identifiers this crate speaks.
//!
//! Outbound requests ([`AtCommand`], [`RemoteAtCommand`], [`TxRequest`])
//! implement [`Frameable`] and encode to the frame data that goes inside an
//! API frame. Inbound frame data is decoded by standalone functions:
//!
//! - [`decode_at_response`] - `0x88` AT command response
//! - [`decode_remote_at_response`] - `0x97` remote AT command response
//! - [`decode_tx_status`] - `0x8B` transmit status
//! - [`decode_rx_packet`] - `0x90` RX indicator
//!
//! All multi-byte integers are Big Endian.
//!
//! # Example
//!
//! ```
//! use xbee_session::codec::{AtCommand, AtMnemonic, Frameable};
//!
//! let cmd = AtCommand::query(AtMnemonic::new(b'T', b'P'));
//! assert_eq!(&cmd.encode_payload(0x17)[..], &[0x08, 0x17, 0x54, 0x50]);
//! ```

mod at;
mod rx;
mod tx;

use bytes::Bytes;

use crate::error::{Result, XbeeError};
use crate::protocol::FrameType;

pub use at::{
    decode_at_response, decode_remote_at_response, encode_at_command, encode_remote_at_command,
    remote_options, AtCommand, AtMnemonic, AtResponse, AtStatus, RemoteAtCommand,
    RemoteAtResponse,
};
pub use rx::{decode_rx_packet, rx_options, RxPacket};
pub use tx::{
    decode_tx_status, encode_tx_request, tx_options, TxDeliveryStatus, TxRequest, TxStatus,
    BROADCAST_ADDRESS,
};

/// 16-bit network address field value meaning "unknown / use the 64-bit address".
pub const UNKNOWN_NETWORK_ADDRESS: [u8; 2] = [0xFF, 0xFE];

/// Anything that can be carried as the frame data of an outbound API frame.
pub trait Frameable {
    /// The API identifier this request encodes to.
    fn frame_type(&self) -> FrameType;

    /// Encode the frame data, tagging it with `mark`.
    ///
    /// A mark of 0 asks the radio not to answer.
    fn encode_payload(&self, mark: u8) -> Bytes;
}

/// Check the API identifier and minimum length of inbound frame data.
fn expect_frame(payload: &[u8], expected: FrameType, min_len: usize) -> Result<()> {
    let actual = payload.first().copied().ok_or(XbeeError::Truncated {
        frame_type: expected.id(),
        needed: min_len,
        actual: 0,
    })?;

    if actual != expected.id() {
        return Err(XbeeError::UnexpectedFrameType {
            expected: expected.id(),
            actual,
        });
    }

    if payload.len() < min_len {
        return Err(XbeeError::Truncated {
            frame_type: actual,
            needed: min_len,
            actual: payload.len(),
        });
    }

    Ok(())
}

/// Read a Big Endian `u64` at `offset`. Callers have checked the length.
#[inline]
fn read_u64(payload: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&payload[offset..offset + 8]);
    u64::from_be_bytes(raw)
}
