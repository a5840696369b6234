//! Inbound application data.
//!
//! ```text
//! RX indicator: 0x90 │ source(8) │ 0xFFFE │ options(1) │ payload(n)
//! ```

use bytes::Bytes;

use super::{expect_frame, read_u64};
use crate::error::Result;
use crate::protocol::FrameType;

/// Fixed part of an RX indicator frame.
const RX_HEADER: usize = 12;

/// Option bits reported in an RX indicator.
pub mod rx_options {
    /// The packet was acknowledged.
    pub const ACKNOWLEDGED: u8 = 0b0000_0001;
    /// The packet was a broadcast.
    pub const BROADCAST: u8 = 0b0000_0010;
}

/// Decoded `0x90` RX indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPacket {
    /// 64-bit address of the sender.
    pub source: u64,
    pub ack: bool,
    pub broadcast: bool,
    pub payload: Bytes,
}

/// Decode an RX indicator frame.
pub fn decode_rx_packet(payload: &[u8]) -> Result<RxPacket> {
    expect_frame(payload, FrameType::RxPacket, RX_HEADER)?;

    let options = payload[11];
    Ok(RxPacket {
        source: read_u64(payload, 1),
        ack: options & rx_options::ACKNOWLEDGED != 0,
        broadcast: options & rx_options::BROADCAST != 0,
        payload: Bytes::copy_from_slice(&payload[RX_HEADER..]),
    })
}
