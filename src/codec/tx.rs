//! Data transmission requests and their delivery reports.
//!
//! ```text
//! TX request: 0x10 │ mark │ dest(8) │ 0xFFFE │ radius(1) │ options(1) │ payload(n)
//! TX status:  0x8B │ mark │ 0xFFFE │ retries(1) │ delivery(1) │ discovery(1)
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::{expect_frame, Frameable, UNKNOWN_NETWORK_ADDRESS};
use crate::error::{Result, XbeeError};
use crate::protocol::FrameType;

/// Destination meaning "deliver to all reachable nodes".
pub const BROADCAST_ADDRESS: u64 = 0xFFFF;

/// Exact size of a TX status frame.
const TX_STATUS_LEN: usize = 7;

/// Option bits for TX requests.
pub mod tx_options {
    /// Don't request a MAC acknowledgement from the destination.
    pub const DISABLE_ACK: u8 = 0b0000_0001;
    /// Skip route discovery (DigiMesh).
    pub const DISABLE_ROUTE_DISCOVERY: u8 = 0b0000_0010;
}

/// A data transmission to one radio or to all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub destination: u64,
    /// Maximum hops for broadcasts; 0 means the network maximum.
    pub broadcast_radius: u8,
    /// See [`tx_options`].
    pub options: u8,
    pub payload: Bytes,
}

impl TxRequest {
    /// Transmit `payload` to `destination` with default radius and options.
    pub fn new(destination: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            destination,
            broadcast_radius: 0,
            options: 0,
            payload: payload.into(),
        }
    }

    /// Broadcast `payload` to every reachable radio.
    pub fn broadcast(payload: impl Into<Bytes>) -> Self {
        Self::new(BROADCAST_ADDRESS, payload)
    }

    /// Set the broadcast radius.
    pub fn with_radius(mut self, radius: u8) -> Self {
        self.broadcast_radius = radius;
        self
    }
}

impl Frameable for TxRequest {
    fn frame_type(&self) -> FrameType {
        FrameType::TxRequest
    }

    fn encode_payload(&self, mark: u8) -> Bytes {
        encode_tx_request(
            mark,
            self.destination,
            self.broadcast_radius,
            self.options,
            &self.payload,
        )
    }
}

/// Encode a TX request.
///
/// # Example
///
/// ```
/// use xbee_session::codec::{encode_tx_request, BROADCAST_ADDRESS};
///
/// let payload = encode_tx_request(0x01, BROADCAST_ADDRESS, 0, 0, b"hi");
/// assert_eq!(
///     &payload[..],
///     &[0x10, 0x01, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFE, 0x00, 0x00, b'h', b'i']
/// );
/// ```
pub fn encode_tx_request(
    mark: u8,
    destination: u64,
    broadcast_radius: u8,
    options: u8,
    payload: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(14 + payload.len());
    buf.put_u8(FrameType::TxRequest.id());
    buf.put_u8(mark);
    buf.put_u64(destination);
    buf.put_slice(&UNKNOWN_NETWORK_ADDRESS);
    buf.put_u8(broadcast_radius);
    buf.put_u8(options);
    buf.put_slice(payload);
    buf.freeze()
}

/// Delivery outcome in a TX status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDeliveryStatus {
    Success,
    /// The destination never acknowledged.
    NoAck,
    /// Clear channel assessment failed; the channel was busy.
    CcaFailure,
    /// Purged (0x03) or any other failure, with the raw code.
    PurgedOrOther(u8),
}

impl TxDeliveryStatus {
    /// The raw status byte.
    pub fn code(self) -> u8 {
        match self {
            TxDeliveryStatus::Success => 0x00,
            TxDeliveryStatus::NoAck => 0x01,
            TxDeliveryStatus::CcaFailure => 0x02,
            TxDeliveryStatus::PurgedOrOther(code) => code,
        }
    }
}

impl From<u8> for TxDeliveryStatus {
    fn from(code: u8) -> Self {
        match code {
            0x00 => TxDeliveryStatus::Success,
            0x01 => TxDeliveryStatus::NoAck,
            0x02 => TxDeliveryStatus::CcaFailure,
            other => TxDeliveryStatus::PurgedOrOther(other),
        }
    }
}

/// Decoded `0x8B` transmit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatus {
    /// Mark of the TX request this reports on.
    pub mark: u8,
    pub retry_count: u8,
    pub status: TxDeliveryStatus,
    /// Whether route discovery took place.
    pub routed: bool,
}

impl TxStatus {
    /// `Ok` on successful delivery, otherwise the status as an error.
    pub fn into_result(self) -> Result<()> {
        match self.status {
            TxDeliveryStatus::Success => Ok(()),
            status => Err(XbeeError::DeliveryFailed {
                status,
                retries: self.retry_count,
            }),
        }
    }
}

/// Decode a TX status frame.
pub fn decode_tx_status(payload: &[u8]) -> Result<TxStatus> {
    expect_frame(payload, FrameType::TxStatus, TX_STATUS_LEN)?;
    if payload.len() != TX_STATUS_LEN {
        return Err(XbeeError::LengthMismatch {
            declared: TX_STATUS_LEN,
            actual: payload.len(),
        });
    }

    Ok(TxStatus {
        mark: payload[1],
        retry_count: payload[4],
        status: TxDeliveryStatus::from(payload[5]),
        routed: payload[6] != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_unicast() {
        let payload = encode_tx_request(0x52, 0x0013_A200_1234_5678, 0, 0, b"TxData");
        assert_eq!(
            &payload[..],
            &[
                0x10, 0x52, 0x00, 0x13, 0xA2, 0x00, 0x12, 0x34, 0x56, 0x78, 0xFF, 0xFE, 0x00,
                0x00, 0x54, 0x78, 0x44, 0x61, 0x74, 0x61
            ]
        );
    }

    #[test]
    fn test_encode_broadcast() {
        let req = TxRequest::broadcast(&b"Broadcast"[..]).with_radius(1);
        assert_eq!(req.frame_type(), FrameType::TxRequest);
        assert_eq!(
            &req.encode_payload(0x00)[..],
            &[
                0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFE, 0x01,
                0x00, 0x42, 0x72, 0x6F, 0x61, 0x64, 0x63, 0x61, 0x73, 0x74
            ]
        );
    }

    #[test]
    fn test_decode_wrong_type() {
        let data = [0x85, 0x47, 0xFF, 0xFE, 0x00, 0x00, 0x02];
        assert!(matches!(
            decode_tx_status(&data),
            Err(XbeeError::UnexpectedFrameType { actual: 0x85, .. })
        ));
    }

    #[test]
    fn test_decode_short() {
        let data = [0x8B, 0x47, 0xFF, 0xFE, 0x00, 0x00];
        assert!(matches!(
            decode_tx_status(&data),
            Err(XbeeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decode_long() {
        let data = [0x8B, 0x47, 0xFF, 0xFE, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            decode_tx_status(&data),
            Err(XbeeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_success() {
        let status = decode_tx_status(&[0x8B, 0x47, 0xFF, 0xFE, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(
            status,
            TxStatus {
                mark: 0x47,
                retry_count: 0,
                status: TxDeliveryStatus::Success,
                routed: false,
            }
        );
        assert!(status.into_result().is_ok());
    }

    #[test]
    fn test_decode_no_ack() {
        let status = decode_tx_status(&[0x8B, 0x47, 0xFF, 0xFE, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(status.status, TxDeliveryStatus::NoAck);
        assert!(matches!(
            status.into_result(),
            Err(XbeeError::DeliveryFailed {
                status: TxDeliveryStatus::NoAck,
                retries: 0
            })
        ));
    }

    #[test]
    fn test_decode_routed_retried() {
        let status = decode_tx_status(&[0x8B, 0x47, 0xFF, 0xFE, 0x03, 0x01, 0x02]).unwrap();
        assert_eq!(status.retry_count, 3);
        assert_eq!(status.status, TxDeliveryStatus::NoAck);
        assert!(status.routed);
    }

    #[test]
    fn test_delivery_status_codes() {
        assert_eq!(TxDeliveryStatus::from(0x02), TxDeliveryStatus::CcaFailure);
        assert_eq!(TxDeliveryStatus::from(0x03), TxDeliveryStatus::PurgedOrOther(0x03));
        assert_eq!(TxDeliveryStatus::from(0x25).code(), 0x25);
        for code in 0u8..=3 {
            assert_eq!(TxDeliveryStatus::from(code).code(), code);
        }
    }
}
