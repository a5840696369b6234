//! Wire format encoding and decoding.
//!
//! Implements the XBee API frame:
//! ```text
//! ┌───────────┬──────────┬──────────────┬──────────┐
//! │ Delimiter │ Length   │ Frame data   │ Checksum │
//! │ 0x7E      │ 2 bytes  │ Length bytes │ 1 byte   │
//! │           │ uint16 BE│              │          │
//! └───────────┴──────────┴──────────────┴──────────┘
//! ```
//!
//! The length counts frame data only. The checksum is
//! `0xFF - (sum(frame data) mod 256)`. The first byte of the frame data is
//! the API identifier (see [`FrameType`]).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, XbeeError};

/// Start delimiter that opens every API frame.
pub const START_DELIMITER: u8 = 0x7E;

/// Delimiter plus the two length bytes.
pub const PREFIX_SIZE: usize = 3;

/// Bytes a frame adds around its payload (delimiter, length, checksum).
pub const FRAME_OVERHEAD: usize = PREFIX_SIZE + 1;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;

/// Default payload limit applied by the session's reassembler.
///
/// XBee API frames are a few hundred bytes at most; a delimiter announcing
/// more than this is treated as noise rather than waited on.
pub const DEFAULT_MAX_FRAME_PAYLOAD: usize = 1024;

/// API identifiers this crate produces or consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Local AT command, applied immediately.
    AtCommand = 0x08,
    /// Local AT command, queued until `AC` is issued.
    QueuedAtCommand = 0x09,
    /// Data transmission request.
    TxRequest = 0x10,
    /// AT command addressed to a remote radio.
    RemoteAtCommand = 0x17,
    /// Response to a local AT command.
    AtResponse = 0x88,
    /// Unsolicited modem status report.
    ModemStatus = 0x8A,
    /// Delivery outcome of a [`FrameType::TxRequest`].
    TxStatus = 0x8B,
    /// Inbound application data.
    RxPacket = 0x90,
    /// Response to a remote AT command.
    RemoteAtResponse = 0x97,
}

impl FrameType {
    /// The API identifier byte.
    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Whether frames of this type carry a mark at byte offset 1 that pairs
    /// them with an earlier request.
    #[inline]
    pub fn is_response(self) -> bool {
        matches!(
            self,
            FrameType::AtResponse | FrameType::TxStatus | FrameType::RemoteAtResponse
        )
    }
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Ok(match value {
            0x08 => FrameType::AtCommand,
            0x09 => FrameType::QueuedAtCommand,
            0x10 => FrameType::TxRequest,
            0x17 => FrameType::RemoteAtCommand,
            0x88 => FrameType::AtResponse,
            0x8A => FrameType::ModemStatus,
            0x8B => FrameType::TxStatus,
            0x90 => FrameType::RxPacket,
            0x97 => FrameType::RemoteAtResponse,
            other => return Err(other),
        })
    }
}

/// Compute the checksum for a frame payload.
///
/// # Example
///
/// ```
/// use xbee_session::protocol::checksum;
///
/// assert_eq!(checksum(&[0x23, 0x11]), 0xCB);
/// assert_eq!(checksum(&[]), 0xFF);
/// ```
#[inline]
pub fn checksum(payload: &[u8]) -> u8 {
    let sum = payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0xFF - sum
}

/// Wrap a payload in delimiter, length and checksum.
///
/// # Example
///
/// ```
/// use xbee_session::protocol::encode_frame;
///
/// let wire = encode_frame(&[0x23, 0x11]).unwrap();
/// assert_eq!(&wire[..], &[0x7E, 0x00, 0x02, 0x23, 0x11, 0xCB]);
/// ```
///
/// # Errors
///
/// Returns [`XbeeError::PayloadTooLarge`] if the payload exceeds 65535 bytes.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);
    encode_frame_into(payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a frame into an existing buffer.
pub fn encode_frame_into(payload: &[u8], buf: &mut BytesMut) -> Result<()> {
    let len = u16::try_from(payload.len()).map_err(|_| XbeeError::PayloadTooLarge(payload.len()))?;
    buf.reserve(payload.len() + FRAME_OVERHEAD);
    buf.put_u8(START_DELIMITER);
    buf.put_u16(len);
    buf.put_slice(payload);
    buf.put_u8(checksum(payload));
    Ok(())
}

/// Validate a complete raw frame and return its payload.
///
/// The input must be exactly one frame, delimiter through checksum. Partial
/// frames are the reassembler's concern (see
/// [`FrameBuffer`](super::FrameBuffer)).
///
/// # Errors
///
/// - [`XbeeError::InvalidDelimiter`] if the first byte is not `0x7E`
/// - [`XbeeError::LengthMismatch`] if the length field disagrees with the input size
/// - [`XbeeError::ChecksumMismatch`] if the trailing byte fails validation
pub fn decode_frame(raw: &[u8]) -> Result<&[u8]> {
    match raw.first() {
        Some(&START_DELIMITER) => {}
        Some(&other) => return Err(XbeeError::InvalidDelimiter(other)),
        None => {
            return Err(XbeeError::LengthMismatch {
                declared: 0,
                actual: 0,
            })
        }
    }

    if raw.len() < FRAME_OVERHEAD {
        return Err(XbeeError::LengthMismatch {
            declared: 0,
            actual: raw.len().saturating_sub(FRAME_OVERHEAD),
        });
    }

    let declared = u16::from_be_bytes([raw[1], raw[2]]) as usize;
    let actual = raw.len() - FRAME_OVERHEAD;
    if declared != actual {
        return Err(XbeeError::LengthMismatch { declared, actual });
    }

    let payload = &raw[PREFIX_SIZE..raw.len() - 1];
    let expected = checksum(payload);
    let found = raw[raw.len() - 1];
    if expected != found {
        return Err(XbeeError::ChecksumMismatch {
            expected,
            actual: found,
        });
    }

    Ok(payload)
}

/// Whether `raw` (delimiter through checksum, length already known to match)
/// carries a valid checksum.
#[inline]
pub(crate) fn checksum_valid(raw: &[u8]) -> bool {
    raw.len() >= FRAME_OVERHEAD && checksum(&raw[PREFIX_SIZE..raw.len() - 1]) == raw[raw.len() - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_frame() {
        let wire = encode_frame(&[0x23, 0x11]).unwrap();
        assert_eq!(&wire[..], &[0x7E, 0x00, 0x02, 0x23, 0x11, 0xCB]);
    }

    #[test]
    fn test_decode_known_frame() {
        let payload = decode_frame(&[0x7E, 0x00, 0x02, 0x23, 0x11, 0xCB]).unwrap();
        assert_eq!(payload, &[0x23, 0x11]);
    }

    #[test]
    fn test_decode_checksum_off_by_one() {
        let err = decode_frame(&[0x7E, 0x00, 0x02, 0x23, 0x11, 0xCA]).unwrap_err();
        assert!(matches!(
            err,
            XbeeError::ChecksumMismatch {
                expected: 0xCB,
                actual: 0xCA
            }
        ));
    }

    #[test]
    fn test_decode_missing_delimiter() {
        let err = decode_frame(&[0x00, 0x02, 0x03, 0x00, 0x03]).unwrap_err();
        assert!(matches!(err, XbeeError::InvalidDelimiter(0x00)));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let err = decode_frame(&[0x7E, 0x00, 0x03, 0x23, 0x11, 0xCB]).unwrap_err();
        assert!(matches!(
            err,
            XbeeError::LengthMismatch {
                declared: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_decode_too_short() {
        assert!(decode_frame(&[]).is_err());
        assert!(decode_frame(&[0x7E, 0x00]).is_err());
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let wire = encode_frame(&[]).unwrap();
        assert_eq!(&wire[..], &[0x7E, 0x00, 0x00, 0xFF]);
        assert!(decode_frame(&wire).unwrap().is_empty());
    }

    #[test]
    fn test_roundtrip_length_boundaries() {
        for len in [1usize, 255, 256, 0x7E, 0x7E7E, MAX_PAYLOAD_SIZE] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let wire = encode_frame(&payload).unwrap();
            assert_eq!(wire.len(), len + FRAME_OVERHEAD);
            assert_eq!(decode_frame(&wire).unwrap(), &payload[..]);
        }
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            encode_frame(&payload),
            Err(XbeeError::PayloadTooLarge(n)) if n == MAX_PAYLOAD_SIZE + 1
        ));
    }

    #[test]
    fn test_single_byte_corruption_detected() {
        let payload = [0x10, 0x01, 0x00, 0x13, 0xA2, 0x00, 0x41, 0x42];
        let wire = encode_frame(&payload).unwrap();

        // Every payload byte and the checksum itself.
        for idx in PREFIX_SIZE..wire.len() {
            for flip in [0x01u8, 0x80, 0xFF] {
                let mut corrupted = wire.to_vec();
                corrupted[idx] ^= flip;
                assert!(
                    matches!(
                        decode_frame(&corrupted),
                        Err(XbeeError::ChecksumMismatch { .. })
                    ),
                    "corruption at {} not detected",
                    idx
                );
            }
        }
    }

    #[test]
    fn test_frame_type_roundtrip() {
        for id in 0u8..=255 {
            if let Ok(ft) = FrameType::try_from(id) {
                assert_eq!(ft.id(), id);
            }
        }
        assert_eq!(FrameType::try_from(0x91), Err(0x91));
    }

    #[test]
    fn test_frame_type_response_classification() {
        assert!(FrameType::AtResponse.is_response());
        assert!(FrameType::TxStatus.is_response());
        assert!(FrameType::RemoteAtResponse.is_response());
        assert!(!FrameType::RxPacket.is_response());
        assert!(!FrameType::ModemStatus.is_response());
        assert!(!FrameType::AtCommand.is_response());
    }

    #[test]
    fn test_checksum_valid_helper() {
        assert!(checksum_valid(&[0x7E, 0x00, 0x02, 0x23, 0x11, 0xCB]));
        assert!(!checksum_valid(&[0x7E, 0x00, 0x02, 0x23, 0x11, 0xCA]));
        assert!(!checksum_valid(&[0x7E]));
    }
}
