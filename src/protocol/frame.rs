//! Frame struct with typed accessors.
//!
//! A [`Frame`] is the validated payload of one API frame. Uses
//! `bytes::Bytes` so a payload can be handed to a waiting caller without
//! copying.
//!
//! # Example
//!
//! ```
//! use xbee_session::protocol::{Frame, FrameType};
//!
//! let frame = Frame::decode(&[0x7E, 0x00, 0x05, 0x88, 0x01, 0x49, 0x44, 0x00, 0xE9]).unwrap();
//! assert_eq!(frame.frame_type(), Some(FrameType::AtResponse));
//! assert_eq!(frame.mark(), Some(1));
//! ```

use bytes::Bytes;

use super::wire_format::{decode_frame, encode_frame, FrameType};
use crate::error::Result;

/// A complete, checksum-validated API frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame data (API identifier first).
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from an already-validated payload.
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Validate a raw frame (delimiter through checksum) and copy out its payload.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let payload = decode_frame(raw)?;
        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Encode this frame for the wire.
    pub fn encode(&self) -> Result<Bytes> {
        encode_frame(&self.payload)
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The raw API identifier, if the payload is not empty.
    #[inline]
    pub fn type_id(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// The API identifier, if it is one this crate knows.
    #[inline]
    pub fn frame_type(&self) -> Option<FrameType> {
        self.type_id().and_then(|id| FrameType::try_from(id).ok())
    }

    /// The correlation mark, for frame types that carry one.
    #[inline]
    pub fn mark(&self) -> Option<u8> {
        match self.frame_type() {
            Some(ft) if ft.is_response() => self.payload.get(1).copied(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::new(Bytes::from_static(&[0x8B, 0x47, 0xFF, 0xFE, 0x00, 0x00, 0x00]));
        assert_eq!(frame.type_id(), Some(0x8B));
        assert_eq!(frame.frame_type(), Some(FrameType::TxStatus));
        assert_eq!(frame.mark(), Some(0x47));
    }

    #[test]
    fn test_frame_without_mark() {
        let frame = Frame::new(Bytes::from_static(&[0x90, 0x00, 0x13]));
        assert_eq!(frame.frame_type(), Some(FrameType::RxPacket));
        assert_eq!(frame.mark(), None);
    }

    #[test]
    fn test_unknown_frame_type() {
        let frame = Frame::new(Bytes::from_static(&[0x95, 0x01]));
        assert_eq!(frame.type_id(), Some(0x95));
        assert_eq!(frame.frame_type(), None);
        assert_eq!(frame.mark(), None);
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::new(Bytes::new());
        assert_eq!(frame.type_id(), None);
        assert_eq!(frame.mark(), None);
    }

    #[test]
    fn test_response_frame_missing_mark_byte() {
        let frame = Frame::new(Bytes::from_static(&[0x88]));
        assert_eq!(frame.frame_type(), Some(FrameType::AtResponse));
        assert_eq!(frame.mark(), None);
    }

    #[test]
    fn test_decode_encode_roundtrip() {
        let raw = [0x7E, 0x00, 0x02, 0x23, 0x11, 0xCB];
        let frame = Frame::decode(&raw).unwrap();
        assert_eq!(frame.payload(), &[0x23, 0x11]);
        assert_eq!(&frame.encode().unwrap()[..], &raw);
    }
}
