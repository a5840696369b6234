//! Stream reassembly: turning a raw byte stream into candidate frames.
//!
//! The core is [`scan_frame`], a restartable scan-until-token function with
//! no state beyond the buffer the caller holds. [`FrameBuffer`] owns such a
//! buffer (a `bytes::BytesMut`) and calls the scanner until it stops making
//! progress.
//!
//! Noise handling:
//! - bytes before the first `0x7E` are discarded
//! - a `0x7E` whose frame is still incomplete is kept, only bytes strictly
//!   before it are discarded
//! - a candidate failing its checksum is still emitted (so the codec can
//!   report it), but only its delimiter is consumed, so a real frame hidden
//!   behind a false delimiter is found on the next scan
//!
//! # Example
//!
//! ```
//! use xbee_session::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Garbage, then a frame split across two reads.
//! assert!(buffer.push(&[0x00, 0x13, 0x7E, 0x00]).is_empty());
//! let frames = buffer.push(&[0x02, 0x23, 0x11, 0xCB]);
//!
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].as_ref().unwrap().payload(), &[0x23, 0x11]);
//! ```

use bytes::{Buf, BytesMut};

use super::wire_format::{
    checksum_valid, DEFAULT_MAX_FRAME_PAYLOAD, FRAME_OVERHEAD, MAX_PAYLOAD_SIZE, START_DELIMITER,
};
use super::Frame;
use crate::error::Result;

/// Outcome of one [`scan_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan<'a> {
    /// Number of leading bytes the caller should drop from its buffer.
    pub consumed: usize,
    /// Candidate frame, delimiter through checksum.
    pub frame: Option<&'a [u8]>,
}

impl<'a> Scan<'a> {
    #[inline]
    fn skip(consumed: usize) -> Self {
        Self {
            consumed,
            frame: None,
        }
    }
}

/// Scan `data` for the next frame, accepting any length the header allows.
///
/// `at_end` signals that no more bytes will follow; incomplete frames are
/// then dropped instead of waited on, so repeated calls always drain the
/// input.
pub fn scan_frame(data: &[u8], at_end: bool) -> Scan<'_> {
    scan_frame_bounded(data, at_end, MAX_PAYLOAD_SIZE)
}

/// Like [`scan_frame`], but a delimiter announcing more than `max_payload`
/// bytes is treated as noise.
pub fn scan_frame_bounded(data: &[u8], at_end: bool, max_payload: usize) -> Scan<'_> {
    if data.is_empty() {
        return Scan::skip(0);
    }

    let Some(start) = data.iter().position(|&b| b == START_DELIMITER) else {
        // Nothing resembling a frame: all of it is garbage.
        return Scan::skip(data.len());
    };

    let rest = &data[start..];
    let wait_or_drop = if at_end { start + 1 } else { start };

    if rest.len() < FRAME_OVERHEAD {
        return Scan::skip(wait_or_drop);
    }

    let payload_len = u16::from_be_bytes([rest[1], rest[2]]) as usize;
    if payload_len > max_payload {
        return Scan::skip(start + 1);
    }

    let total = payload_len + FRAME_OVERHEAD;
    if rest.len() < total {
        return Scan::skip(wait_or_drop);
    }

    let candidate = &rest[..total];
    let consumed = if checksum_valid(candidate) {
        start + total
    } else {
        start + 1
    };

    Scan {
        consumed,
        frame: Some(candidate),
    }
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Delimiters announcing a longer payload are skipped.
    max_payload: usize,
}

impl FrameBuffer {
    /// Create a frame buffer with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_FRAME_PAYLOAD)
    }

    /// Create a frame buffer with a custom payload limit.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            max_payload: max_payload.min(MAX_PAYLOAD_SIZE),
        }
    }

    /// Push data into the buffer and extract every complete frame.
    ///
    /// Each candidate is validated; malformed candidates come back as `Err`
    /// in stream order so the caller can log them and carry on.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<Frame>> {
        self.buffer.extend_from_slice(data);
        self.drain(false)
    }

    /// Extract what is left once the stream has ended.
    ///
    /// Incomplete trailing frames are discarded; the buffer is empty afterwards.
    pub fn finish(&mut self) -> Vec<Result<Frame>> {
        self.drain(true)
    }

    fn drain(&mut self, at_end: bool) -> Vec<Result<Frame>> {
        let mut frames = Vec::new();

        loop {
            let scan = scan_frame_bounded(&self.buffer, at_end, self.max_payload);
            let consumed = scan.consumed;
            if let Some(raw) = scan.frame {
                frames.push(Frame::decode(raw));
            }
            if consumed == 0 {
                break;
            }
            self.buffer.advance(consumed);
        }

        frames
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
