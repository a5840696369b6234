//! Protocol module - API frame codec and stream reassembly.
//!
//! This module implements the outer shell of every XBee API frame:
//! - delimiter / length / checksum encoding and validation
//! - a restartable scanner that recovers frames from a noisy byte stream
//! - the [`Frame`] struct with typed accessors

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::{scan_frame, scan_frame_bounded, FrameBuffer, Scan};
pub use wire_format::{
    checksum, decode_frame, encode_frame, encode_frame_into, FrameType,
    DEFAULT_MAX_FRAME_PAYLOAD, FRAME_OVERHEAD, MAX_PAYLOAD_SIZE, PREFIX_SIZE, START_DELIMITER,
};
