//! AT commands, local and remote, and their responses.
//!
//! ```text
//! AT / Queued AT:   type(1) │ mark(1) │ cmd(2) │ parameter(n)
//! Remote AT:        0x17 │ mark │ dest(8) │ 0xFFFE │ options(1) │ cmd(2) │ parameter(n)
//! AT response:      0x88 │ mark │ cmd(2) │ status(1) │ data(n)
//! Remote response:  0x97 │ mark │ src(8) │ src16(2) │ cmd(2) │ status(1) │ data(n)
//! ```
//!
//! An absent parameter queries the current value; a present one sets it.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use super::{expect_frame, read_u64, Frameable, UNKNOWN_NETWORK_ADDRESS};
use crate::error::{Result, XbeeError};
use crate::protocol::FrameType;

/// Fixed part of an AT command response.
const AT_RESPONSE_HEADER: usize = 5;

/// Fixed part of a remote AT command response.
const REMOTE_AT_RESPONSE_HEADER: usize = 15;

/// Option bits for remote AT command requests.
pub mod remote_options {
    /// Ask the remote radio not to acknowledge.
    pub const DISABLE_ACK: u8 = 0b0000_0001;
    /// Apply the change immediately instead of queueing it.
    pub const APPLY_CHANGES: u8 = 0b0000_0010;
}

/// Two-character AT command name, e.g. `ID` or `SH`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtMnemonic([u8; 2]);

impl AtMnemonic {
    /// Create a mnemonic from two raw characters.
    pub const fn new(first: u8, second: u8) -> Self {
        Self([first, second])
    }

    /// The two command bytes as sent on the wire.
    #[inline]
    pub const fn bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl FromStr for AtMnemonic {
    type Err = XbeeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.as_bytes() {
            [a, b] if a.is_ascii_graphic() && b.is_ascii_graphic() => Ok(Self([*a, *b])),
            _ => Err(XbeeError::InvalidMnemonic(s.to_string())),
        }
    }
}

impl fmt::Display for AtMnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

impl fmt::Debug for AtMnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtMnemonic({})", self)
    }
}

/// Command status reported in an AT response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtStatus {
    Ok,
    Error,
    InvalidCommand,
    InvalidParameter,
    /// Any other status byte, e.g. 0x04 (remote transmission failure).
    Other(u8),
}

impl AtStatus {
    /// The raw status byte.
    pub fn code(self) -> u8 {
        match self {
            AtStatus::Ok => 0,
            AtStatus::Error => 1,
            AtStatus::InvalidCommand => 2,
            AtStatus::InvalidParameter => 3,
            AtStatus::Other(code) => code,
        }
    }
}

impl From<u8> for AtStatus {
    fn from(code: u8) -> Self {
        match code {
            0 => AtStatus::Ok,
            1 => AtStatus::Error,
            2 => AtStatus::InvalidCommand,
            3 => AtStatus::InvalidParameter,
            other => AtStatus::Other(other),
        }
    }
}

/// A local AT command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommand {
    pub mnemonic: AtMnemonic,
    /// `None` queries the current value.
    pub parameter: Option<Bytes>,
    /// Queue the change until an `AC` command applies it.
    pub queued: bool,
}

impl AtCommand {
    /// A query for the current value.
    pub fn query(mnemonic: AtMnemonic) -> Self {
        Self {
            mnemonic,
            parameter: None,
            queued: false,
        }
    }

    /// Set a new value.
    pub fn set(mnemonic: AtMnemonic, parameter: impl Into<Bytes>) -> Self {
        Self {
            mnemonic,
            parameter: Some(parameter.into()),
            queued: false,
        }
    }

    /// Mark this command as queued.
    pub fn queued(mut self, queued: bool) -> Self {
        self.queued = queued;
        self
    }
}

impl Frameable for AtCommand {
    fn frame_type(&self) -> FrameType {
        if self.queued {
            FrameType::QueuedAtCommand
        } else {
            FrameType::AtCommand
        }
    }

    fn encode_payload(&self, mark: u8) -> Bytes {
        encode_at_command(self.mnemonic, self.parameter.as_deref(), mark, self.queued)
    }
}

/// Encode a local AT command.
///
/// # Example
///
/// ```
/// use xbee_session::codec::{encode_at_command, AtMnemonic};
///
/// let payload = encode_at_command(AtMnemonic::new(b'B', b'D'), Some(&[0x07][..]), 0x53, true);
/// assert_eq!(&payload[..], &[0x09, 0x53, 0x42, 0x44, 0x07]);
/// ```
pub fn encode_at_command(
    mnemonic: AtMnemonic,
    parameter: Option<&[u8]>,
    mark: u8,
    queued: bool,
) -> Bytes {
    let parameter = parameter.unwrap_or_default();
    let frame_type = if queued {
        FrameType::QueuedAtCommand
    } else {
        FrameType::AtCommand
    };

    let mut buf = BytesMut::with_capacity(4 + parameter.len());
    buf.put_u8(frame_type.id());
    buf.put_u8(mark);
    buf.put_slice(&mnemonic.bytes());
    buf.put_slice(parameter);
    buf.freeze()
}

/// An AT command addressed to a remote radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtCommand {
    pub command: AtCommand,
    pub destination: u64,
    /// See [`remote_options`].
    pub options: u8,
}

impl RemoteAtCommand {
    /// Address `command` to `destination`.
    ///
    /// Non-queued commands get [`remote_options::APPLY_CHANGES`].
    pub fn new(destination: u64, command: AtCommand) -> Self {
        let options = if command.queued {
            0
        } else {
            remote_options::APPLY_CHANGES
        };
        Self {
            command,
            destination,
            options,
        }
    }
}

impl Frameable for RemoteAtCommand {
    fn frame_type(&self) -> FrameType {
        FrameType::RemoteAtCommand
    }

    fn encode_payload(&self, mark: u8) -> Bytes {
        // Nobody will wait on mark 0, so don't make the remote answer.
        let options = if mark == 0 {
            self.options | remote_options::DISABLE_ACK
        } else {
            self.options
        };
        encode_remote_at_command(
            self.command.mnemonic,
            self.command.parameter.as_deref(),
            mark,
            self.destination,
            options,
        )
    }
}

/// Encode a remote AT command request.
pub fn encode_remote_at_command(
    mnemonic: AtMnemonic,
    parameter: Option<&[u8]>,
    mark: u8,
    destination: u64,
    options: u8,
) -> Bytes {
    let parameter = parameter.unwrap_or_default();

    let mut buf = BytesMut::with_capacity(15 + parameter.len());
    buf.put_u8(FrameType::RemoteAtCommand.id());
    buf.put_u8(mark);
    buf.put_u64(destination);
    buf.put_slice(&UNKNOWN_NETWORK_ADDRESS);
    buf.put_u8(options);
    buf.put_slice(&mnemonic.bytes());
    buf.put_slice(parameter);
    buf.freeze()
}

/// Decoded `0x88` AT command response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtResponse {
    pub mark: u8,
    pub mnemonic: AtMnemonic,
    pub status: AtStatus,
    /// Query result; empty for set commands.
    pub data: Bytes,
}

impl AtResponse {
    /// The response data if the status is OK, otherwise the status as an error.
    pub fn into_result(self) -> Result<Bytes> {
        at_result(self.mnemonic, self.status, self.data)
    }
}

/// Decode an AT command response.
///
/// # Example
///
/// ```
/// use xbee_session::codec::{decode_at_response, AtStatus};
///
/// let resp = decode_at_response(&[0x88, 0x53, 0x49, 0x44, 0x00, 0x43, 0xEF]).unwrap();
/// assert_eq!(resp.mnemonic.to_string(), "ID");
/// assert_eq!(resp.status, AtStatus::Ok);
/// assert_eq!(&resp.data[..], &[0x43, 0xEF]);
/// ```
pub fn decode_at_response(payload: &[u8]) -> Result<AtResponse> {
    expect_frame(payload, FrameType::AtResponse, AT_RESPONSE_HEADER)?;

    Ok(AtResponse {
        mark: payload[1],
        mnemonic: AtMnemonic::new(payload[2], payload[3]),
        status: AtStatus::from(payload[4]),
        data: Bytes::copy_from_slice(&payload[AT_RESPONSE_HEADER..]),
    })
}

/// Decoded `0x97` remote AT command response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtResponse {
    pub mark: u8,
    /// 64-bit address of the responding radio.
    pub source: u64,
    pub mnemonic: AtMnemonic,
    pub status: AtStatus,
    pub data: Bytes,
}

impl RemoteAtResponse {
    /// The response data if the status is OK, otherwise the status as an error.
    pub fn into_result(self) -> Result<Bytes> {
        at_result(self.mnemonic, self.status, self.data)
    }
}

/// Decode a remote AT command response.
pub fn decode_remote_at_response(payload: &[u8]) -> Result<RemoteAtResponse> {
    expect_frame(payload, FrameType::RemoteAtResponse, REMOTE_AT_RESPONSE_HEADER)?;

    Ok(RemoteAtResponse {
        mark: payload[1],
        source: read_u64(payload, 2),
        mnemonic: AtMnemonic::new(payload[12], payload[13]),
        status: AtStatus::from(payload[14]),
        data: Bytes::copy_from_slice(&payload[REMOTE_AT_RESPONSE_HEADER..]),
    })
}

fn at_result(mnemonic: AtMnemonic, status: AtStatus, data: Bytes) -> Result<Bytes> {
    match status {
        AtStatus::Ok => Ok(data),
        status => Err(XbeeError::AtCommandFailed {
            mnemonic: mnemonic.to_string(),
            status,
        }),
    }
}
