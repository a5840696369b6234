//! Transport module - the byte stream a session runs on.
//!
//! A session works over anything implementing [`Transport`]: a TCP socket to
//! a radio bridge, a serial port, or an in-memory `tokio::io::duplex` pipe in
//! tests. [`DeviceSpec`] turns a device string into an open transport:
//!
//! - `tcp://host:port`
//! - `/dev/ttyUSB0` or `/dev/ttyUSB0:115200`
//! - `COM3` or `COM3:115200`
//!
//! Serial devices need the `serial` feature.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Result, XbeeError};

/// Default serial speed of a factory-fresh radio.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Byte stream a session can own.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// A transport whose concrete type was chosen at runtime.
pub type BoxedTransport = Box<dyn Transport>;

/// Where to find the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    /// `host:port` of a TCP bridge.
    Tcp(String),
    /// A local serial port.
    Serial { path: String, baud: u32 },
}

impl DeviceSpec {
    /// Parse a device string.
    ///
    /// ```
    /// use xbee_session::transport::DeviceSpec;
    ///
    /// assert_eq!(
    ///     DeviceSpec::parse("/dev/ttyUSB0:115200").unwrap(),
    ///     DeviceSpec::Serial { path: "/dev/ttyUSB0".into(), baud: 115200 }
    /// );
    /// ```
    pub fn parse(device: &str) -> Result<Self> {
        if let Some(addr) = device.strip_prefix("tcp://") {
            if addr.is_empty() {
                return Err(XbeeError::InvalidDevice(device.to_string()));
            }
            return Ok(DeviceSpec::Tcp(addr.to_string()));
        }

        let is_serial = device.starts_with("/dev/")
            || device
                .get(..3)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("COM"));
        if !is_serial {
            return Err(XbeeError::InvalidDevice(device.to_string()));
        }

        let (path, baud) = match device.rsplit_once(':') {
            Some((path, baud)) => {
                let baud = baud
                    .parse()
                    .map_err(|_| XbeeError::InvalidDevice(device.to_string()))?;
                (path, baud)
            }
            None => (device, DEFAULT_BAUD_RATE),
        };

        if path.is_empty() {
            return Err(XbeeError::InvalidDevice(device.to_string()));
        }

        Ok(DeviceSpec::Serial {
            path: path.to_string(),
            baud,
        })
    }

    /// Connect or open the device.
    pub async fn open(&self) -> Result<BoxedTransport> {
        match self {
            DeviceSpec::Tcp(addr) => {
                let stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
                stream.set_nodelay(true)?;
                tracing::debug!(%addr, "connected");
                Ok(Box::new(stream))
            }
            DeviceSpec::Serial { path, baud } => open_serial(path, *baud),
        }
    }
}

impl std::str::FromStr for DeviceSpec {
    type Err = XbeeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(feature = "serial")]
fn open_serial(path: &str, baud: u32) -> Result<BoxedTransport> {
    use tokio_serial::SerialPortBuilderExt;

    let port = tokio_serial::new(path, baud).open_native_async()?;
    tracing::debug!(path, baud, "opened serial port");
    Ok(Box::new(port))
}

#[cfg(not(feature = "serial"))]
fn open_serial(path: &str, _baud: u32) -> Result<BoxedTransport> {
    Err(XbeeError::InvalidDevice(format!(
        "{path}: serial support not compiled in (enable the `serial` feature)"
    )))
}
