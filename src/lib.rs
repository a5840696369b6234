//! # xbee-session
//!
//! Talks to an XBee radio in API mode over any async byte stream.
//!
//! This crate frames outbound requests, reassembles inbound frames from a
//! noisy stream, and pairs every response with the call that is waiting for
//! it. Application data is exposed through plain `read`/`write` calls.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): API frame envelope and stream reassembly
//! - **Codec** ([`codec`]): frame data for AT commands, transmissions and receptions
//! - **Conntrack** ([`conntrack`]): one-byte marks correlating requests and responses
//! - **Session** ([`Session`]): read loop, writer task and the public calls
//!
//! ## Example
//!
//! ```no_run
//! use xbee_session::transport::DeviceSpec;
//! use xbee_session::Session;
//!
//! #[tokio::main]
//! async fn main() -> xbee_session::error::Result<()> {
//!     let transport = DeviceSpec::parse("tcp://127.0.0.1:9750")?.open().await?;
//!     let session = Session::open(transport);
//!
//!     println!("local address {:016X}", session.local_address().await?);
//!
//!     session.write(b"ping").await?;
//!     let mut buf = [0u8; 256];
//!     let n = session.read(&mut buf).await?;
//!     println!("received {:?}", &buf[..n]);
//!
//!     session.close().await
//! }
//! ```

pub mod codec;
pub mod config;
pub mod conntrack;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod writer;

mod session;

pub use config::SessionConfig;
pub use error::XbeeError;
pub use session::{Conn, Session, SessionBuilder};
