//! Session façade and its background dispatch loop.
//!
//! The [`SessionBuilder`] provides a fluent API for configuring timeouts and
//! buffer sizes. [`Session::open`] then takes ownership of a transport and
//! runs two tasks:
//! 1. the read loop, which reassembles API frames and routes them
//! 2. the writer task, which serializes outbound frames
//!
//! Inbound data goes to the session's read buffer, or to the [`Conn`] dialed
//! for its source address. Responses go to the [`MarkPool`], which wakes the
//! caller waiting on that mark.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use xbee_session::Session;
//!
//! # async fn run() -> xbee_session::error::Result<()> {
//! let stream = tokio::net::TcpStream::connect("127.0.0.1:9750").await?;
//! let session = Session::builder()
//!     .call_timeout(Duration::from_secs(2))
//!     .open(stream);
//!
//! let id = session.at_command("ID", None, false).await?;
//! println!("PAN ID: {id:02X?}");
//!
//! session.write(b"hello").await?;
//! session.close().await
//! # }
//! ```

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::codec::{
    decode_at_response, decode_remote_at_response, decode_rx_packet, decode_tx_status, AtCommand,
    AtMnemonic, Frameable, RemoteAtCommand, RxPacket, TxRequest, BROADCAST_ADDRESS,
};
use crate::config::SessionConfig;
use crate::conntrack::MarkPool;
use crate::error::{Result, XbeeError};
use crate::protocol::{Frame, FrameBuffer, FrameType};
use crate::transport::Transport;
use crate::writer::{spawn_writer_task, OutboundFrame, WriterConfig, WriterHandle};

/// Builder for configuring and opening a [`Session`].
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// How long a call waits for its response.
    ///
    /// Default: 1 second
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Frames announcing a longer payload are treated as line noise.
    ///
    /// Default: 1024
    pub fn max_frame_payload(mut self, limit: usize) -> Self {
        self.config.max_frame_payload = limit;
        self
    }

    /// Set the writer channel capacity.
    ///
    /// Default: 64
    pub fn write_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.write_channel_capacity = capacity;
        self
    }

    /// Bytes requested from the transport per read.
    ///
    /// Default: 4096
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Hop limit for transmitted data.
    ///
    /// Default: 0 (network maximum)
    pub fn broadcast_radius(mut self, radius: u8) -> Self {
        self.config.broadcast_radius = radius;
        self
    }

    /// Take over `transport` and start the session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<T: Transport>(self, transport: T) -> Session {
        Session::start(transport, self.config)
    }
}

/// Per-address routing entry.
struct Route {
    id: u64,
    tx: mpsc::UnboundedSender<Bytes>,
}

/// State shared by the session, its connections and its tasks.
struct Shared {
    marks: MarkPool,
    writer: WriterHandle,
    config: SessionConfig,
    routes: Mutex<HashMap<u64, Route>>,
    next_route_id: AtomicU64,
    close_tx: watch::Sender<bool>,
    /// First transport error, reported by reads once buffered data runs out.
    failure: Mutex<Option<(io::ErrorKind, String)>>,
}

impl Shared {
    fn routes(&self) -> MutexGuard<'_, HashMap<u64, Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop both tasks and fail every pending call.
    fn shut_down(&self) {
        self.close_tx.send_replace(true);
        self.marks.close();
    }

    fn record_failure(&self, error: &XbeeError) {
        let XbeeError::Io(e) = error else {
            return;
        };
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some((e.kind(), e.to_string()));
        }
    }

    fn failure(&self) -> Option<XbeeError> {
        let failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        failure
            .as_ref()
            .map(|(kind, message)| XbeeError::Io(io::Error::new(*kind, message.clone())))
    }

    /// Turn an inbox read into the caller's result.
    ///
    /// End of stream after a transport error is reported as that error.
    fn finish_read(&self, n: usize, requested: usize) -> Result<usize> {
        if n == 0 && requested > 0 {
            if let Some(e) = self.failure() {
                return Err(e);
            }
        }
        Ok(n)
    }

    /// Send `request` under a fresh mark and wait for its response.
    ///
    /// The call timeout covers queueing, writing and waiting. The mark goes
    /// back to the pool on every path.
    async fn call<F: Frameable + ?Sized>(&self, request: &F) -> Result<Bytes> {
        let pending = self.marks.acquire()?;
        let frame = OutboundFrame::from_request(request, pending.mark())?;
        tracing::trace!(
            frame_type = request.frame_type().id(),
            mark = pending.mark(),
            "sending request"
        );

        let timeout = self.config.call_timeout();
        let exchange = async {
            self.writer.send(frame).await?;
            pending.response().await
        };
        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| XbeeError::Timeout(timeout))?
    }

    async fn transmit(&self, destination: u64, payload: &[u8]) -> Result<usize> {
        let request = TxRequest::new(destination, Bytes::copy_from_slice(payload))
            .with_radius(self.config.broadcast_radius);
        let response = self.call(&request).await?;
        decode_tx_status(&response)?.into_result()?;
        Ok(payload.len())
    }

    fn deliver(&self, packet: RxPacket, inbox: &mpsc::UnboundedSender<Bytes>) {
        if packet.payload.is_empty() {
            return;
        }

        let payload = {
            let routes = self.routes();
            match routes.get(&packet.source) {
                Some(route) => match route.tx.send(packet.payload) {
                    Ok(()) => return,
                    // Conn is being dropped; fall back to the session.
                    Err(mpsc::error::SendError(payload)) => payload,
                },
                None => packet.payload,
            }
        };

        // Session already dropped.
        let _ = inbox.send(payload);
    }

    fn dispatch(&self, frame: Frame, inbox: &mpsc::UnboundedSender<Bytes>) {
        tracing::trace!(
            frame_type = frame.type_id(),
            mark = frame.mark(),
            len = frame.payload.len(),
            "dispatching frame"
        );

        match frame.frame_type() {
            Some(FrameType::RxPacket) => match decode_rx_packet(frame.payload()) {
                Ok(packet) => self.deliver(packet, inbox),
                Err(e) => tracing::warn!(error = %e, "dropping undecodable RX packet"),
            },
            Some(ft) if ft.is_response() => {
                let Some(mark) = frame.mark() else {
                    tracing::warn!(frame_type = ft.id(), "response frame without a mark");
                    return;
                };
                if let Err(e) = self.marks.release(mark, frame.payload) {
                    tracing::warn!(error = %e, frame_type = ft.id(), "dropping response");
                }
            }
            Some(FrameType::ModemStatus) => {
                tracing::info!(status = frame.payload.get(1).copied(), "modem status");
            }
            _ => {
                tracing::info!(frame_type = frame.type_id(), "ignoring unhandled frame type");
            }
        }
    }

    fn dial(self: &Arc<Self>, address: u64) -> Result<Conn> {
        if self.marks.is_closed() {
            return Err(XbeeError::ConnectionClosed);
        }

        let mut routes = self.routes();
        if routes.contains_key(&address) {
            return Err(XbeeError::AddressInUse(address));
        }

        let id = self.next_route_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        routes.insert(address, Route { id, tx });
        tracing::debug!(address = format_args!("{address:016X}"), "dialed");

        Ok(Conn {
            address,
            id,
            shared: self.clone(),
            inbox: tokio::sync::Mutex::new(Inbox::new(rx)),
        })
    }

    fn hang_up(&self, address: u64, id: u64) {
        let mut routes = self.routes();
        if routes.get(&address).is_some_and(|r| r.id == id) {
            routes.remove(&address);
            tracing::debug!(address = format_args!("{address:016X}"), "hung up");
        }
    }
}

/// Received payloads waiting to be read, plus what is left of the current one.
struct Inbox {
    rx: mpsc::UnboundedReceiver<Bytes>,
    leftover: Bytes,
}

impl Inbox {
    fn new(rx: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self {
            rx,
            leftover: Bytes::new(),
        }
    }

    /// Copy buffered data into `buf`; `0` means the stream has ended.
    async fn read(&mut self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }

        while self.leftover.is_empty() {
            match self.rx.recv().await {
                Some(payload) => self.leftover = payload,
                None => return 0,
            }
        }

        let n = buf.len().min(self.leftover.len());
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.advance(n);
        n
    }
}

/// An open link to a radio.
///
/// All methods take `&self`; a session can be shared between tasks behind an
/// `Arc`. Dropping the session stops its background tasks.
pub struct Session {
    shared: Arc<Shared>,
    inbox: tokio::sync::Mutex<Inbox>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Start a session on `transport` with default configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<T: Transport>(transport: T) -> Self {
        Self::start(transport, SessionConfig::default())
    }

    fn start<T: Transport>(transport: T, config: SessionConfig) -> Self {
        let (reader, write_half) = tokio::io::split(transport);
        let (close_tx, close_rx) = watch::channel(false);

        let writer_config = WriterConfig {
            channel_capacity: config.write_channel_capacity,
        };
        let (writer, writer_task) = spawn_writer_task(write_half, writer_config, close_rx);

        let shared = Arc::new(Shared {
            marks: MarkPool::new(),
            writer,
            config,
            routes: Mutex::new(HashMap::new()),
            next_route_id: AtomicU64::new(0),
            close_tx,
            failure: Mutex::new(None),
        });

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let read_shared = shared.clone();
        let read_task = tokio::spawn(async move {
            match read_loop(reader, &read_shared, &inbox_tx).await {
                Ok(()) => tracing::debug!("read loop finished"),
                Err(e) => {
                    tracing::error!(error = %e, "read loop terminated");
                    read_shared.record_failure(&e);
                }
            }
            read_shared.shut_down();
            // Readers see end of stream once their senders are gone, so the
            // failure has to be recorded first.
            read_shared.routes().clear();
            drop(inbox_tx);
        });

        let writer_shared = shared.clone();
        let writer_supervisor = tokio::spawn(async move {
            match writer_task.await {
                Ok(Ok(())) => tracing::debug!("writer task finished"),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "writer task terminated");
                    writer_shared.record_failure(&e);
                }
                Err(e) => tracing::error!(error = %e, "writer task panicked"),
            }
            writer_shared.shut_down();
        });

        tracing::debug!("session opened");

        Session {
            shared,
            inbox: tokio::sync::Mutex::new(Inbox::new(inbox_rx)),
            tasks: Mutex::new(vec![read_task, writer_supervisor]),
        }
    }

    /// The configuration this session runs with.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Whether the session has stopped, by `close` or because the transport failed.
    pub fn is_closed(&self) -> bool {
        self.shared.marks.is_closed()
    }

    /// Read received data not claimed by a [`Conn`].
    ///
    /// Waits until data arrives. Payloads are delivered in arrival order;
    /// one that doesn't fit in `buf` is continued on the next read. Returns
    /// `Ok(0)` once the session has closed and everything buffered has been
    /// read, or the transport error that stopped the session.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inbox.lock().await.read(buf).await;
        self.shared.finish_read(n, buf.len())
    }

    /// Broadcast `payload` and wait for its delivery report.
    pub async fn write(&self, payload: &[u8]) -> Result<usize> {
        self.shared.transmit(BROADCAST_ADDRESS, payload).await
    }

    /// Send `payload` to `destination` and wait for its delivery report.
    ///
    /// Returns [`XbeeError::DeliveryFailed`] unless the radio reports success.
    pub async fn write_to(&self, destination: u64, payload: &[u8]) -> Result<usize> {
        self.shared.transmit(destination, payload).await
    }

    /// Run an AT command on the local radio.
    ///
    /// `parameter == None` queries the current value. Returns the response
    /// data on OK, otherwise [`XbeeError::AtCommandFailed`].
    pub async fn at_command(
        &self,
        mnemonic: &str,
        parameter: Option<&[u8]>,
        queued: bool,
    ) -> Result<Bytes> {
        let command = build_command(mnemonic, parameter, queued)?;
        let response = self.shared.call(&command).await?;
        decode_at_response(&response)?.into_result()
    }

    /// Run an AT command on the radio at `destination`.
    pub async fn remote_at_command(
        &self,
        destination: u64,
        mnemonic: &str,
        parameter: Option<&[u8]>,
        queued: bool,
    ) -> Result<Bytes> {
        let command = RemoteAtCommand::new(destination, build_command(mnemonic, parameter, queued)?);
        let response = self.shared.call(&command).await?;
        decode_remote_at_response(&response)?.into_result()
    }

    /// The local radio's 64-bit address, from `SH` and `SL`.
    pub async fn local_address(&self) -> Result<u64> {
        let high = self.at_command("SH", None, false).await?;
        let low = self.at_command("SL", None, false).await?;
        Ok((be_value(&high) << 32) | be_value(&low))
    }

    /// Open a connection to `address`.
    ///
    /// Data received from `address` goes to the returned [`Conn`] instead of
    /// [`Session::read`]. Fails with [`XbeeError::AddressInUse`] while
    /// another `Conn` to the same address is open.
    pub fn dial(&self, address: u64) -> Result<Conn> {
        self.shared.dial(address)
    }

    /// Close the transport and stop the background tasks.
    ///
    /// Pending calls fail with [`XbeeError::ConnectionClosed`]. Data already
    /// received stays readable.
    pub async fn close(&self) -> Result<()> {
        self.shared.shut_down();

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            // Panics were already logged by the supervisor.
            let _ = task.await;
        }

        tracing::debug!("session closed");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.shut_down();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.shared.config)
            .field("marks", &self.shared.marks)
            .finish()
    }
}

/// A connection to one remote radio, opened with [`Session::dial`].
///
/// Dropping it unregisters the address.
pub struct Conn {
    address: u64,
    id: u64,
    shared: Arc<Shared>,
    inbox: tokio::sync::Mutex<Inbox>,
}

impl Conn {
    /// The remote radio's 64-bit address.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Read data received from this connection's address.
    ///
    /// Returns `Ok(0)` after [`Conn::close`] or once the session has closed,
    /// when everything buffered has been read. A transport failure is
    /// reported the same way as in [`Session::read`].
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inbox.lock().await.read(buf).await;
        self.shared.finish_read(n, buf.len())
    }

    /// Send `payload` to this connection's address.
    pub async fn write(&self, payload: &[u8]) -> Result<usize> {
        self.shared.transmit(self.address, payload).await
    }

    /// Stop routing data from this address to this connection.
    pub fn close(&self) {
        self.shared.hang_up(self.address, self.id);
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Conn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn")
            .field("address", &format_args!("{:016X}", self.address))
            .finish()
    }
}

/// Main read loop - reassembles frames and dispatches them until the
/// transport ends or the session is closed.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    shared: &Shared,
    inbox: &mpsc::UnboundedSender<Bytes>,
) -> Result<()> {
    let mut frame_buffer = FrameBuffer::with_max_payload(shared.config.max_frame_payload);
    let mut buf = vec![0u8; shared.config.read_chunk_size.max(1)];
    let mut closed = shared.close_tx.subscribe();

    loop {
        let n = tokio::select! {
            read = reader.read(&mut buf) => read?,
            _ = closed.wait_for(|closed| *closed) => return Ok(()),
        };

        let frames = if n == 0 {
            frame_buffer.finish()
        } else {
            frame_buffer.push(&buf[..n])
        };

        for frame in frames {
            match frame {
                Ok(frame) => shared.dispatch(frame, inbox),
                Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
            }
        }

        if n == 0 {
            tracing::debug!("transport reached end of stream");
            return Ok(());
        }
    }
}

fn build_command(mnemonic: &str, parameter: Option<&[u8]>, queued: bool) -> Result<AtCommand> {
    let mnemonic: AtMnemonic = mnemonic.parse()?;
    let command = match parameter {
        Some(value) => AtCommand::set(mnemonic, Bytes::copy_from_slice(value)),
        None => AtCommand::query(mnemonic),
    };
    Ok(command.queued(queued))
}

/// Big Endian value of up to eight bytes.
fn be_value(data: &[u8]) -> u64 {
    data.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWrite, ReadBuf};

    /// Transport whose reads and writes fail with fixed errors, or accept
    /// everything.
    struct BrokenLink {
        read_error: Option<io::ErrorKind>,
        write_error: Option<io::ErrorKind>,
    }

    impl AsyncRead for BrokenLink {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.read_error {
                Some(kind) => Poll::Ready(Err(io::Error::new(kind, "link down"))),
                // Never readable; the close signal ends the read loop.
                None => Poll::Pending,
            }
        }
    }

    impl AsyncWrite for BrokenLink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            match self.write_error {
                Some(kind) => Poll::Ready(Err(io::Error::new(kind, "link down"))),
                None => Poll::Ready(Ok(buf.len())),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn io_kind(result: Result<usize>) -> Option<io::ErrorKind> {
        match result {
            Err(XbeeError::Io(e)) => Some(e.kind()),
            _ => None,
        }
    }

    #[test]
    fn test_builder_configuration() {
        let builder = Session::builder()
            .call_timeout(Duration::from_millis(250))
            .max_frame_payload(128)
            .write_channel_capacity(4)
            .read_chunk_size(16)
            .broadcast_radius(2);

        assert_eq!(builder.config.call_timeout(), Duration::from_millis(250));
        assert_eq!(builder.config.max_frame_payload, 128);
        assert_eq!(builder.config.write_channel_capacity, 4);
        assert_eq!(builder.config.read_chunk_size, 16);
        assert_eq!(builder.config.broadcast_radius, 2);
    }

    #[test]
    fn test_builder_default() {
        assert_eq!(SessionBuilder::default().config, SessionConfig::default());
    }

    #[test]
    fn test_build_command() {
        let query = build_command("NI", None, false).unwrap();
        assert_eq!(query.parameter, None);
        assert!(!query.queued);

        let set = build_command("BD", Some(&[0x07][..]), true).unwrap();
        assert_eq!(set.parameter.as_deref(), Some(&[0x07][..]));
        assert!(set.queued);

        assert!(matches!(
            build_command("ABC", None, false),
            Err(XbeeError::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_be_value() {
        assert_eq!(be_value(&[]), 0);
        assert_eq!(be_value(&[0x00, 0x13, 0xA2, 0x00]), 0x0013_A200);
        assert_eq!(be_value(&[0x41, 0xAE, 0xB5, 0x4E]), 0x41AE_B54E);
    }

    #[tokio::test]
    async fn test_inbox_splits_payloads() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inbox = Inbox::new(rx);
        tx.send(Bytes::from_static(b"hello")).unwrap();
        tx.send(Bytes::from_static(b"world")).unwrap();
        drop(tx);

        let mut buf = [0u8; 3];
        assert_eq!(inbox.read(&mut buf).await, 3);
        assert_eq!(&buf, b"hel");
        assert_eq!(inbox.read(&mut buf).await, 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(inbox.read(&mut buf).await, 3);
        assert_eq!(&buf, b"wor");
        assert_eq!(inbox.read(&mut buf).await, 2);
        assert_eq!(inbox.read(&mut buf).await, 0);
    }

    #[tokio::test]
    async fn test_inbox_empty_buffer() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inbox = Inbox::new(rx);
        tx.send(Bytes::from_static(b"data")).unwrap();

        assert_eq!(inbox.read(&mut [0u8; 0]).await, 0);
        let mut buf = [0u8; 8];
        assert_eq!(inbox.read(&mut buf).await, 4);
    }

    #[tokio::test]
    async fn test_dial_twice() {
        let (client, _radio) = tokio::io::duplex(1024);
        let session = Session::open(client);

        let conn = session.dial(0x0013_A200_41AE_B54E).unwrap();
        assert!(matches!(
            session.dial(0x0013_A200_41AE_B54E),
            Err(XbeeError::AddressInUse(0x0013_A200_41AE_B54E))
        ));

        drop(conn);
        assert!(session.dial(0x0013_A200_41AE_B54E).is_ok());
    }

    #[tokio::test]
    async fn test_stale_conn_close_keeps_new_route() {
        let (client, _radio) = tokio::io::duplex(1024);
        let session = Session::open(client);

        let old = session.dial(7).unwrap();
        old.close();
        let new = session.dial(7).unwrap();
        drop(old);

        assert!(session.shared.routes().get(&7).is_some_and(|r| r.id == new.id));
    }

    #[tokio::test]
    async fn test_read_reports_transport_error() {
        let session = Session::open(BrokenLink {
            read_error: Some(io::ErrorKind::ConnectionReset),
            write_error: None,
        });

        let mut buf = [0u8; 16];
        let first = tokio::time::timeout(Duration::from_secs(1), session.read(&mut buf))
            .await
            .unwrap();
        assert_eq!(io_kind(first), Some(io::ErrorKind::ConnectionReset));
        assert!(session.is_closed());

        // Still an error, not a clean end of stream.
        assert_eq!(
            io_kind(session.read(&mut buf).await),
            Some(io::ErrorKind::ConnectionReset)
        );
        assert_eq!(session.read(&mut [0u8; 0]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_reports_write_error() {
        let session = Session::open(BrokenLink {
            read_error: None,
            write_error: Some(io::ErrorKind::BrokenPipe),
        });

        assert!(session.write(b"lost").await.is_err());

        let mut buf = [0u8; 16];
        let result = tokio::time::timeout(Duration::from_secs(1), session.read(&mut buf))
            .await
            .unwrap();
        assert_eq!(io_kind(result), Some(io::ErrorKind::BrokenPipe));
    }

    #[tokio::test]
    async fn test_clean_close_reads_zero() {
        let (client, _radio) = tokio::io::duplex(1024);
        let session = Session::open(client);
        session.close().await.unwrap();

        let mut buf = [0u8; 16];
        assert_eq!(session.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dial_after_close() {
        let (client, _radio) = tokio::io::duplex(1024);
        let session = Session::open(client);
        session.close().await.unwrap();

        assert!(session.is_closed());
        assert!(matches!(session.dial(1), Err(XbeeError::ConnectionClosed)));
        assert!(matches!(
            session.at_command("ID", None, false).await,
            Err(XbeeError::ConnectionClosed)
        ));
    }
}
