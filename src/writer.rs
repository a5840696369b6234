//! Dedicated writer task owning the transport's write side.
//!
//! Callers never touch the transport directly. Each encoded API frame is sent
//! through an mpsc channel to a single task that writes it, so frames from
//! concurrent callers can never interleave on the wire.
//!
//! # Architecture
//!
//! ```text
//! write()        ─┐
//! at_command()   ─┼─► mpsc::Sender<OutboundFrame> ─► Writer Task ─► Transport
//! Conn::write()  ─┘
//! ```
//!
//! Frames that are ready together are written with a single vectored write.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::codec::Frameable;
use crate::config::DEFAULT_WRITE_CHANNEL_CAPACITY;
use crate::error::{Result, XbeeError};
use crate::protocol::encode_frame;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 32;

/// A complete API frame ready for the wire.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    /// Delimiter, length, payload and checksum.
    pub wire: Bytes,
}

impl OutboundFrame {
    /// Wrap already encoded frame data in the API frame envelope.
    pub fn new(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            wire: encode_frame(payload)?,
        })
    }

    /// Encode a request tagged with `mark`.
    pub fn from_request<F: Frameable + ?Sized>(request: &F, mark: u8) -> Result<Self> {
        Self::new(&request.encode_payload(mark))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.wire.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_WRITE_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for queuing frames on the writer task.
///
/// Cheap to clone.
#[derive(Clone, Debug)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame, waiting while the queue is full.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| XbeeError::ConnectionClosed)
    }
}

/// Spawn the writer task.
///
/// The task runs until every [`WriterHandle`] is dropped or `shutdown`
/// turns `true`, then shuts the transport's write side down. It ends early
/// with an error if a write fails. A shutdown that arrives while a write is
/// stuck on a full transport abandons the write and drops the write side
/// without flushing it.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
    shutdown: watch::Receiver<bool>,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let handle = WriterHandle { tx };

    let task = tokio::spawn(writer_loop(rx, writer, shutdown));

    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);

    loop {
        let first = tokio::select! {
            frame = rx.recv() => match frame {
                Some(f) => f,
                None => break,
            },
            _ = shutdown.wait_for(|closed| *closed) => break,
        };

        batch.clear();
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        tokio::select! {
            result = write_batch(&mut writer, &batch) => result?,
            _ = shutdown.wait_for(|closed| *closed) => {
                tracing::debug!(frames = batch.len(), "abandoning write on shutdown");
                return Ok(());
            }
        }

        tracing::trace!(frames = batch.len(), "wrote batch");
    }

    rx.close();
    // The peer may already be gone.
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write a batch of frames with scatter/gather I/O.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundFrame]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    if batch.is_empty() {
        return Ok(());
    }

    let total_size: usize = batch.iter().map(OutboundFrame::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(XbeeError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for remaining data after partial write.
fn build_remaining_slices(batch: &[OutboundFrame], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for frame in batch {
        let end = offset + frame.size();
        if skip_bytes < end {
            let start_in_frame = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&frame.wire[start_in_frame..]));
        }
        offset = end;
    }

    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AtCommand, AtMnemonic};
    use std::io::Cursor;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt};

    fn frame(payload: &[u8]) -> OutboundFrame {
        OutboundFrame::new(payload).unwrap()
    }

    #[test]
    fn test_outbound_frame_envelope() {
        let f = frame(&[0x08, 0x01, 0x49, 0x44]);
        assert_eq!(&f.wire[..], &[0x7E, 0x00, 0x04, 0x08, 0x01, 0x49, 0x44, 0x69]);
        assert_eq!(f.size(), 8);
    }

    #[test]
    fn test_outbound_frame_from_request() {
        let cmd = AtCommand::query(AtMnemonic::new(b'I', b'D'));
        let f = OutboundFrame::from_request(&cmd, 0x01).unwrap();
        assert_eq!(&f.wire[..], &[0x7E, 0x00, 0x04, 0x08, 0x01, 0x49, 0x44, 0x69]);
    }

    #[test]
    fn test_outbound_frame_too_large() {
        let payload = vec![0u8; 65536];
        assert!(matches!(
            OutboundFrame::new(&payload),
            Err(XbeeError::PayloadTooLarge(65536))
        ));
    }

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (_close_tx, close_rx) = watch::channel(false);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default(), close_rx);

        handle.send(frame(b"\x90hello")).await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(n, 10);
        assert_eq!(buf[0], 0x7E);
    }

    #[tokio::test]
    async fn test_writer_preserves_order() {
        let (client, mut server) = duplex(4096);
        let (_close_tx, close_rx) = watch::channel(false);
        let (handle, _task) = spawn_writer_task(client, WriterConfig::default(), close_rx);

        let frames: Vec<_> = (0..10u8).map(|i| frame(&[0x10, i])).collect();
        for f in &frames {
            handle.send(f.clone()).await.unwrap();
        }

        let expected: Vec<u8> = frames.iter().flat_map(|f| f.wire.to_vec()).collect();
        let mut received = vec![0u8; expected.len()];
        server.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_shutdown_while_transport_full() {
        // The peer never reads, so the frame never fits.
        let (client, _server) = duplex(8);
        let (close_tx, close_rx) = watch::channel(false);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default(), close_rx);

        handle.send(frame(&[0x10; 64])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        close_tx.send_replace(true);
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("writer task stuck after shutdown")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_remaining_slices_no_skip() {
        let batch = vec![frame(b"ab"), frame(b"cd")];
        let slices = build_remaining_slices(&batch, 0);
        assert_eq!(slices.len(), 2);
    }

    #[test]
    fn test_build_remaining_slices_partial_frame() {
        let batch = vec![frame(b"ab"), frame(b"cd")];
        // Each frame is 6 bytes on the wire.
        let slices = build_remaining_slices(&batch, 4);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].len(), 2);
        assert_eq!(slices[1].len(), 6);
    }

    #[test]
    fn test_build_remaining_slices_skip_first() {
        let batch = vec![frame(b"ab"), frame(b"cd")];
        let slices = build_remaining_slices(&batch, 6);
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), 6);
    }

    #[tokio::test]
    async fn test_write_batch_multiple() {
        let mut buf = Cursor::new(Vec::new());
        let batch: Vec<_> = (0..5u8).map(|i| frame(&[0x10, i, 0xAA])).collect();

        write_batch(&mut buf, &batch).await.unwrap();

        assert_eq!(buf.into_inner().len(), 5 * 7);
    }

    #[tokio::test]
    async fn test_writer_shutdown_on_channel_close() {
        let (client, _server) = duplex(4096);
        let (_close_tx, close_rx) = watch::channel(false);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default(), close_rx);

        drop(handle);

        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_writer_shutdown_signal() {
        let (client, mut server) = duplex(4096);
        let (close_tx, close_rx) = watch::channel(false);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default(), close_rx);

        close_tx.send_replace(true);
        assert!(task.await.unwrap().is_ok());
        assert!(matches!(
            handle.send(frame(b"\x10")).await,
            Err(XbeeError::ConnectionClosed)
        ));

        // Write side was shut down: the peer sees end of stream.
        let mut buf = [0u8; 8];
        assert_eq!(server.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_writer_fails_when_peer_gone() {
        let (client, server) = duplex(64);
        let (_close_tx, close_rx) = watch::channel(false);
        let (handle, task) = spawn_writer_task(client, WriterConfig::default(), close_rx);
        drop(server);

        handle.send(frame(b"\x10data")).await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(XbeeError::Io(_))));
    }
}
