//! Correlation tracker - hands out marks and pairs responses with waiters.
//!
//! Every request that expects an answer carries a one-byte mark. The radio
//! echoes the mark in its response, and the read loop calls
//! [`MarkPool::release`] to hand the raw response to whoever is waiting.
//!
//! ```text
//! caller ── acquire() ──► PendingCall { mark } ── wait() ──► response bytes
//!                               ▲
//! read loop ── release(mark, bytes) ─┘
//! ```
//!
//! A mark is owned by exactly one [`PendingCall`] while reserved. Dropping
//! the call (after a timeout, a send failure, or a completed wait) returns
//! the mark to the pool. Each reservation carries a generation number so a
//! late drop never frees a mark that has since been handed to someone else.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::error::{Result, XbeeError};

/// A correlation tag in `1..=255`. Zero means "no response expected".
pub type Mark = u8;

/// Lowest mark handed out.
pub const MIN_MARK: Mark = 1;

/// Highest mark handed out.
pub const MAX_MARK: Mark = 255;

struct Slot {
    generation: u64,
    tx: oneshot::Sender<Bytes>,
}

struct State {
    /// Indexed by mark; index 0 is never used.
    slots: Vec<Option<Slot>>,
    next_generation: u64,
    closed: bool,
}

/// Pool of marks shared between callers and the read loop.
///
/// Cheap to clone; all clones share one table.
#[derive(Clone)]
pub struct MarkPool {
    state: Arc<Mutex<State>>,
}

impl MarkPool {
    /// Create a pool with every mark free.
    pub fn new() -> Self {
        let slots = (0..=MAX_MARK as usize).map(|_| None).collect();
        Self {
            state: Arc::new(Mutex::new(State {
                slots,
                next_generation: 0,
                closed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve the lowest free mark.
    ///
    /// Fails with [`XbeeError::NoMarksAvailable`] when all 255 are
    /// outstanding, and with [`XbeeError::ConnectionClosed`] once the pool
    /// has been closed.
    pub fn acquire(&self) -> Result<PendingCall> {
        let mut state = self.lock();
        if state.closed {
            return Err(XbeeError::ConnectionClosed);
        }

        let mark = (MIN_MARK..=MAX_MARK)
            .find(|&m| state.slots[m as usize].is_none())
            .ok_or(XbeeError::NoMarksAvailable)?;

        let generation = state.next_generation;
        state.next_generation += 1;

        let (tx, rx) = oneshot::channel();
        state.slots[mark as usize] = Some(Slot { generation, tx });

        Ok(PendingCall {
            mark,
            generation,
            rx: Some(rx),
            pool: self.clone(),
        })
    }

    /// Deliver `response` to the waiter holding `mark` and free the mark.
    ///
    /// Returns [`XbeeError::UnknownMark`] if the mark is not reserved.
    pub fn release(&self, mark: Mark, response: Bytes) -> Result<()> {
        let slot = self
            .lock()
            .slots
            .get_mut(mark as usize)
            .and_then(Option::take)
            .ok_or(XbeeError::UnknownMark(mark))?;

        // The waiter may be mid-drop; the mark is free either way.
        let _ = slot.tx.send(response);
        Ok(())
    }

    /// Fail every outstanding waiter and refuse further reservations.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.slots.iter_mut().for_each(|slot| *slot = None);
    }

    /// Number of marks currently reserved.
    pub fn outstanding(&self) -> usize {
        self.lock().slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn forget(&self, mark: Mark, generation: u64) {
        let mut state = self.lock();
        let slot = &mut state.slots[mark as usize];
        if slot.as_ref().is_some_and(|s| s.generation == generation) {
            *slot = None;
        }
    }
}

impl Default for MarkPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MarkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MarkPool")
            .field("outstanding", &state.slots.iter().filter(|s| s.is_some()).count())
            .field("closed", &state.closed)
            .finish()
    }
}

/// A reserved mark and the one-shot slot its response lands in.
#[derive(Debug)]
pub struct PendingCall {
    mark: Mark,
    generation: u64,
    rx: Option<oneshot::Receiver<Bytes>>,
    pool: MarkPool,
}

impl PendingCall {
    #[inline]
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Wait for the response with no deadline of its own.
    ///
    /// Callers bound it from outside; dropping the future frees the mark.
    pub async fn response(mut self) -> Result<Bytes> {
        let rx = self.rx.take().ok_or(XbeeError::ConnectionClosed)?;
        rx.await.map_err(|_| XbeeError::ConnectionClosed)
    }

    /// Wait for the response, giving up after `timeout`.
    ///
    /// The mark is back in the pool when this returns, whatever the outcome.
    pub async fn wait(self, timeout: Duration) -> Result<Bytes> {
        tokio::time::timeout(timeout, self.response())
            .await
            .map_err(|_| XbeeError::Timeout(timeout))?
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.pool.forget(self.mark, self.generation);
    }
}
