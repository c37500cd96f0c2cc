//! # Drain Thread
//!
//! Every real sink owns one blocking transport (encoder stdin or a TCP
//! stream). Writes are handed to a dedicated thread so the scheduler can
//! keep watching for stop signals while bytes drain:
//!
//! ```text
//!  scheduler                     drain thread
//!  ─────────                     ────────────
//!  write(bytes) ── bounded(1) ──▶ write_all + flush
//!     Accepted                        │
//!  select { drained, cancel } ◀───────┘ Ok(()) / Err(reason)
//! ```
//!
//! The payload channel holds one frame and the state flips to `Blocked` on
//! every accepted write, so a second frame can never be queued behind the
//! first.

use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{DrainResult, SinkState, WriteOutcome};
use crate::error::SinkResult;

struct Shared {
    state: SinkState,
    /// A write arrived while connecting; report readiness on `drained`.
    connect_waiter: bool,
    last_error: Option<String>,
}

/// Blocking writer running on its own thread.
pub(crate) struct SinkWriter {
    payload_tx: Option<Sender<Vec<u8>>>,
    drained_rx: Receiver<DrainResult>,
    done_rx: Receiver<()>,
    shared: Arc<Mutex<Shared>>,
    thread: Option<JoinHandle<u64>>,
}

impl SinkWriter {
    /// Starts the drain thread. `open` runs on that thread; the writer is
    /// `Connecting` until it returns.
    pub(crate) fn spawn<W, F>(name: &str, open: F) -> SinkResult<Self>
    where
        W: Write + Send + 'static,
        F: FnOnce() -> SinkResult<W> + Send + 'static,
    {
        let (payload_tx, payload_rx) = bounded::<Vec<u8>>(1);
        let (drained_tx, drained_rx) = unbounded::<DrainResult>();
        let (done_tx, done_rx) = bounded::<()>(0);
        let shared = Arc::new(Mutex::new(Shared {
            state: SinkState::Connecting,
            connect_waiter: false,
            last_error: None,
        }));

        let thread_shared = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _done = done_tx;
                drain_loop(open, &payload_rx, &drained_tx, &thread_shared)
            })?;

        Ok(Self {
            payload_tx: Some(payload_tx),
            drained_rx,
            done_rx,
            shared,
            thread: Some(thread),
        })
    }

    pub(crate) fn state(&self) -> SinkState {
        self.shared.lock().state
    }

    pub(crate) fn write(&self, bytes: &[u8]) -> WriteOutcome {
        let mut shared = self.shared.lock();
        match shared.state {
            SinkState::Connecting => {
                shared.connect_waiter = true;
                WriteOutcome::Blocked
            }
            SinkState::Blocked => WriteOutcome::Blocked,
            SinkState::Closed => WriteOutcome::Failed("sink is closed".into()),
            SinkState::Errored => WriteOutcome::Failed(
                shared
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "sink failed".into()),
            ),
            SinkState::Ready => {
                let Some(tx) = &self.payload_tx else {
                    return WriteOutcome::Failed("sink is closed".into());
                };
                shared.state = SinkState::Blocked;
                match tx.try_send(bytes.to_vec()) {
                    Ok(()) => WriteOutcome::Accepted,
                    Err(TrySendError::Full(_)) => WriteOutcome::Blocked,
                    Err(TrySendError::Disconnected(_)) => {
                        let reason = shared
                            .last_error
                            .clone()
                            .unwrap_or_else(|| "sink writer exited".into());
                        shared.state = SinkState::Errored;
                        WriteOutcome::Failed(reason)
                    }
                }
            }
        }
    }

    pub(crate) fn drained(&self) -> Receiver<DrainResult> {
        self.drained_rx.clone()
    }

    /// Stops accepting writes. The thread finishes the frame in flight,
    /// then drops the transport.
    pub(crate) fn finish(&mut self) {
        self.payload_tx.take();
        let mut shared = self.shared.lock();
        if shared.state != SinkState::Errored {
            shared.state = SinkState::Closed;
        }
    }

    /// Waits for the thread to exit. Returns false on timeout.
    pub(crate) fn join(&mut self, timeout: Duration) -> bool {
        match self.done_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    match thread.join() {
                        Ok(written) => debug!("Sink writer exited after {} frames", written),
                        Err(_) => warn!("Sink writer panicked"),
                    }
                }
                true
            }
        }
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        self.payload_tx.take();
    }
}

fn drain_loop<W, F>(
    open: F,
    payloads: &Receiver<Vec<u8>>,
    drained: &Sender<DrainResult>,
    shared: &Mutex<Shared>,
) -> u64
where
    W: Write,
    F: FnOnce() -> SinkResult<W>,
{
    let mut transport = match open() {
        Ok(transport) => {
            let mut guard = shared.lock();
            if guard.state == SinkState::Connecting {
                guard.state = SinkState::Ready;
            }
            if std::mem::take(&mut guard.connect_waiter) {
                let _ = drained.send(Ok(()));
            }
            transport
        }
        Err(e) => {
            let reason = e.to_string();
            let mut guard = shared.lock();
            guard.state = SinkState::Errored;
            guard.last_error = Some(reason.clone());
            if std::mem::take(&mut guard.connect_waiter) {
                let _ = drained.send(Err(reason));
            }
            return 0;
        }
    };

    let mut written = 0u64;
    for payload in payloads {
        match transport.write_all(&payload).and_then(|()| transport.flush()) {
            Ok(()) => {
                written += 1;
                let mut guard = shared.lock();
                if guard.state == SinkState::Blocked {
                    guard.state = SinkState::Ready;
                }
                let _ = drained.send(Ok(()));
            }
            Err(e) => {
                let reason = format!("write failed: {e}");
                let mut guard = shared.lock();
                guard.state = SinkState::Errored;
                guard.last_error = Some(reason.clone());
                let _ = drained.send(Err(reason));
                break;
            }
        }
    }
    written
}
