//! Raw frame socket.
//!
//! Connects over TCP and writes each length-prefixed JPEG as produced by
//! [`FrameSerializer`](crate::FrameSerializer). The connect happens on the
//! drain thread, so the sink starts out `Connecting` and a connect failure
//! surfaces through the first write.

use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{info, warn};
use worldcast_core::SinkKind;

use super::writer::SinkWriter;
use super::{DrainResult, Sink, SinkState, WriteOutcome};
use crate::encode::WireFormat;
use crate::error::{SinkError, SinkResult};

/// TCP socket carrying `u32_le length + payload` frames.
pub struct FramedSocketSink {
    address: String,
    writer: SinkWriter,
    /// Second handle to the stream, used to unblock a stuck write.
    control: Arc<Mutex<Option<TcpStream>>>,
    closed: Option<SinkResult<()>>,
}

impl FramedSocketSink {
    /// Starts connecting to `address` (`host:port`).
    ///
    /// `write_timeout` of `None` lets a write block until the peer reads.
    ///
    /// # Errors
    ///
    /// Returns an error only if the drain thread cannot be spawned.
    pub fn connect(address: &str, connect_timeout: Duration, write_timeout: Option<Duration>) -> SinkResult<Self> {
        let control = Arc::new(Mutex::new(None));
        let thread_control = Arc::clone(&control);
        let target = address.to_string();

        let writer = SinkWriter::spawn("worldcast-socket", move || {
            let stream = open_stream(&target, connect_timeout, write_timeout)?;
            *thread_control.lock() = stream.try_clone().ok();
            info!("Frame socket connected to {}", target);
            Ok(stream)
        })?;

        Ok(Self {
            address: address.to_string(),
            writer,
            control,
            closed: None,
        })
    }

    /// Destination address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[allow(clippy::cast_possible_truncation)]
    fn shutdown(&mut self, timeout: Duration) -> SinkResult<()> {
        self.writer.finish();
        if self.writer.join(timeout) {
            return Ok(());
        }
        warn!("Frame socket {} did not drain in time, shutting it down", self.address);
        if let Some(stream) = self.control.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.writer.join(Duration::from_secs(1));
        Err(SinkError::ShutdownTimeout {
            after_ms: timeout.as_millis() as u64,
        })
    }
}

fn open_stream(address: &str, connect_timeout: Duration, write_timeout: Option<Duration>) -> SinkResult<TcpStream> {
    let connect_err = |reason: String| SinkError::Connect {
        address: address.to_string(),
        reason,
    };

    let addrs = address
        .to_socket_addrs()
        .map_err(|e| connect_err(e.to_string()))?;
    let mut last_error = "address resolved to nothing".to_string();
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, connect_timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                stream.set_write_timeout(write_timeout)?;
                return Ok(stream);
            }
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(connect_err(last_error))
}

impl Sink for FramedSocketSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Socket
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::LengthPrefixed
    }

    fn state(&self) -> SinkState {
        if self.closed.is_some() {
            SinkState::Closed
        } else {
            self.writer.state()
        }
    }

    fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        self.writer.write(bytes)
    }

    fn drained(&self) -> Receiver<DrainResult> {
        self.writer.drained()
    }

    fn close(&mut self, timeout: Duration) -> SinkResult<()> {
        if let Some(result) = &self.closed {
            return result.clone();
        }
        let result = self.shutdown(timeout);
        self.control.lock().take();
        info!("Frame socket {} closed", self.address);
        self.closed = Some(result.clone());
        result
    }
}
