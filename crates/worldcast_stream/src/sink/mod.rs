//! # Sinks
//!
//! Every output implements [`Sink`]:
//!
//! | Sink                     | Transport        | Wire format        |
//! |--------------------------|------------------|--------------------|
//! | [`ContainerEncoderSink`] | encoder stdin    | JPEG sequence      |
//! | [`LiveEncoderSink`]      | encoder stdin    | JPEG sequence      |
//! | [`FramedSocketSink`]     | TCP              | `u32_le` + JPEG    |
//!
//! ## Backpressure
//!
//! `write` hands at most one frame to the transport. Until that frame has
//! drained the sink is `Blocked` and refuses more; the caller waits on
//! [`Sink::drained`] and retries the same bytes.

mod container;
mod encoder;
mod live;
mod socket;
mod writer;

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use worldcast_core::{PipelineConfig, SinkConfig, SinkKind};

pub use container::ContainerEncoderSink;
pub use encoder::EncoderProcess;
pub use live::LiveEncoderSink;
pub use socket::FramedSocketSink;

use crate::encode::WireFormat;
use crate::error::SinkResult;

/// Transport state of a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SinkState {
    /// Transport not yet established.
    Connecting = 0,
    /// Ready for the next frame.
    Ready = 1,
    /// A frame is still draining.
    Blocked = 2,
    /// Closed by the pipeline.
    Closed = 3,
    /// Transport failed; nothing more will be accepted.
    Errored = 4,
}

/// Result of offering a frame to a sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The frame was handed to the transport. Await `drained`.
    Accepted,
    /// The sink cannot take a frame yet. Await `drained`, then retry.
    Blocked,
    /// The sink is unusable.
    Failed(String),
}

/// Reported on [`Sink::drained`] once per accepted frame, and once when a
/// blocked sink becomes writable. `Err` carries a fatal transport error.
pub type DrainResult = Result<(), String>;

/// Sink shared by the scheduler (writes) and the lifecycle (close).
///
/// Locked only for the duration of a single call, never across a wait.
pub type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

/// Output for serialized frames.
pub trait Sink: Send {
    /// Which sink variant this is.
    fn kind(&self) -> SinkKind;

    /// Byte layout the transport expects.
    fn wire_format(&self) -> WireFormat;

    /// Current transport state.
    fn state(&self) -> SinkState;

    /// Offers one serialized frame.
    fn write(&mut self, bytes: &[u8]) -> WriteOutcome;

    /// Channel signalling drain completion and readiness changes.
    fn drained(&self) -> Receiver<DrainResult>;

    /// Flushes and releases the transport, waiting at most `timeout`.
    ///
    /// Idempotent: later calls return the first call's result.
    ///
    /// # Errors
    ///
    /// Returns the transport's shutdown error, such as a non-zero encoder
    /// exit or an expired deadline.
    fn close(&mut self, timeout: Duration) -> SinkResult<()>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn kind(&self) -> SinkKind {
        (**self).kind()
    }

    fn wire_format(&self) -> WireFormat {
        (**self).wire_format()
    }

    fn state(&self) -> SinkState {
        (**self).state()
    }

    fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        (**self).write(bytes)
    }

    fn drained(&self) -> Receiver<DrainResult> {
        (**self).drained()
    }

    fn close(&mut self, timeout: Duration) -> SinkResult<()> {
        (**self).close(timeout)
    }
}

/// Opens the sink a config describes.
///
/// # Errors
///
/// Returns a [`SinkError`](crate::SinkError) if the encoder cannot be
/// spawned or the drain thread cannot start.
pub fn open_sink(config: &PipelineConfig) -> SinkResult<Box<dyn Sink>> {
    let sink: Box<dyn Sink> = match &config.sink {
        SinkConfig::Container { path } => Box::new(ContainerEncoderSink::open(path, config.fps, &config.encoder)?),
        SinkConfig::Live { url } => Box::new(LiveEncoderSink::open(
            url,
            config.fps,
            config.width,
            config.height,
            &config.encoder,
        )?),
        SinkConfig::Socket {
            address,
            connect_timeout_ms,
            write_timeout_ms,
        } => {
            let write_timeout = (*write_timeout_ms > 0).then(|| Duration::from_millis(*write_timeout_ms));
            Box::new(FramedSocketSink::connect(
                address,
                Duration::from_millis(*connect_timeout_ms),
                write_timeout,
            )?)
        }
    };
    Ok(sink)
}
