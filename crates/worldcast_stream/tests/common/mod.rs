//! Shared fakes for pipeline integration tests.

#![allow(dead_code, missing_docs)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use worldcast_core::{
    CameraPose, ChunkWindow, PipelineConfig, RenderError, Renderer, RgbImage, SinkConfig, SinkKind,
};
use worldcast_stream::{DrainResult, Sink, SinkResult, SinkState, WireFormat, WriteOutcome};

/// Small frames keep JPEG encoding cheap.
pub const WIDTH: u32 = 16;
/// Frame height used by the fakes.
pub const HEIGHT: u32 = 16;

/// Config for a socket-shaped fake sink.
pub fn test_config(fps: u32, frames: i64) -> PipelineConfig {
    let mut config = PipelineConfig::new(SinkConfig::Socket {
        address: "fake:0".into(),
        connect_timeout_ms: 100,
        write_timeout_ms: 0,
    });
    config.fps = fps;
    config.width = WIDTH;
    config.height = HEIGHT;
    config.budget = frames.into();
    config.shutdown_timeout_ms = 1_000;
    config
}

// =============================================================================
// Renderer
// =============================================================================

/// Counts renders; fails on selected calls.
#[derive(Clone, Default)]
pub struct RenderCounters {
    pub renders: Arc<AtomicU64>,
    pub poses: Arc<Mutex<Vec<CameraPose>>>,
}

pub struct FakeRenderer {
    counters: RenderCounters,
    /// 1-based render calls that fail.
    fail_on: Vec<u64>,
    calls: u64,
}

impl FakeRenderer {
    pub fn new() -> (Self, RenderCounters) {
        Self::failing_on(Vec::new())
    }

    pub fn failing_on(fail_on: Vec<u64>) -> (Self, RenderCounters) {
        let counters = RenderCounters::default();
        (
            Self {
                counters: counters.clone(),
                fail_on,
                calls: 0,
            },
            counters,
        )
    }
}

impl Renderer for FakeRenderer {
    fn set_pose(&mut self, pose: &CameraPose, _window: &ChunkWindow) {
        self.counters.poses.lock().push(*pose);
    }

    fn render_frame(&mut self) -> Result<RgbImage, RenderError> {
        self.calls += 1;
        if self.fail_on.contains(&self.calls) {
            return Err(RenderError::Failed(format!("injected failure on call {}", self.calls)));
        }
        self.counters.renders.fetch_add(1, Ordering::SeqCst);
        #[allow(clippy::cast_possible_truncation)]
        let shade = (self.calls % 255) as u8;
        Ok(RgbImage::from_pixel(WIDTH, HEIGHT, image::Rgb([shade, 0, 0])))
    }
}

// =============================================================================
// Sink
// =============================================================================

/// What the fake sink observed.
#[derive(Default)]
pub struct SinkCounters {
    pub writes: AtomicU64,
    pub accepted: AtomicU64,
    pub blocked: AtomicU64,
    pub closes: AtomicU64,
    /// Writes attempted while a previous frame was still in flight.
    pub violations: AtomicU64,
    pub in_flight: AtomicBool,
    pub payloads: Mutex<Vec<Vec<u8>>>,
}

/// Scriptable in-memory sink.
pub struct FakeSink {
    counters: Arc<SinkCounters>,
    drained_tx: Sender<DrainResult>,
    drained_rx: Receiver<DrainResult>,
    /// Refuse this many writes with `Blocked` before accepting any.
    block_first: u64,
    /// 1-based accepted write whose drain fails.
    fail_on: Option<u64>,
    drain_delay: Duration,
    state: SinkState,
}

impl FakeSink {
    pub fn new() -> (Self, Arc<SinkCounters>) {
        let counters = Arc::new(SinkCounters::default());
        let (drained_tx, drained_rx) = unbounded();
        (
            Self {
                counters: Arc::clone(&counters),
                drained_tx,
                drained_rx,
                block_first: 0,
                fail_on: None,
                drain_delay: Duration::ZERO,
                state: SinkState::Ready,
            },
            counters,
        )
    }

    pub fn blocking_first(mut self, count: u64) -> Self {
        self.block_first = count;
        self
    }

    pub fn failing_on(mut self, write: u64) -> Self {
        self.fail_on = Some(write);
        self
    }

    pub fn with_drain_delay(mut self, delay: Duration) -> Self {
        self.drain_delay = delay;
        self
    }

    pub fn boxed(self) -> Box<dyn Sink> {
        Box::new(self)
    }
}

impl Sink for FakeSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Socket
    }

    fn wire_format(&self) -> WireFormat {
        WireFormat::LengthPrefixed
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        let counters = &self.counters;
        let attempt = counters.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if counters.in_flight.load(Ordering::SeqCst) {
            counters.violations.fetch_add(1, Ordering::SeqCst);
        }
        if self.state == SinkState::Closed {
            return WriteOutcome::Failed("closed".into());
        }

        if attempt <= self.block_first {
            counters.blocked.fetch_add(1, Ordering::SeqCst);
            let _ = self.drained_tx.send(Ok(()));
            return WriteOutcome::Blocked;
        }

        let accepted = counters.accepted.fetch_add(1, Ordering::SeqCst) + 1;
        let result = if self.fail_on == Some(accepted) {
            Err(format!("injected failure on write {accepted}"))
        } else {
            counters.payloads.lock().push(bytes.to_vec());
            Ok(())
        };

        counters.in_flight.store(true, Ordering::SeqCst);
        let delay = self.drain_delay;
        let tx = self.drained_tx.clone();
        let drain_counters = Arc::clone(counters);
        thread::spawn(move || {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            drain_counters.in_flight.store(false, Ordering::SeqCst);
            let _ = tx.send(result);
        });
        WriteOutcome::Accepted
    }

    fn drained(&self) -> Receiver<DrainResult> {
        self.drained_rx.clone()
    }

    fn close(&mut self, _timeout: Duration) -> SinkResult<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.state = SinkState::Closed;
        Ok(())
    }
}
