//! # Frame Scheduler
//!
//! One loop, one frame at a time:
//!
//! ```text
//! ┌─────────────────────────────── tick ───────────────────────────────┐
//! │ snapshot pose ─▶ render ─▶ serialize ─▶ write ─▶ await drain       │
//! │      (skip tick on render / serialize error, retry on Blocked)     │
//! └────────────────────────────────────────────────────────────────────┘
//!            │ delivered: budget exhausted? ─▶ budget_complete, exit
//!            ▼
//!      pacing delay (cancellable) ─▶ next tick
//! ```
//!
//! The pose is read once per tick as a snapshot. The sink is locked only
//! for the `write` call itself; every wait selects on the lifecycle's
//! cancel channel so a stop is seen immediately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{select, Receiver};
use tracing::{debug, info, warn};
use worldcast_core::{Clock, Frame, FrameBudget, PipelineConfig, PoseMirror, Renderer};

use crate::encode::FrameSerializer;
use crate::lifecycle::LifecycleController;
use crate::pacing::{PacingController, PacingStats, PacingWait};
use crate::sink::{DrainResult, SharedSink, WriteOutcome};

/// Delivered frames between progress log lines.
pub const PROGRESS_INTERVAL: u64 = 60;

/// Counters owned by one scheduler instance.
#[derive(Debug, Default)]
pub struct PipelineState {
    next_sequence: AtomicU64,
    frames_delivered: AtomicU64,
    ticks: AtomicU64,
    render_failures: AtomicU64,
    serialize_failures: AtomicU64,
    blocked_writes: AtomicU64,
}

impl PipelineState {
    /// Frames fully accepted by the sink so far.
    #[must_use]
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered.load(Ordering::Acquire)
    }

    /// Copies the counters.
    #[must_use]
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered(),
            next_sequence: self.next_sequence.load(Ordering::Relaxed),
            render_failures: self.render_failures.load(Ordering::Relaxed),
            serialize_failures: self.serialize_failures.load(Ordering::Relaxed),
            blocked_writes: self.blocked_writes.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`PipelineState`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Ticks started.
    pub ticks: u64,
    /// Frames fully accepted by the sink.
    pub frames_delivered: u64,
    /// Sequence index the next frame will get.
    pub next_sequence: u64,
    /// Ticks skipped because rendering failed.
    pub render_failures: u64,
    /// Ticks skipped because serialization failed.
    pub serialize_failures: u64,
    /// Writes refused with `Blocked`.
    pub blocked_writes: u64,
}

/// What the scheduler thread hands back when it exits.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulerReport {
    /// Final counters.
    pub stats: PipelineStats,
    /// Pacing statistics.
    pub pacing: PacingStats,
    /// Frame rate the measured work allows.
    pub effective_fps: f64,
}

enum TickResult {
    Delivered,
    Skipped,
    Stopped,
}

enum DrainWait {
    Drained,
    Failed(String),
    Cancelled,
}

/// Marks the run as broken if the scheduler unwinds without deciding a stop.
struct StopOnExit(LifecycleController);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        if self.0.is_running() {
            self.0.internal_error("frame scheduler exited unexpectedly");
        }
    }
}

/// Drives render → serialize → write ticks until the lifecycle stops it.
pub struct FrameScheduler<R: Renderer> {
    renderer: R,
    mirror: PoseMirror,
    serializer: FrameSerializer,
    sink: SharedSink,
    drained: Receiver<DrainResult>,
    pacing: PacingController,
    lifecycle: LifecycleController,
    clock: Arc<dyn Clock>,
    budget: FrameBudget,
    state: Arc<PipelineState>,
}

impl<R: Renderer> FrameScheduler<R> {
    /// Creates a scheduler writing to `sink` in the sink's wire format.
    #[must_use]
    pub fn new(
        config: &PipelineConfig,
        renderer: R,
        mirror: PoseMirror,
        sink: SharedSink,
        lifecycle: LifecycleController,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (wire, drained) = {
            let guard = sink.lock();
            (guard.wire_format(), guard.drained())
        };
        Self {
            renderer,
            mirror,
            serializer: FrameSerializer::for_config(config, wire),
            sink,
            drained,
            pacing: PacingController::new(config.fps),
            lifecycle,
            clock,
            budget: config.budget,
            state: Arc::new(PipelineState::default()),
        }
    }

    /// Shared handle to this scheduler's counters.
    #[must_use]
    pub fn state(&self) -> Arc<PipelineState> {
        Arc::clone(&self.state)
    }

    /// Runs ticks until a stop is decided.
    ///
    /// Exits only after the lifecycle has left `Running`; if the budget is
    /// already exhausted (a budget of 0) it completes without rendering.
    pub fn run(mut self) -> SchedulerReport {
        let _stop_guard = StopOnExit(self.lifecycle.clone());
        let cancel = self.lifecycle.cancelled();
        info!(
            "Frame scheduler started: budget {}, delay {:?}",
            self.budget,
            self.pacing.delay()
        );

        loop {
            if !self.lifecycle.is_running() {
                break;
            }
            if self.budget.is_exhausted(self.state.frames_delivered()) {
                self.lifecycle.budget_complete();
                break;
            }

            let started = self.clock.now();
            self.state.ticks.fetch_add(1, Ordering::Relaxed);
            match self.tick(&cancel) {
                TickResult::Delivered => {
                    if self.budget.is_exhausted(self.state.frames_delivered()) {
                        self.lifecycle.budget_complete();
                        break;
                    }
                }
                TickResult::Skipped => {}
                TickResult::Stopped => break,
            }
            self.pacing.record_work(self.clock.now().saturating_sub(started));

            if self.pacing.wait(self.clock.as_ref(), &cancel) == PacingWait::Cancelled {
                break;
            }
        }

        let report = SchedulerReport {
            stats: self.state.snapshot(),
            pacing: self.pacing.stats(),
            effective_fps: self.pacing.effective_fps(),
        };
        debug!(
            "Frame scheduler exited: {:?}, {:.1} fps effective",
            report.stats, report.effective_fps
        );
        report
    }

    fn tick(&mut self, cancel: &Receiver<()>) -> TickResult {
        let view = self.mirror.snapshot();
        self.renderer.set_pose(&view.pose, &view.window);

        let image = match self.renderer.render_frame() {
            Ok(image) => image,
            Err(e) => {
                self.state.render_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Skipping tick: {}", e);
                return TickResult::Skipped;
            }
        };
        if !self.lifecycle.is_running() {
            debug!("Discarding frame rendered after stop");
            return TickResult::Stopped;
        }

        let sequence = self.state.next_sequence.load(Ordering::Relaxed);
        let frame = Frame::new(sequence, image);
        let bytes = match self.serializer.serialize(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.state.serialize_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Skipping frame {}: {}", sequence, e);
                return TickResult::Skipped;
            }
        };
        drop(frame);
        self.state.next_sequence.store(sequence + 1, Ordering::Relaxed);

        self.deliver(&bytes, sequence, cancel)
    }

    /// Writes one serialized frame, retrying the same bytes while blocked.
    fn deliver(&mut self, bytes: &[u8], sequence: u64, cancel: &Receiver<()>) -> TickResult {
        loop {
            let outcome = self.sink.lock().write(bytes);
            match outcome {
                WriteOutcome::Accepted => {
                    return match self.await_drain(cancel) {
                        DrainWait::Drained => {
                            self.frame_delivered(sequence);
                            TickResult::Delivered
                        }
                        DrainWait::Failed(reason) => {
                            self.lifecycle.sink_failed(reason);
                            TickResult::Stopped
                        }
                        DrainWait::Cancelled => TickResult::Stopped,
                    };
                }
                WriteOutcome::Blocked => {
                    self.state.blocked_writes.fetch_add(1, Ordering::Relaxed);
                    debug!("Sink blocked on frame {}", sequence);
                    match self.await_drain(cancel) {
                        // Readiness can be queued when a stop lands; never write after it.
                        DrainWait::Drained if !self.lifecycle.is_running() => return TickResult::Stopped,
                        DrainWait::Drained => {}
                        DrainWait::Failed(reason) => {
                            self.lifecycle.sink_failed(reason);
                            return TickResult::Stopped;
                        }
                        DrainWait::Cancelled => return TickResult::Stopped,
                    }
                }
                WriteOutcome::Failed(reason) => {
                    self.lifecycle.sink_failed(reason);
                    return TickResult::Stopped;
                }
            }
        }
    }

    fn await_drain(&self, cancel: &Receiver<()>) -> DrainWait {
        select! {
            recv(self.drained) -> result => match result {
                Ok(Ok(())) => DrainWait::Drained,
                Ok(Err(reason)) => DrainWait::Failed(reason),
                Err(_) => DrainWait::Failed("sink drain channel closed".into()),
            },
            recv(cancel) -> _ => match self.drained.try_recv() {
                Ok(Ok(())) => DrainWait::Drained,
                _ => DrainWait::Cancelled,
            },
        }
    }

    fn frame_delivered(&self, sequence: u64) {
        let delivered = self.state.frames_delivered.fetch_add(1, Ordering::AcqRel) + 1;
        if delivered % PROGRESS_INTERVAL == 0 {
            info!("Rendered frame {}/{}", delivered, self.budget);
        } else {
            debug!("Delivered frame {} ({} total)", sequence, delivered);
        }
    }
}
