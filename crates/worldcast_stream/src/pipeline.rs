//! # Pipeline
//!
//! Wires one recording together and returns its single outcome.
//!
//! ```text
//!  session events ──▶ CameraSync thread ──▶ PoseMirror ◀── FrameScheduler thread ──▶ Sink
//!                          │ on_end                              │ budget / sink failure
//!                          ▼                                     ▼
//!                  ┌──────────────────── LifecycleController ──────────────────┐
//!                  │ caller thread: wait_for_stop ─▶ teardown ─▶ outcome       │
//!                  └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Teardown runs on the caller's thread, so closing the sink never waits
//! for a render that is still in progress on the scheduler thread.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{info, warn};
use worldcast_core::{CameraPose, Clock, PipelineConfig, PoseMirror, Renderer, SystemClock};
use worldcast_session::{CameraSync, CameraSyncHandle, SessionEvent, SyncStats};

use crate::lifecycle::{LifecycleController, PipelineOutcome};
use crate::pacing::PacingStats;
use crate::scheduler::{FrameScheduler, PipelineStats};
use crate::sink::{SharedSink, Sink};

/// Everything known about a finished run.
#[derive(Clone, Debug)]
pub struct PipelineReport {
    /// The terminal outcome.
    pub outcome: PipelineOutcome,
    /// Scheduler counters.
    pub stats: PipelineStats,
    /// Pacing statistics.
    pub pacing: PacingStats,
    /// Frame rate the measured work allows.
    pub effective_fps: f64,
    /// Camera sync counters.
    pub sync: SyncStats,
}

/// One configured recording, ready to run once.
pub struct Pipeline<R: Renderer> {
    config: PipelineConfig,
    renderer: R,
    sink: Box<dyn Sink>,
    clock: Arc<dyn Clock>,
    lifecycle: LifecycleController,
    mirror: PoseMirror,
}

impl<R: Renderer + 'static> Pipeline<R> {
    /// Creates a pipeline. The config is frozen from here on.
    #[must_use]
    pub fn new(config: PipelineConfig, renderer: R, sink: Box<dyn Sink>) -> Self {
        let mirror = PoseMirror::new(CameraPose::default(), config.view_distance);
        Self {
            config,
            renderer,
            sink,
            clock: Arc::new(SystemClock::new()),
            lifecycle: LifecycleController::new(),
            mirror,
        }
    }

    /// Replaces the wall clock, e.g. with a `ManualClock` in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Handle for requesting a stop from another thread.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleController {
        self.lifecycle.clone()
    }

    /// The camera mirror the scheduler reads from.
    #[must_use]
    pub fn mirror(&self) -> PoseMirror {
        self.mirror.clone()
    }

    /// The frozen configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs to completion and returns the outcome.
    ///
    /// Blocks the calling thread until a stop is decided and teardown has
    /// finished. The session channel closing counts as the session ending.
    pub fn run(self, session: Receiver<SessionEvent>) -> PipelineReport {
        let Self {
            config,
            renderer,
            sink,
            clock,
            lifecycle,
            mirror,
        } = self;

        info!(
            "Starting {} pipeline to {} at {} fps, {}x{}, budget {}",
            config.sink.kind(),
            config.sink.destination(),
            config.fps,
            config.width,
            config.height,
            config.budget
        );

        let sink: SharedSink = Arc::new(Mutex::new(sink));

        let on_end = lifecycle.clone();
        let sync = match CameraSync::new(mirror.clone(), config.view_distance).spawn(session, move |reason| {
            on_end.session_ended(reason);
        }) {
            Ok(handle) => Some(handle),
            Err(e) => {
                lifecycle.internal_error(format!("camera sync thread: {e}"));
                None
            }
        };

        let scheduler = FrameScheduler::new(&config, renderer, mirror, Arc::clone(&sink), lifecycle.clone(), clock);
        let state = scheduler.state();
        let scheduler_thread = match thread::Builder::new()
            .name("worldcast-scheduler".into())
            .spawn(move || scheduler.run())
        {
            Ok(handle) => Some(handle),
            Err(e) => {
                lifecycle.internal_error(format!("scheduler thread: {e}"));
                None
            }
        };

        lifecycle.wait_for_stop();

        let mut pacing = PacingStats::default();
        let mut effective_fps = 0.0;
        let outcome = lifecycle.teardown(&sink, config.shutdown_timeout(), || {
            if let Some(handle) = scheduler_thread {
                match handle.join() {
                    Ok(report) => {
                        pacing = report.pacing;
                        effective_fps = report.effective_fps;
                    }
                    Err(_) => warn!("Frame scheduler panicked"),
                }
            }
            state.frames_delivered()
        });

        let sync = sync.map(CameraSyncHandle::stop).unwrap_or_default();
        PipelineReport {
            outcome,
            stats: state.snapshot(),
            pacing,
            effective_fps,
            sync,
        }
    }
}
