//! # Lifecycle Controller
//!
//! Merges every reason to stop into one decision and one teardown.
//!
//! ```text
//!                 budget complete / stop request
//!            ┌──────────────────────────────────▶ Completing ─┐
//!  Running ──┤                                                 ├──▶ teardown ──▶ Stopped
//!            └──────────────────────────────────▶ Aborting ───┘
//!                 session ended / sink failed
//! ```
//!
//! The first transition out of `Running` wins; later signals are ignored.
//! A transition drops the cancel sender, which wakes every drain wait and
//! pacing delay holding a [`LifecycleController::cancelled`] receiver.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::SinkError;
use crate::sink::SharedSink;

/// Pipeline phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Producing frames.
    Running = 0,
    /// Normal end requested; tearing down.
    Completing = 1,
    /// Abnormal end; tearing down.
    Aborting = 2,
    /// Teardown finished.
    Stopped = 3,
}

impl LifecyclePhase {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Completing,
            2 => Self::Aborting,
            _ => Self::Stopped,
        }
    }
}

/// What ended the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopCause {
    /// The frame budget was delivered.
    BudgetComplete,
    /// Someone asked the pipeline to stop.
    StopRequested,
    /// The world session ended.
    SessionEnded(String),
    /// The sink failed.
    SinkFailed(String),
    /// The pipeline itself broke (thread panic, spawn failure).
    Internal(String),
}

impl StopCause {
    const fn phase(&self) -> LifecyclePhase {
        match self {
            Self::BudgetComplete | Self::StopRequested => LifecyclePhase::Completing,
            Self::SessionEnded(_) | Self::SinkFailed(_) | Self::Internal(_) => LifecyclePhase::Aborting,
        }
    }
}

/// Why a run was aborted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// The world session ended. Not a pipeline defect.
    SessionEnded(String),
    /// The sink failed during writing or teardown.
    SinkFailed(String),
    /// The encoder exited unsuccessfully at close.
    SubprocessExitNonzero(Option<i32>),
    /// The pipeline itself broke.
    Internal(String),
}

impl AbortReason {
    /// True for aborts that indicate something went wrong in the pipeline
    /// or its sink, as opposed to the world session simply ending.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        !matches!(self, Self::SessionEnded(_))
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionEnded(reason) => write!(f, "session ended: {reason}"),
            Self::SinkFailed(reason) => write!(f, "sink failed: {reason}"),
            Self::SubprocessExitNonzero(Some(code)) => write!(f, "encoder exited with status {code}"),
            Self::SubprocessExitNonzero(None) => f.write_str("encoder killed by a signal"),
            Self::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

/// The single terminal result of a pipeline run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// The run ended normally.
    Completed {
        /// Frames fully accepted by the sink.
        frames_delivered: u64,
    },
    /// The run was cut short.
    Aborted {
        /// What went wrong.
        reason: AbortReason,
        /// Frames fully accepted by the sink before the abort.
        frames_delivered: u64,
    },
}

impl PipelineOutcome {
    /// Frames delivered, whatever the outcome.
    #[must_use]
    pub const fn frames_delivered(&self) -> u64 {
        match self {
            Self::Completed { frames_delivered } | Self::Aborted { frames_delivered, .. } => *frames_delivered,
        }
    }

    /// True if this outcome should be treated as a failure.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        match self {
            Self::Completed { .. } => false,
            Self::Aborted { reason, .. } => reason.is_defect(),
        }
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { frames_delivered } => write!(f, "completed, {frames_delivered} frames"),
            Self::Aborted {
                reason,
                frames_delivered,
            } => write!(f, "aborted after {frames_delivered} frames ({reason})"),
        }
    }
}

struct Shared {
    phase: AtomicU8,
    cause: Mutex<Option<StopCause>>,
    cancel_tx: Mutex<Option<Sender<()>>>,
    cancel_rx: Receiver<()>,
}

/// Shutdown decision shared by the scheduler, camera sync and caller.
#[derive(Clone)]
pub struct LifecycleController {
    shared: Arc<Shared>,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("phase", &self.phase())
            .field("cause", &self.cause())
            .finish()
    }
}

impl LifecycleController {
    /// Creates a controller in `Running`.
    #[must_use]
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = bounded(0);
        Self {
            shared: Arc::new(Shared {
                phase: AtomicU8::new(LifecyclePhase::Running as u8),
                cause: Mutex::new(None),
                cancel_tx: Mutex::new(Some(cancel_tx)),
                cancel_rx,
            }),
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.shared.phase.load(Ordering::Acquire))
    }

    /// True while no stop has been decided.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase() == LifecyclePhase::Running
    }

    /// The winning stop cause, once decided.
    #[must_use]
    pub fn cause(&self) -> Option<StopCause> {
        self.shared.cause.lock().clone()
    }

    /// Receiver that disconnects the moment a stop is decided.
    ///
    /// Never yields a value; use it in `select!` next to a timer or drain.
    #[must_use]
    pub fn cancelled(&self) -> Receiver<()> {
        self.shared.cancel_rx.clone()
    }

    /// Requests a normal stop. Returns false if a stop was already decided.
    pub fn request_stop(&self) -> bool {
        self.transition(StopCause::StopRequested)
    }

    /// Signals that the frame budget has been delivered.
    pub fn budget_complete(&self) -> bool {
        self.transition(StopCause::BudgetComplete)
    }

    /// Signals that the world session ended.
    pub fn session_ended(&self, reason: impl Into<String>) -> bool {
        self.transition(StopCause::SessionEnded(reason.into()))
    }

    /// Signals a fatal sink failure.
    pub fn sink_failed(&self, reason: impl Into<String>) -> bool {
        self.transition(StopCause::SinkFailed(reason.into()))
    }

    /// Signals an internal failure.
    pub fn internal_error(&self, reason: impl Into<String>) -> bool {
        self.transition(StopCause::Internal(reason.into()))
    }

    /// Blocks until a stop has been decided.
    pub fn wait_for_stop(&self) {
        // Nothing is ever sent; this returns when the sender is dropped.
        let _ = self.shared.cancel_rx.recv();
    }

    fn transition(&self, cause: StopCause) -> bool {
        let mut slot = self.shared.cause.lock();
        if slot.is_some() {
            return false;
        }
        let phase = cause.phase();
        match &cause {
            StopCause::BudgetComplete => info!("Frame budget delivered, completing"),
            StopCause::StopRequested => info!("Stop requested, completing"),
            StopCause::SessionEnded(reason) => info!("Session ended ({}), aborting", reason),
            StopCause::SinkFailed(reason) => warn!("Sink failed ({}), aborting", reason),
            StopCause::Internal(reason) => warn!("Internal error ({}), aborting", reason),
        }
        *slot = Some(cause);
        self.shared.phase.store(phase as u8, Ordering::Release);
        self.shared.cancel_tx.lock().take();
        true
    }

    /// Runs the one teardown routine shared by every stop path.
    ///
    /// Closes the sink (encoder sinks get end-of-input and a bounded wait,
    /// then a kill), joins the scheduler via `join_scheduler`, which
    /// returns the delivered frame count, and maps the stop cause and close
    /// result onto a single outcome. Safe to call before a stop was
    /// decided; that counts as an internal error.
    pub fn teardown<F>(&self, sink: &SharedSink, timeout: Duration, join_scheduler: F) -> PipelineOutcome
    where
        F: FnOnce() -> u64,
    {
        if self.is_running() {
            self.internal_error("teardown before stop");
        }
        let cause = self
            .cause()
            .unwrap_or_else(|| StopCause::Internal("no stop cause recorded".into()));

        let close = sink.lock().close(timeout);
        let frames_delivered = join_scheduler();
        self.shared
            .phase
            .store(LifecyclePhase::Stopped as u8, Ordering::Release);

        let outcome = outcome_for(cause, close, frames_delivered);
        info!("Pipeline stopped: {}", outcome);
        outcome
    }
}

fn outcome_for(cause: StopCause, close: Result<(), SinkError>, frames_delivered: u64) -> PipelineOutcome {
    let aborted = |reason| PipelineOutcome::Aborted {
        reason,
        frames_delivered,
    };
    match cause {
        StopCause::BudgetComplete | StopCause::StopRequested => match close {
            Ok(()) => PipelineOutcome::Completed { frames_delivered },
            Err(SinkError::SubprocessExit { code }) => aborted(AbortReason::SubprocessExitNonzero(code)),
            Err(e) => aborted(AbortReason::SinkFailed(e.to_string())),
        },
        StopCause::SessionEnded(reason) => {
            if let Err(e) = close {
                warn!("Sink close after session end: {}", e);
            }
            aborted(AbortReason::SessionEnded(reason))
        }
        // A dying encoder shows up first as a broken pipe; its exit status
        // is the better reason.
        StopCause::SinkFailed(reason) => match close {
            Err(SinkError::SubprocessExit { code }) => aborted(AbortReason::SubprocessExitNonzero(code)),
            _ => aborted(AbortReason::SinkFailed(reason)),
        },
        StopCause::Internal(reason) => aborted(AbortReason::Internal(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_transition_wins() {
        let lifecycle = LifecycleController::new();
        assert!(lifecycle.is_running());
        assert!(lifecycle.session_ended("kicked"));
        assert!(!lifecycle.budget_complete());
        assert!(!lifecycle.sink_failed("broken pipe"));
        assert_eq!(lifecycle.phase(), LifecyclePhase::Aborting);
        assert_eq!(lifecycle.cause(), Some(StopCause::SessionEnded("kicked".into())));
    }

    #[test]
    fn test_transition_disconnects_cancel() {
        let lifecycle = LifecycleController::new();
        let cancelled = lifecycle.cancelled();
        assert_eq!(cancelled.try_recv(), Err(crossbeam_channel::TryRecvError::Empty));

        lifecycle.request_stop();
        assert_eq!(
            cancelled.recv_timeout(Duration::from_millis(100)),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        );
        lifecycle.wait_for_stop();
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            outcome_for(StopCause::BudgetComplete, Ok(()), 5),
            PipelineOutcome::Completed { frames_delivered: 5 }
        );
        assert_eq!(
            outcome_for(StopCause::BudgetComplete, Err(SinkError::SubprocessExit { code: Some(1) }), 5),
            PipelineOutcome::Aborted {
                reason: AbortReason::SubprocessExitNonzero(Some(1)),
                frames_delivered: 5
            }
        );
        let session = outcome_for(
            StopCause::SessionEnded("quit".into()),
            Err(SinkError::SubprocessExit { code: Some(1) }),
            3,
        );
        assert!(!session.is_defect());
        assert_eq!(session.frames_delivered(), 3);
        assert!(outcome_for(StopCause::SinkFailed("eof".into()), Ok(()), 0).is_defect());
    }

    #[test]
    fn test_broken_pipe_reports_encoder_exit() {
        assert_eq!(
            outcome_for(
                StopCause::SinkFailed("write failed: Broken pipe".into()),
                Err(SinkError::SubprocessExit { code: Some(3) }),
                1,
            ),
            PipelineOutcome::Aborted {
                reason: AbortReason::SubprocessExitNonzero(Some(3)),
                frames_delivered: 1
            }
        );
        assert_eq!(
            outcome_for(
                StopCause::SinkFailed("write failed: Broken pipe".into()),
                Err(SinkError::ShutdownTimeout { after_ms: 100 }),
                1,
            ),
            PipelineOutcome::Aborted {
                reason: AbortReason::SinkFailed("write failed: Broken pipe".into()),
                frames_delivered: 1
            }
        );
    }
}
