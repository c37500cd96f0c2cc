//! # Recorder
//!
//! Process-level registry allowing one recording at a time. Starting a
//! second one while the first runs is refused; the slot frees itself as
//! soon as the running pipeline produces its outcome.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::info;
use worldcast_core::Renderer;
use worldcast_session::SessionEvent;

use crate::error::{ControlError, ControlResult};
use crate::lifecycle::LifecycleController;
use crate::pipeline::{Pipeline, PipelineReport};

/// What the recorder is doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecorderStatus {
    /// No recording.
    Idle,
    /// A recording is running.
    Recording {
        /// Output destination.
        destination: String,
        /// Player the camera follows, if any.
        follow: Option<String>,
    },
}

impl fmt::Display for RecorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Recording {
                destination,
                follow: Some(follow),
            } => write!(f, "recording to {destination}, following {follow}"),
            Self::Recording { destination, .. } => write!(f, "recording to {destination}"),
        }
    }
}

struct ActiveRecording {
    id: u64,
    destination: String,
    follow: Option<String>,
    lifecycle: LifecycleController,
}

/// One-recording-at-a-time registry.
#[derive(Default)]
pub struct Recorder {
    active: Arc<Mutex<Option<ActiveRecording>>>,
    next_id: AtomicU64,
}

impl Recorder {
    /// Creates an idle recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `pipeline` on its own thread.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::AlreadyRecording`] if a recording is active,
    /// or [`ControlError::Spawn`] if the thread cannot be started.
    pub fn start<R>(
        &self,
        pipeline: Pipeline<R>,
        session: Receiver<SessionEvent>,
        follow: Option<&str>,
    ) -> ControlResult<RecordingHandle>
    where
        R: Renderer + 'static,
    {
        let mut slot = self.active.lock();
        if let Some(active) = slot.as_ref() {
            return Err(ControlError::AlreadyRecording {
                destination: active.destination.clone(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let destination = pipeline.config().sink.destination();
        let lifecycle = pipeline.lifecycle();
        match follow {
            Some(name) => info!("Recording {} to {}, following {}", id, destination, name),
            None => info!("Recording {} to {}", id, destination),
        }

        let registry = Arc::clone(&self.active);
        let thread = thread::Builder::new()
            .name("worldcast-recording".into())
            .spawn(move || {
                let report = pipeline.run(session);
                let mut slot = registry.lock();
                if slot.as_ref().is_some_and(|active| active.id == id) {
                    *slot = None;
                }
                report
            })?;

        *slot = Some(ActiveRecording {
            id,
            destination,
            follow: follow.map(str::to_string),
            lifecycle: lifecycle.clone(),
        });

        Ok(RecordingHandle {
            lifecycle,
            thread: Some(thread),
        })
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> RecorderStatus {
        self.active
            .lock()
            .as_ref()
            .map_or(RecorderStatus::Idle, |active| RecorderStatus::Recording {
                destination: active.destination.clone(),
                follow: active.follow.clone(),
            })
    }

    /// Requests a normal stop of the active recording.
    ///
    /// Returns false if nothing was running or it was already stopping.
    pub fn stop(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|active| active.lifecycle.request_stop())
    }
}

/// Handle to a started recording.
pub struct RecordingHandle {
    lifecycle: LifecycleController,
    thread: Option<JoinHandle<PipelineReport>>,
}

impl RecordingHandle {
    /// Requests a normal stop.
    pub fn stop(&self) -> bool {
        self.lifecycle.request_stop()
    }

    /// The recording's lifecycle.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleController {
        self.lifecycle.clone()
    }

    /// Blocks until the recording finishes.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::RecordingLost`] if the recording thread
    /// panicked.
    pub fn wait(mut self) -> ControlResult<PipelineReport> {
        self.thread
            .take()
            .ok_or(ControlError::RecordingLost)?
            .join()
            .map_err(|_| ControlError::RecordingLost)
    }
}
