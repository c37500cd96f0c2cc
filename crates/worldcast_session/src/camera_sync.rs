//! # Camera Sync
//!
//! Subscribes once to the session's event channel and mirrors every pose
//! change into the [`PoseMirror`] together with the chunk window around it.
//!
//! ```text
//! SessionEvent::PoseChanged ──▶ CameraSync ──▶ PoseMirror (pose + window)
//! SessionEvent::Ended       ──▶ CameraSync ──▶ on_end(reason)
//! ```
//!
//! There is no timing logic here: a pose is published the moment it
//! arrives, whatever the frame scheduler happens to be doing.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, info};
use worldcast_core::{CameraPose, ChunkWindow, PoseMirror};

use crate::events::SessionEvent;

/// Reason used when the session drops its sender without saying goodbye.
pub const CHANNEL_CLOSED_REASON: &str = "session channel closed";

/// Counters kept by the sync thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Pose changes applied.
    pub poses_applied: u64,
    /// Times the camera crossed into a new chunk.
    pub window_moves: u64,
    /// Chunks that entered the window over the whole run.
    pub chunks_entered: u64,
}

/// Applies session poses to the camera mirror.
pub struct CameraSync {
    mirror: PoseMirror,
    view_distance: u32,
    window: ChunkWindow,
    stats: SyncStats,
}

impl CameraSync {
    /// Creates a sync bound to `mirror`.
    #[must_use]
    pub fn new(mirror: PoseMirror, view_distance: u32) -> Self {
        let window = mirror.snapshot().window;
        Self {
            mirror,
            view_distance,
            window,
            stats: SyncStats::default(),
        }
    }

    /// Publishes a pose and, if the camera changed chunk, a new window.
    ///
    /// Returns the mirror generation of the published view.
    pub fn apply(&mut self, pose: CameraPose) -> u64 {
        let window = ChunkWindow::around(pose.position, self.view_distance);
        if window != self.window {
            let entered = window.entered_since(&self.window).len() as u64;
            self.stats.window_moves += 1;
            self.stats.chunks_entered += entered;
            debug!(
                "Chunk window moved to ({}, {}), {} chunks entered",
                window.center.x, window.center.z, entered
            );
            self.window = window;
        }
        self.stats.poses_applied += 1;
        self.mirror.publish(pose, self.window)
    }

    /// Returns sync statistics.
    #[must_use]
    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Runs the sync on its own thread.
    ///
    /// `on_end` is called once if the session ends or its channel closes.
    /// It is not called when the handle is stopped first.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<F>(mut self, events: Receiver<SessionEvent>, on_end: F) -> std::io::Result<CameraSyncHandle>
    where
        F: FnOnce(String) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let thread = thread::Builder::new()
            .name("worldcast-camera-sync".into())
            .spawn(move || {
                let reason = self.pump(&events, &shutdown_rx);
                if let Some(reason) = reason {
                    info!("Session ended: {}", reason);
                    on_end(reason);
                }
                self.stats
            })?;

        Ok(CameraSyncHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    fn pump(&mut self, events: &Receiver<SessionEvent>, shutdown: &Receiver<()>) -> Option<String> {
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(SessionEvent::PoseChanged(pose)) => {
                        self.apply(pose);
                    }
                    Ok(SessionEvent::Ended { reason }) => return Some(reason),
                    Err(_) => return Some(CHANNEL_CLOSED_REASON.to_string()),
                },
                recv(shutdown) -> _ => return None,
            }
        }
    }
}

/// Handle to a running [`CameraSync`] thread.
pub struct CameraSyncHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<SyncStats>>,
}

impl CameraSyncHandle {
    /// Stops the thread and returns its statistics.
    pub fn stop(mut self) -> SyncStats {
        self.shutdown.take();
        self.thread
            .take()
            .and_then(|t| t.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for CameraSyncHandle {
    fn drop(&mut self) {
        self.shutdown.take();
    }
}
