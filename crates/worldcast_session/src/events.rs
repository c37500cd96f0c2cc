//! # Session Events
//!
//! The world session reports two things: the client moved, or the session
//! is over. Both travel over one unbounded channel so the sender (a network
//! callback, a script) never blocks.

use crossbeam_channel::{unbounded, Receiver, Sender};
use worldcast_core::CameraPose;

/// Notification from the world session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// The automated client's pose changed.
    PoseChanged(CameraPose),
    /// The session ended (kick, disconnect, quit).
    Ended {
        /// Reason reported by the session.
        reason: String,
    },
}

/// Sending half handed to the session provider.
#[derive(Clone, Debug)]
pub struct SessionFeed {
    tx: Sender<SessionEvent>,
}

impl SessionFeed {
    /// Reports a new pose. Returns false if nobody is listening anymore.
    pub fn pose_changed(&self, pose: CameraPose) -> bool {
        self.tx.send(SessionEvent::PoseChanged(pose)).is_ok()
    }

    /// Reports the end of the session. Returns false if nobody is listening.
    pub fn end(&self, reason: impl Into<String>) -> bool {
        self.tx
            .send(SessionEvent::Ended {
                reason: reason.into(),
            })
            .is_ok()
    }
}

/// Creates a connected feed/receiver pair.
#[must_use]
pub fn session_channel() -> (SessionFeed, Receiver<SessionEvent>) {
    let (tx, rx) = unbounded();
    (SessionFeed { tx }, rx)
}
