//! Scripted demo session.
//!
//! Drives a [`SessionFeed`] without a server: every step the camera turns
//! a little and walks forward, and after a fixed duration the session ends
//! on its own. Used by the `worldcast` binary and by integration tests.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{after, bounded, select, tick, Sender};
use tracing::debug;
use worldcast_core::{CameraPose, Vec3};

use crate::events::SessionFeed;

/// Reason reported when the script runs to the end.
pub const SCRIPT_FINISHED_REASON: &str = "script finished";

/// Movement script parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WalkScript {
    /// Pose the walk starts from.
    pub start: CameraPose,
    /// Time between pose updates.
    pub step_interval: Duration,
    /// Yaw added per step, radians.
    pub yaw_step: f32,
    /// Blocks walked per step along the view direction.
    pub stride: f32,
    /// Total script length. The session ends when it elapses.
    pub duration: Duration,
}

impl Default for WalkScript {
    fn default() -> Self {
        Self {
            start: CameraPose::new(Vec3::new(0.5, 64.0, 0.5), 0.0, -0.2),
            step_interval: Duration::from_millis(50),
            yaw_step: 0.1,
            stride: 0.2,
            duration: Duration::from_secs(25),
        }
    }
}

impl WalkScript {
    /// Pose after `steps` steps from the start.
    #[must_use]
    pub fn pose_at(&self, steps: u64) -> CameraPose {
        let mut pose = self.start;
        for _ in 0..steps {
            pose = self.step(pose);
        }
        pose
    }

    fn step(&self, pose: CameraPose) -> CameraPose {
        // Walk level, whatever the camera pitch.
        let turned = CameraPose::new(pose.position, pose.yaw + self.yaw_step, 0.0);
        let position = pose.position + turned.forward() * self.stride;
        CameraPose::new(position, turned.yaw, pose.pitch)
    }
}

/// A running scripted session.
pub struct ScriptedWalk {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<u64>>,
}

impl ScriptedWalk {
    /// Starts the script on its own thread, feeding `feed`.
    ///
    /// The start pose is sent immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn(script: WalkScript, feed: SessionFeed) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let thread = thread::Builder::new()
            .name("worldcast-script".into())
            .spawn(move || {
                let ticker = tick(script.step_interval);
                let deadline = after(script.duration);
                let mut pose = script.start;
                let mut steps = 0u64;

                if !feed.pose_changed(pose) {
                    return steps;
                }
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            pose = script.step(pose);
                            steps += 1;
                            if !feed.pose_changed(pose) {
                                debug!("Script listener gone after {} steps", steps);
                                return steps;
                            }
                        }
                        recv(deadline) -> _ => {
                            feed.end(SCRIPT_FINISHED_REASON);
                            return steps;
                        }
                        recv(stop_rx) -> _ => return steps,
                    }
                }
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stops the script without ending the session. Returns steps taken.
    pub fn stop(mut self) -> u64 {
        self.stop.take();
        self.thread
            .take()
            .and_then(|t| t.join().ok())
            .unwrap_or(0)
    }
}

impl Drop for ScriptedWalk {
    fn drop(&mut self) {
        self.stop.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{session_channel, SessionEvent};

    #[test]
    fn test_step_turns_and_walks() {
        let script = WalkScript::default();
        let pose = script.pose_at(3);
        assert!((pose.yaw - 0.3).abs() < 1e-5);
        assert!((pose.position - script.start.position).length() > 0.5);
        assert!((pose.position.y - script.start.position.y).abs() < f32::EPSILON);
    }

    #[test]
    fn test_script_ends_session() {
        let (feed, events) = session_channel();
        let script = WalkScript {
            step_interval: Duration::from_millis(5),
            duration: Duration::from_millis(60),
            ..WalkScript::default()
        };
        let walk = ScriptedWalk::spawn(script, feed).unwrap();

        let mut poses = 0;
        let reason = loop {
            match events.recv_timeout(Duration::from_secs(2)).unwrap() {
                SessionEvent::PoseChanged(_) => poses += 1,
                SessionEvent::Ended { reason } => break reason,
            }
        };
        assert_eq!(reason, SCRIPT_FINISHED_REASON);
        assert!(poses >= 1);
        walk.stop();
    }

    #[test]
    fn test_stop_sends_no_end() {
        let (feed, events) = session_channel();
        let script = WalkScript {
            step_interval: Duration::from_millis(5),
            duration: Duration::from_secs(60),
            ..WalkScript::default()
        };
        let walk = ScriptedWalk::spawn(script, feed).unwrap();
        walk.stop();

        let ended = events
            .try_iter()
            .any(|e| matches!(e, SessionEvent::Ended { .. }));
        assert!(!ended);
    }
}
