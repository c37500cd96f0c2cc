//! # Camera Mirror
//!
//! The session thread writes poses, the frame scheduler reads them.
//!
//! ```text
//! Session events → CameraSync → [PoseMirror] → snapshot() ← FrameScheduler
//! ```
//!
//! Writers replace the whole view in one short critical section; readers copy
//! it out and release immediately. A reader never holds the lock while
//! rendering, and a stale view is an accepted outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::chunk::ChunkWindow;
use crate::pose::CameraPose;

/// Everything the renderer needs to know about where the camera is.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewSnapshot {
    /// Camera pose at publish time.
    pub pose: CameraPose,
    /// Loaded chunk window around the pose.
    pub window: ChunkWindow,
    /// Publish counter; 0 means nothing was ever published.
    pub generation: u64,
}

/// Eventually-consistent mirror of the session's camera pose.
///
/// Cheap to clone; all clones share the same view.
#[derive(Clone, Default)]
pub struct PoseMirror {
    inner: Arc<MirrorInner>,
}

#[derive(Default)]
struct MirrorInner {
    view: RwLock<ViewSnapshot>,
    generation: AtomicU64,
}

impl PoseMirror {
    /// Creates a mirror seeded with an initial pose.
    #[must_use]
    pub fn new(pose: CameraPose, view_distance: u32) -> Self {
        let mirror = Self::default();
        *mirror.inner.view.write() = ViewSnapshot {
            pose,
            window: ChunkWindow::around(pose.position, view_distance),
            generation: 0,
        };
        mirror
    }

    /// Publishes a new pose and chunk window.
    ///
    /// Returns the generation assigned to this view.
    pub fn publish(&self, pose: CameraPose, window: ChunkWindow) -> u64 {
        let mut view = self.inner.view.write();
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *view = ViewSnapshot {
            pose,
            window,
            generation,
        };
        generation
    }

    /// Copies out the latest published view.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        *self.inner.view.read()
    }

    /// Returns the latest generation without copying the view.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use std::thread;

    #[test]
    fn test_snapshot_sees_latest_publish() {
        let mirror = PoseMirror::new(CameraPose::default(), 2);
        assert_eq!(mirror.snapshot().generation, 0);

        let pose = CameraPose::new(Vec3::new(40.0, 64.0, 8.0), 0.5, 0.1);
        let generation = mirror.publish(pose, ChunkWindow::around(pose.position, 2));

        let view = mirror.snapshot();
        assert_eq!(generation, 1);
        assert_eq!(view.generation, 1);
        assert_eq!(view.pose, pose);
        assert_eq!(view.window.center.x, 2);
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_views() {
        let mirror = PoseMirror::new(CameraPose::default(), 1);
        let writer = {
            let mirror = mirror.clone();
            thread::spawn(move || {
                for i in 0..2_000u16 {
                    let v = f32::from(i);
                    let pose = CameraPose::new(Vec3::new(v, v, v), v, 0.0);
                    mirror.publish(pose, ChunkWindow::around(pose.position, 1));
                }
            })
        };

        for _ in 0..2_000 {
            let view = mirror.snapshot();
            let p = view.pose.position;
            assert!((p.x - p.y).abs() < f32::EPSILON && (p.y - p.z).abs() < f32::EPSILON);
            assert!((p.x - view.pose.yaw).abs() < f32::EPSILON);
        }

        writer.join().unwrap();
        assert_eq!(mirror.generation(), 2_000);
    }
}
