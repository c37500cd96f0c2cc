//! Camera pose as reported by the world session.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Position plus yaw/pitch orientation of the automated client.
///
/// Angles are radians. The session provider owns the authoritative value;
/// everything in this workspace only ever sees copies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Feet position in world space.
    pub position: Vec3,
    /// Horizontal rotation.
    pub yaw: f32,
    /// Vertical rotation, clamped to straight up / straight down.
    pub pitch: f32,
}

impl CameraPose {
    /// Creates a pose, clamping pitch into `[-pi/2, pi/2]`.
    #[must_use]
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch: pitch.clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2),
        }
    }

    /// Unit view direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        Vec3::from_yaw_pitch(self.yaw, self.pitch)
    }
}
