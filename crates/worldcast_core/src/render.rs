//! Renderer seam.
//!
//! The workspace never draws anything itself for real recordings. A host
//! links in a renderer that implements [`Renderer`]; the frame scheduler
//! calls it once per tick.

use image::RgbImage;
use thiserror::Error;

use crate::chunk::ChunkWindow;
use crate::pose::CameraPose;

/// Errors a renderer may report for a single frame.
///
/// These never end a recording; the tick is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer has nothing to show yet (e.g. world version unknown).
    #[error("renderer not ready: {0}")]
    NotReady(String),

    /// Drawing the scene failed.
    #[error("render failed: {0}")]
    Failed(String),
}

/// Synchronous first-person renderer.
///
/// Must tolerate being called before chunks near the camera have loaded;
/// a partial image is a valid result.
pub trait Renderer: Send {
    /// Moves the camera and the loaded chunk window.
    fn set_pose(&mut self, pose: &CameraPose, window: &ChunkWindow);

    /// Draws one image from the current camera.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if this frame could not be produced.
    fn render_frame(&mut self) -> Result<RgbImage, RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn set_pose(&mut self, pose: &CameraPose, window: &ChunkWindow) {
        (**self).set_pose(pose, window);
    }

    fn render_frame(&mut self) -> Result<RgbImage, RenderError> {
        (**self).render_frame()
    }
}
