//! Software test-pattern renderer.
//!
//! Stands in for a real scene renderer when recording without a GPU. The
//! picture is cheap but pose dependent: the horizon follows pitch, ground
//! stripes scroll with yaw and position, and a minimap in the corner shows
//! the loaded chunk window, so a stuck camera is obvious in the output.

use std::f32::consts::{FRAC_PI_2, TAU};

use image::{Rgb, RgbImage};
use worldcast_core::{CameraPose, ChunkWindow, RenderError, Renderer};

const SKY_TOP: [u8; 3] = [92, 140, 228];
const SKY_HORIZON: [u8; 3] = [176, 208, 255];
const GRASS: [u8; 3] = [86, 148, 62];
const DIRT: [u8; 3] = [121, 85, 58];
const MINIMAP_CELL: u32 = 3;
const STRIPE_WIDTH: f32 = 32.0;

/// Renders a procedural first-person test card.
pub struct TestPatternRenderer {
    width: u32,
    height: u32,
    pose: Option<CameraPose>,
    window: ChunkWindow,
    frames_rendered: u64,
}

impl TestPatternRenderer {
    /// Creates a renderer producing `width`×`height` images.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pose: None,
            window: ChunkWindow::default(),
            frames_rendered: 0,
        }
    }

    /// Number of images produced so far.
    #[must_use]
    pub const fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn draw_world(&self, image: &mut RgbImage, pose: &CameraPose) {
        let h = self.height as f32;
        let horizon = (h / 2.0 + pose.pitch / FRAC_PI_2 * h / 2.0).clamp(0.0, h) as u32;
        let scroll = pose.yaw.rem_euclid(TAU) / TAU * self.width as f32
            + (pose.position.x + pose.position.z) * 4.0;

        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = if y < horizon {
                let t = if horizon == 0 { 1.0 } else { y as f32 / horizon as f32 };
                Rgb(lerp(SKY_TOP, SKY_HORIZON, t))
            } else {
                let band = ((x as f32 + scroll) / STRIPE_WIDTH).floor() as i64;
                if band.rem_euclid(2) == 0 {
                    Rgb(GRASS)
                } else {
                    Rgb(DIRT)
                }
            };
        }
    }

    fn draw_minimap(&self, image: &mut RgbImage) {
        let side = 2 * self.window.view_distance + 1;
        let span = side * MINIMAP_CELL;
        if span + 2 > self.width || span + 2 > self.height {
            return;
        }
        for row in 0..side {
            for col in 0..side {
                let center = row == self.window.view_distance && col == self.window.view_distance;
                let color = if center { Rgb([255, 64, 64]) } else { Rgb([32, 32, 32]) };
                for dy in 0..MINIMAP_CELL - 1 {
                    for dx in 0..MINIMAP_CELL - 1 {
                        image.put_pixel(1 + col * MINIMAP_CELL + dx, 1 + row * MINIMAP_CELL + dy, color);
                    }
                }
            }
        }
    }
}

impl Renderer for TestPatternRenderer {
    fn set_pose(&mut self, pose: &CameraPose, window: &ChunkWindow) {
        self.pose = Some(*pose);
        self.window = *window;
    }

    fn render_frame(&mut self) -> Result<RgbImage, RenderError> {
        let pose = self
            .pose
            .ok_or_else(|| RenderError::NotReady("no camera pose yet".into()))?;
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::Failed(format!(
                "cannot render a {}x{} image",
                self.width, self.height
            )));
        }

        let mut image = RgbImage::new(self.width, self.height);
        self.draw_world(&mut image, &pose);
        self.draw_minimap(&mut image);
        self.frames_rendered += 1;
        Ok(image)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lerp(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}
