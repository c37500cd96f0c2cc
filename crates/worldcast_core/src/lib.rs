//! # WORLDCAST Core
//!
//! Plain data and trait seams shared by every other crate:
//!
//! - **Pose**: where the automated client stands and looks
//! - **Chunk window**: which chunks the renderer keeps loaded
//! - **Mirror**: lock-light snapshot of the latest pose for the scheduler
//! - **Frame / budget**: what the pipeline produces and how many
//! - **Clock**: injectable timers so pacing can be simulated
//! - **Config**: the frozen `PipelineConfig`
//! - **Renderer**: the one call the pipeline makes into graphics code
//!
//! ## Example
//!
//! ```rust,ignore
//! use worldcast_core::{PipelineConfig, SinkConfig};
//!
//! let mut config = PipelineConfig::new(SinkConfig::infer("/output/recording.mp4"));
//! config.fps = 30;
//! config.validate()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod clock;
pub mod config;
pub mod error;
pub mod frame;
pub mod math;
pub mod pose;
pub mod render;
pub mod sync;

pub use chunk::{ChunkCoord, ChunkWindow, CHUNK_SIZE, DEFAULT_VIEW_DISTANCE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EncoderConfig, ImageConfig, PipelineConfig, SinkConfig, SinkKind};
pub use error::{ConfigError, ConfigResult};
pub use frame::{Frame, FrameBudget};
pub use math::Vec3;
pub use pose::CameraPose;
pub use render::{RenderError, Renderer};
pub use sync::{PoseMirror, ViewSnapshot};

/// Re-exported so renderers and encoders agree on one raster type.
pub use image::RgbImage;
