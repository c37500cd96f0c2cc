//! # WORLDCAST Stream
//!
//! The frame streaming pipeline: paces frame production against real time,
//! serializes each frame into the active sink's wire format, honours sink
//! backpressure, and ends every run in exactly one [`PipelineOutcome`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Pipeline                              │
//! │                                                                  │
//! │  ┌────────────────┐   ┌────────────────┐   ┌──────────────────┐  │
//! │  │ FrameScheduler │──▶│ FrameSerializer│──▶│ Sink             │  │
//! │  │ + Pacing       │   │ JPEG / u32+JPEG│   │ container / live │  │
//! │  └───────┬────────┘   └────────────────┘   │ / framed socket  │  │
//! │          │                                 └────────┬─────────┘  │
//! │          └──────────── LifecycleController ◀────────┘            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use worldcast_core::{PipelineConfig, SinkConfig};
//! use worldcast_session::{session_channel, TestPatternRenderer};
//! use worldcast_stream::{open_sink, Pipeline};
//!
//! let config = PipelineConfig::new(SinkConfig::infer("/output/recording.mp4"));
//! let sink = open_sink(&config)?;
//! let renderer = TestPatternRenderer::new(config.width, config.height);
//! let (feed, events) = session_channel();
//! let report = Pipeline::new(config, renderer, sink).run(events);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod encode;
pub mod error;
pub mod lifecycle;
pub mod pacing;
pub mod pipeline;
pub mod recorder;
pub mod scheduler;
pub mod sink;

pub use codec::{encode_frame, read_frame, write_frame, FrameDecoder, LENGTH_PREFIX_BYTES, MAX_FRAME_LEN};
pub use encode::{FrameSerializer, WireFormat};
pub use error::{ControlError, ControlResult, SerializationError, SinkError, SinkResult};
pub use lifecycle::{AbortReason, LifecycleController, LifecyclePhase, PipelineOutcome, StopCause};
pub use pacing::{PacingController, PacingStats, PacingWait};
pub use pipeline::{Pipeline, PipelineReport};
pub use recorder::{Recorder, RecorderStatus, RecordingHandle};
pub use scheduler::{FrameScheduler, PipelineState, PipelineStats, SchedulerReport};
pub use sink::{
    open_sink, ContainerEncoderSink, DrainResult, EncoderProcess, FramedSocketSink, LiveEncoderSink, SharedSink, Sink,
    SinkState, WriteOutcome,
};
