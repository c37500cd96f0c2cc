//! # WORLDCAST Session
//!
//! The world-facing side of a recording:
//!
//! ```text
//! ┌──────────────┐  SessionEvent   ┌────────────┐   publish   ┌────────────┐
//! │ world client │ ──────────────▶ │ CameraSync │ ──────────▶ │ PoseMirror │
//! │ (or script)  │                 └────────────┘             └────────────┘
//! └──────────────┘                        │ on_end(reason)
//!                                         ▼
//!                                   pipeline lifecycle
//! ```
//!
//! [`ScriptedWalk`] and [`TestPatternRenderer`] replace a live server and a
//! GPU renderer for demos and tests.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod camera_sync;
pub mod events;
pub mod scripted;
pub mod test_pattern;

pub use camera_sync::{CameraSync, CameraSyncHandle, SyncStats, CHANNEL_CLOSED_REASON};
pub use events::{session_channel, SessionEvent, SessionFeed};
pub use scripted::{ScriptedWalk, WalkScript, SCRIPT_FINISHED_REASON};
pub use test_pattern::TestPatternRenderer;
