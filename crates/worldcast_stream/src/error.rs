//! # Stream Error Types
//!
//! Per-frame errors ([`SerializationError`]) skip a tick. Sink errors
//! ([`SinkError`]) end the run. Neither is ever retried.

use thiserror::Error;

/// Errors turning a rendered frame into wire bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// The renderer returned an image of the wrong size.
    #[error("frame is {actual_width}x{actual_height}, pipeline expects {width}x{height}")]
    DimensionMismatch {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
        /// Width of the rendered image.
        actual_width: u32,
        /// Height of the rendered image.
        actual_height: u32,
    },

    /// The image encoder rejected the frame.
    #[error("image encoding failed: {0}")]
    Encode(String),

    /// Payload does not fit the length prefix.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Payload length.
        len: usize,
        /// Largest allowed payload.
        max: usize,
    },
}

/// Errors raised by sink transports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The encoder subprocess could not be started.
    #[error("failed to spawn encoder {program}: {reason}")]
    Spawn {
        /// Executable that was requested.
        program: String,
        /// OS error text.
        reason: String,
    },

    /// The frame socket could not be connected.
    #[error("failed to connect to {address}: {reason}")]
    Connect {
        /// Target address.
        address: String,
        /// Error text.
        reason: String,
    },

    /// The encoder exited unsuccessfully.
    #[error("encoder exited with {}", code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    SubprocessExit {
        /// Exit code, `None` if killed by a signal.
        code: Option<i32>,
    },

    /// Teardown did not finish in time; the encoder was killed.
    #[error("sink did not close within {after_ms} ms")]
    ShutdownTimeout {
        /// Deadline that expired.
        after_ms: u64,
    },

    /// Transport I/O failure.
    #[error("sink i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors from the recording registry.
#[derive(Error, Debug)]
pub enum ControlError {
    /// A recording is already running.
    #[error("a recording to {destination} is already in progress")]
    AlreadyRecording {
        /// Destination of the active recording.
        destination: String,
    },

    /// The pipeline thread could not be started.
    #[error("failed to start recording thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The pipeline thread panicked before producing an outcome.
    #[error("recording thread exited without an outcome")]
    RecordingLost,
}

/// Result type for recording control.
pub type ControlResult<T> = Result<T, ControlError>;
