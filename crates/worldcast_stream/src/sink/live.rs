//! Live stream output through the encoder.
//!
//! Constant bitrate and a fixed GOP of two seconds, tuned for unbounded
//! runs pushed to an RTMP ingest.

use std::time::Duration;

use crossbeam_channel::Receiver;
use worldcast_core::{EncoderConfig, SinkKind};

use super::encoder::EncoderSink;
use super::{DrainResult, Sink, SinkState, WriteOutcome};
use crate::encode::WireFormat;
use crate::error::SinkResult;

/// Encoder subprocess pushing a live stream.
pub struct LiveEncoderSink {
    inner: EncoderSink,
}

impl LiveEncoderSink {
    /// Spawns the encoder streaming to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Spawn`](crate::SinkError::Spawn) if the encoder
    /// cannot be started.
    pub fn open(url: &str, fps: u32, width: u32, height: u32, encoder: &EncoderConfig) -> SinkResult<Self> {
        let args = Self::args(url, fps, width, height, encoder);
        Ok(Self {
            inner: EncoderSink::spawn(SinkKind::Live, encoder, &args)?,
        })
    }

    /// Encoder command line.
    #[must_use]
    pub fn args(url: &str, fps: u32, width: u32, height: u32, encoder: &EncoderConfig) -> Vec<String> {
        let rate = format!("{}k", encoder.bitrate_kbps);
        let gop = (u64::from(fps) * 2).to_string();
        let fps = fps.to_string();
        let size = format!("{width}x{height}");
        let threads = encoder.threads.to_string();
        [
            "-y",
            "-f",
            "image2pipe",
            "-r",
            fps.as_str(),
            "-probesize",
            "42M",
            "-i",
            "pipe:0",
            "-f",
            "flv",
            "-ac",
            "2",
            "-ar",
            "44100",
            "-vcodec",
            "libx264",
            "-g",
            gop.as_str(),
            "-keyint_min",
            fps.as_str(),
            "-b:v",
            rate.as_str(),
            "-minrate",
            rate.as_str(),
            "-maxrate",
            rate.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-s",
            size.as_str(),
            "-preset",
            "ultrafast",
            "-tune",
            "film",
            "-threads",
            threads.as_str(),
            "-strict",
            "normal",
            "-bufsize",
            rate.as_str(),
            url,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

impl Sink for LiveEncoderSink {
    fn kind(&self) -> SinkKind {
        self.inner.kind()
    }

    fn wire_format(&self) -> WireFormat {
        self.inner.wire_format()
    }

    fn state(&self) -> SinkState {
        self.inner.state()
    }

    fn write(&mut self, bytes: &[u8]) -> WriteOutcome {
        self.inner.write(bytes)
    }

    fn drained(&self) -> Receiver<DrainResult> {
        self.inner.drained()
    }

    fn close(&mut self, timeout: Duration) -> SinkResult<()> {
        self.inner.close(timeout)
    }
}
