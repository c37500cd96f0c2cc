//! Container file output through the encoder.
//!
//! JPEG frames go to stdin as an image sequence; the encoder writes a
//! fragmented MP4 (`frag_keyframe+empty_moov`) so the file is playable
//! even if the run is cut short.

use std::path::Path;
use std::time::Duration;

use crossbeam_channel::Receiver;
use worldcast_core::{EncoderConfig, SinkKind};

use super::encoder::EncoderSink;
use super::{DrainResult, Sink, SinkState, WriteOutcome};
use crate::encode::WireFormat;
use crate::error::SinkResult;

/// Encoder subprocess writing a streamable container file.
pub struct ContainerEncoderSink {
    inner: EncoderSink,
}

impl ContainerEncoderSink {
    /// Spawns the encoder writing to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Spawn`](crate::SinkError::Spawn) if the encoder
    /// cannot be started.
    pub fn open(path: &Path, fps: u32, encoder: &EncoderConfig) -> SinkResult<Self> {
        let args = Self::args(path, fps);
        Ok(Self {
            inner: EncoderSink::spawn(SinkKind::Container, encoder, &args)?,
        })
    }

    /// Encoder command line for `path` at `fps`.
    #[must_use]
    pub fn args(path: &Path, fps: u32) -> Vec<String> {
        let fps = fps.to_string();
        let path = path.display().to_string();
        [
            "-y",
            "-f",
            "image2pipe",
            "-framerate",
            fps.as_str(),
            "-i",
            "-",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "frag_keyframe+empty_moov",
            path.as_str(),
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

impl Sink for ContainerEncoderSink {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_args() {
        let args = ContainerEncoderSink::args(Path::new("/output/recording.mp4"), 30);
        assert_eq!(
            args.join(" "),
            "-y -f image2pipe -framerate 30 -i - -c:v libx264 -pix_fmt yuv420p \
             -movflags frag_keyframe+empty_moov /output/recording.mp4"
        );
    }
}
