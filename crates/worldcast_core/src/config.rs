//! # Pipeline Configuration
//!
//! Loaded once from TOML at startup and frozen for the lifetime of a
//! pipeline. Changing anything means starting a new pipeline.
//!
//! ```toml
//! fps = 30
//! width = 1280
//! height = 720
//! frames = 600
//!
//! [sink]
//! kind = "container"
//! path = "/output/recording.mp4"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::DEFAULT_VIEW_DISTANCE;
use crate::error::{ConfigError, ConfigResult};
use crate::frame::FrameBudget;

/// Default target frame rate.
pub const DEFAULT_FPS: u32 = 60;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Default time allowed for the sink to close before it is killed.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Which sink variant a pipeline writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Encoder subprocess writing a container file.
    Container,
    /// Encoder subprocess pushing a live stream.
    Live,
    /// Length-prefixed frames over TCP.
    Socket,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Container => "container",
            Self::Live => "live",
            Self::Socket => "socket",
        })
    }
}

/// Output destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Fragmented container file written by the encoder.
    Container {
        /// Output file.
        path: PathBuf,
    },
    /// Live stream pushed by the encoder.
    Live {
        /// Stream URL, e.g. `rtmp://host/app/key`.
        url: String,
    },
    /// Raw frame socket.
    Socket {
        /// `host:port` to connect to.
        address: String,
        /// Connect timeout in milliseconds.
        #[serde(default = "default_connect_timeout_ms")]
        connect_timeout_ms: u64,
        /// Per-write timeout in milliseconds; 0 disables it.
        #[serde(default)]
        write_timeout_ms: u64,
    },
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl SinkConfig {
    /// Variant of this destination.
    #[must_use]
    pub const fn kind(&self) -> SinkKind {
        match self {
            Self::Container { .. } => SinkKind::Container,
            Self::Live { .. } => SinkKind::Live,
            Self::Socket { .. } => SinkKind::Socket,
        }
    }

    /// Guesses a sink from a bare destination string.
    ///
    /// `rtmp://` URLs stream live, `.mp4`/`.mkv` paths are container files,
    /// anything else is treated as `host:port`. Only the command line uses
    /// this; config files name the kind explicitly.
    #[must_use]
    pub fn infer(destination: &str) -> Self {
        if destination.starts_with("rtmp://") {
            Self::Live {
                url: destination.to_string(),
            }
        } else if destination.ends_with("mp4") || destination.ends_with("mkv") {
            Self::Container {
                path: PathBuf::from(destination),
            }
        } else {
            Self::Socket {
                address: destination.to_string(),
                connect_timeout_ms: default_connect_timeout_ms(),
                write_timeout_ms: 0,
            }
        }
    }

    /// Human-readable destination.
    #[must_use]
    pub fn destination(&self) -> String {
        match self {
            Self::Container { path } => path.display().to_string(),
            Self::Live { url } => url.clone(),
            Self::Socket { address, .. } => address.clone(),
        }
    }
}

/// Image serialization parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// JPEG quality, 1..=100.
    #[serde(default = "default_quality")]
    pub quality: u8,
}

fn default_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Encoder subprocess parameters (container and live sinks).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable.
    pub program: String,
    /// Forward the encoder's stdout/stderr into the log.
    pub log_output: bool,
    /// Constant bitrate for live output, kbit/s.
    pub bitrate_kbps: u32,
    /// Encoder worker threads for live output.
    pub threads: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            log_output: false,
            bitrate_kbps: 1000,
            threads: 4,
        }
    }
}

/// Immutable configuration for one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target frame rate.
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames to deliver; negative in TOML means unbounded.
    #[serde(rename = "frames", default)]
    pub budget: FrameBudget,
    /// Chunks kept loaded around the camera.
    #[serde(default = "default_view_distance")]
    pub view_distance: u32,
    /// Image serialization parameters.
    #[serde(default)]
    pub image: ImageConfig,
    /// Where frames go.
    pub sink: SinkConfig,
    /// Encoder subprocess parameters.
    #[serde(default)]
    pub encoder: EncoderConfig,
    /// Time allowed for sink teardown before the encoder is killed.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_view_distance() -> u32 {
    DEFAULT_VIEW_DISTANCE
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

impl PipelineConfig {
    /// Creates a config with defaults for everything but the sink.
    #[must_use]
    pub fn new(sink: SinkConfig) -> Self {
        Self {
            fps: DEFAULT_FPS,
            width: 512,
            height: 512,
            budget: FrameBudget::Unbounded,
            view_distance: DEFAULT_VIEW_DISTANCE,
            image: ImageConfig::default(),
            sink,
            encoder: EncoderConfig::default(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is malformed or invalid.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks the invariants every pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be at least 1".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(1..=100).contains(&self.image.quality) {
            return Err(ConfigError::Invalid(format!(
                "image quality must be within 1..=100, got {}",
                self.image.quality
            )));
        }
        if self.sink.destination().trim().is_empty() {
            return Err(ConfigError::Invalid("sink destination is empty".into()));
        }
        if let SinkConfig::Socket { address, .. } = &self.sink {
            if !address.contains(':') {
                return Err(ConfigError::Invalid(format!(
                    "socket address must be host:port, got {address:?}"
                )));
            }
        }
        if self.sink.kind() != SinkKind::Socket && self.encoder.program.trim().is_empty() {
            return Err(ConfigError::Invalid("encoder program is empty".into()));
        }
        Ok(())
    }

    /// Delay between the end of one tick and the start of the next.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.fps.max(1)))
    }

    /// Teardown deadline.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_container_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            fps = 30
            width = 1280
            height = 720
            frames = 600

            [image]
            quality = 80

            [sink]
            kind = "container"
            path = "/output/recording.mp4"
            "#,
        )
        .unwrap();

        assert_eq!(config.fps, 30);
        assert_eq!(config.budget, FrameBudget::Finite(600));
        assert_eq!(config.image.quality, 80);
        assert_eq!(config.sink.kind(), SinkKind::Container);
        assert_eq!(config.encoder.program, "ffmpeg");
        assert_eq!(config.view_distance, DEFAULT_VIEW_DISTANCE);
        assert_eq!(config.frame_interval(), Duration::from_micros(33_333));
    }

    #[test]
    fn test_parse_socket_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            width = 512
            height = 512
            frames = -1

            [sink]
            kind = "socket"
            address = "127.0.0.1:8089"
            "#,
        )
        .unwrap();

        assert_eq!(config.fps, DEFAULT_FPS);
        assert_eq!(config.budget, FrameBudget::Unbounded);
        match config.sink {
            SinkConfig::Socket {
                connect_timeout_ms,
                write_timeout_ms,
                ..
            } => {
                assert_eq!(connect_timeout_ms, 5_000);
                assert_eq!(write_timeout_ms, 0);
            }
            other => panic!("unexpected sink {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PipelineConfig::new(SinkConfig::infer("out.mp4"));
        config.fps = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PipelineConfig::new(SinkConfig::infer("out.mp4"));
        config.image.quality = 0;
        assert!(config.validate().is_err());

        let config = PipelineConfig::new(SinkConfig::infer("localhost"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_sink_kind_is_parse_error() {
        let err = PipelineConfig::from_toml_str(
            r#"
            width = 1
            height = 1
            [sink]
            kind = "carrier-pigeon"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_infer_from_destination() {
        assert_eq!(SinkConfig::infer("rtmp://live/app/key").kind(), SinkKind::Live);
        assert_eq!(SinkConfig::infer("/out/a.mp4").kind(), SinkKind::Container);
        assert_eq!(SinkConfig::infer("/out/a.mkv").kind(), SinkKind::Container);
        assert_eq!(SinkConfig::infer("10.0.0.2:8089").kind(), SinkKind::Socket);
    }
}
