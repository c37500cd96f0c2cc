//! Frame serialization.
//!
//! Every sink receives independently decodable JPEG images. Encoder sinks
//! take them back to back on stdin; the frame socket wraps each one in a
//! length prefix.

use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use worldcast_core::{Frame, PipelineConfig};

use crate::codec;
use crate::error::SerializationError;

/// Byte layout a sink expects on its transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// Complete images concatenated, as read by `-f image2pipe`.
    ImageSequence,
    /// `u32` little-endian length followed by the image.
    LengthPrefixed,
}

/// Turns frames into the bytes a sink expects.
#[derive(Clone, Debug)]
pub struct FrameSerializer {
    quality: u8,
    width: u32,
    height: u32,
    wire: WireFormat,
}

impl FrameSerializer {
    /// Creates a serializer for `width`×`height` frames.
    #[must_use]
    pub const fn new(width: u32, height: u32, quality: u8, wire: WireFormat) -> Self {
        Self {
            quality,
            width,
            height,
            wire,
        }
    }

    /// Creates a serializer matching a pipeline config and sink format.
    #[must_use]
    pub const fn for_config(config: &PipelineConfig, wire: WireFormat) -> Self {
        Self::new(config.width, config.height, config.image.quality, wire)
    }

    /// Wire format produced.
    #[must_use]
    pub const fn wire_format(&self) -> WireFormat {
        self.wire
    }

    /// Encodes one frame.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError`] if the frame has the wrong size or
    /// the image encoder fails.
    pub fn serialize(&self, frame: &Frame) -> Result<Vec<u8>, SerializationError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(SerializationError::DimensionMismatch {
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(frame.image().as_raw(), self.width, self.height, ColorType::Rgb8)
            .map_err(|e| SerializationError::Encode(e.to_string()))?;

        match self.wire {
            WireFormat::ImageSequence => Ok(jpeg),
            WireFormat::LengthPrefixed => codec::encode_frame(&jpeg),
        }
    }
}
