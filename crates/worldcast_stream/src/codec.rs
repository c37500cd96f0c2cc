//! # Length-Prefixed Frame Codec
//!
//! Wire format of the frame socket:
//!
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ len: u32 LE  │ payload: len bytes (JPEG) │  repeated, no trailer
//! └──────────────┴───────────────────────────┘
//! ```
//!
//! There is no handshake, type tag or resync marker. A reader that loses
//! its place cannot recover; end of stream is the connection closing.

use std::io::{self, Read, Write};

use crate::error::SerializationError;

/// Size of the length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 4;

/// Largest payload accepted in either direction (64 MiB).
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Prepends the length prefix to `payload`.
///
/// # Errors
///
/// Returns [`SerializationError::FrameTooLarge`] above [`MAX_FRAME_LEN`].
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, SerializationError> {
    let len = checked_len(payload.len())?;
    let mut out = Vec::with_capacity(LENGTH_PREFIX_BYTES + payload.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Writes one framed payload and flushes.
///
/// # Errors
///
/// Returns an I/O error from the writer, or `InvalidData` for oversized
/// payloads.
pub fn write_frame<W: Write>(mut w: W, payload: &[u8]) -> io::Result<()> {
    let len = checked_len(payload.len())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(payload)?;
    w.flush()
}

/// Reads one framed payload.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
///
/// # Errors
///
/// Returns `UnexpectedEof` if the stream ends inside a frame, and
/// `InvalidData` if the prefix exceeds [`MAX_FRAME_LEN`].
pub fn read_frame<R: Read>(mut r: R) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; LENGTH_PREFIX_BYTES];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_BYTES {
        match r.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some(payload))
}

fn checked_len(len: usize) -> Result<u32, SerializationError> {
    if len > MAX_FRAME_LEN {
        return Err(SerializationError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    u32::try_from(len).map_err(|_| SerializationError::FrameTooLarge {
        len,
        max: MAX_FRAME_LEN,
    })
}

/// Incremental decoder for bytes arriving in arbitrary chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pops the next complete payload, if one is buffered.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::FrameTooLarge`] if the next prefix is
    /// out of range. The stream is unusable afterwards.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, SerializationError> {
        let Some(prefix) = self.buffer.get(..LENGTH_PREFIX_BYTES) else {
            return Ok(None);
        };
        let mut len_bytes = [0u8; LENGTH_PREFIX_BYTES];
        len_bytes.copy_from_slice(prefix);
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_FRAME_LEN {
            return Err(SerializationError::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        let end = LENGTH_PREFIX_BYTES + len;
        if self.buffer.len() < end {
            return Ok(None);
        }
        let payload = self.buffer[LENGTH_PREFIX_BYTES..end].to_vec();
        self.buffer.drain(..end);
        Ok(Some(payload))
    }

    /// Bytes buffered but not yet returned.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
