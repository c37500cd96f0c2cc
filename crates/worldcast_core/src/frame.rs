//! Rendered frames and the frame budget.

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One rendered image plus its position in the output stream.
///
/// Produced by the renderer, consumed once by serialization, then dropped.
#[derive(Clone, Debug)]
pub struct Frame {
    sequence: u64,
    image: RgbImage,
}

impl Frame {
    /// Wraps a rendered image.
    #[must_use]
    pub fn new(sequence: u64, image: RgbImage) -> Self {
        Self { sequence, image }
    }

    /// Position of this frame in the output stream, starting at 0.
    #[inline]
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The raster image.
    #[inline]
    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// How many frames a pipeline run delivers before completing normally.
///
/// In config files this is a plain integer; any negative value means
/// unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum FrameBudget {
    /// Stop after this many delivered frames.
    Finite(u64),
    /// Run until stopped from outside.
    Unbounded,
}

impl FrameBudget {
    /// Returns true once `delivered` frames exhaust the budget.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(self, delivered: u64) -> bool {
        match self {
            Self::Finite(n) => delivered >= n,
            Self::Unbounded => false,
        }
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::Unbounded
    }
}

impl From<i64> for FrameBudget {
    fn from(count: i64) -> Self {
        u64::try_from(count).map_or(Self::Unbounded, Self::Finite)
    }
}

impl From<FrameBudget> for i64 {
    fn from(budget: FrameBudget) -> Self {
        match budget {
            FrameBudget::Finite(n) => i64::try_from(n).unwrap_or(i64::MAX),
            FrameBudget::Unbounded => -1,
        }
    }
}

impl std::fmt::Display for FrameBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_count_is_unbounded() {
        assert_eq!(FrameBudget::from(-1), FrameBudget::Unbounded);
        assert_eq!(FrameBudget::from(-600), FrameBudget::Unbounded);
        assert_eq!(FrameBudget::from(600), FrameBudget::Finite(600));
        assert_eq!(i64::from(FrameBudget::Unbounded), -1);
    }

    #[test]
    fn test_exhaustion() {
        assert!(FrameBudget::Finite(0).is_exhausted(0));
        assert!(!FrameBudget::Finite(3).is_exhausted(2));
        assert!(FrameBudget::Finite(3).is_exhausted(3));
        assert!(!FrameBudget::Unbounded.is_exhausted(u64::MAX));
    }
}
