//! # Chunk Window
//!
//! The renderer only keeps chunks within `view_distance` of the camera
//! loaded. This module computes that window from a world position.
//!
//! Chunks are 16 blocks wide and deep; height is irrelevant here.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Chunk width/depth in blocks.
pub const CHUNK_SIZE: i32 = 16;

/// Default number of chunks kept loaded around the camera.
pub const DEFAULT_VIEW_DISTANCE: u32 = 6;

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Z coordinate (in chunks, not blocks).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Converts world block coordinates to chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE),
            z: block_z.div_euclid(CHUNK_SIZE),
        }
    }

    /// Chunk containing a world-space position.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_world(position: Vec3) -> Self {
        Self::from_block_pos(position.x.floor() as i32, position.z.floor() as i32)
    }

    /// Chebyshev distance in chunks.
    #[must_use]
    pub const fn distance(self, other: Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        if dx > dz {
            dx
        } else {
            dz
        }
    }
}

/// Square window of loaded chunks centred on the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkWindow {
    /// Chunk the camera stands in.
    pub center: ChunkCoord,
    /// Radius in chunks.
    pub view_distance: u32,
}

impl ChunkWindow {
    /// Creates a window around `center`.
    #[must_use]
    pub const fn new(center: ChunkCoord, view_distance: u32) -> Self {
        Self {
            center,
            view_distance,
        }
    }

    /// Window around a world position.
    #[must_use]
    pub fn around(position: Vec3, view_distance: u32) -> Self {
        Self::new(ChunkCoord::from_world(position), view_distance)
    }

    /// Returns true if `coord` is inside the window.
    #[must_use]
    pub const fn contains(&self, coord: ChunkCoord) -> bool {
        self.center.distance(coord) <= self.view_distance
    }

    /// Number of chunks in the window.
    #[must_use]
    pub const fn chunk_count(&self) -> usize {
        let side = 2 * self.view_distance as usize + 1;
        side * side
    }

    /// Iterates every coordinate in the window, row by row.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        #[allow(clippy::cast_possible_wrap)]
        let r = self.view_distance as i32;
        let center = self.center;
        (-r..=r).flat_map(move |dz| (-r..=r).map(move |dx| ChunkCoord::new(center.x + dx, center.z + dz)))
    }

    /// Chunks that are in `self` but were not in `previous`.
    #[must_use]
    pub fn entered_since(&self, previous: &Self) -> Vec<ChunkCoord> {
        self.coords().filter(|c| !previous.contains(*c)).collect()
    }
}

impl Default for ChunkWindow {
    fn default() -> Self {
        Self::new(ChunkCoord::default(), DEFAULT_VIEW_DISTANCE)
    }
}
