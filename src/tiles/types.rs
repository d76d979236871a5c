use bevy::math::{IVec2, UVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Type alias for tile kinds (u16 allows 0-65,535 terrain types)
pub type TileId = u16;

/// Chunk position in chunk coordinates (not world/tile coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Convert from tile position to chunk position
    pub fn from_tile(tile_pos: IVec2, chunk_size: i32) -> Self {
        Self {
            x: tile_pos.x.div_euclid(chunk_size),
            y: tile_pos.y.div_euclid(chunk_size),
        }
    }

    /// Local coordinate of a tile position inside its owning chunk
    pub fn local_of(tile_pos: IVec2, chunk_size: i32) -> UVec2 {
        UVec2::new(
            tile_pos.x.rem_euclid(chunk_size) as u32,
            tile_pos.y.rem_euclid(chunk_size) as u32,
        )
    }

    /// Tile coordinate of this chunk's top-left tile
    pub fn origin_tile(&self, chunk_size: i32) -> IVec2 {
        IVec2::new(self.x * chunk_size, self.y * chunk_size)
    }

    /// Get world position of chunk's top-left corner (in pixels)
    pub fn to_world(&self, chunk_pixel_size: f32) -> Vec2 {
        Vec2::new(
            self.x as f32 * chunk_pixel_size,
            self.y as f32 * chunk_pixel_size,
        )
    }

    /// Neighbor chunk at an offset, `None` if the coordinate would overflow
    pub fn checked_offset(&self, dx: i32, dy: i32) -> Option<ChunkPos> {
        Some(ChunkPos::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }

    /// File name used when persisting this chunk
    pub fn file_name(&self) -> String {
        format!("chunk_{}_{}.bin", self.x, self.y)
    }
}
