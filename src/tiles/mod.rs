pub mod autotile;
pub mod chunk;
pub mod constants;
pub mod geometry;
pub mod registry;
pub mod types;

// Re-export commonly used items
pub use autotile::AutotileRules;
pub use chunk::{Chunk, ChunkData, ChunkRender, GhostSpill};
pub use constants::*;
pub use geometry::{tile_rect, Elevation, HeightProfile, Orientation, Shape, ShapeKind, Tile};
pub use registry::TileRegistry;
pub use types::{ChunkPos, TileId};
