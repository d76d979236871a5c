/// Size of each chunk in tiles (width and height)
pub const CHUNK_SIZE: u32 = 8;

/// Pixel size of one tile unit
pub const TILE_SIZE: u32 = 16;

/// How close (in tiles) a query must be to a chunk edge before the
/// neighboring chunk is searched as well
pub const PROXIMITY_RADIUS: i32 = 2;

// Tile type constants
/// Grass topped soil
pub const TILE_GRASS: u16 = 1;

/// Dirt
pub const TILE_DIRT: u16 = 2;

/// Stone
pub const TILE_STONE: u16 = 3;

/// Wooden planks (not autotiled)
pub const TILE_PLANK: u16 = 4;

/// Tile kinds that pick their variant from their neighbors
pub const AUTOTILE_KINDS: [u16; 3] = [TILE_GRASS, TILE_DIRT, TILE_STONE];

/// Offsets of the 8 neighbors of a chunk: 4 directions then 4 corners
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),  // top
    (1, 0),   // right
    (0, 1),   // bottom
    (-1, 0),  // left
    (-1, -1), // top-left
    (1, -1),  // top-right
    (1, 1),   // bottom-right
    (-1, 1),  // bottom-left
];
