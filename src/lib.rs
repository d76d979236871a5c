//! Chunked storage for variable-height 2D terrain.
//!
//! Tiles (flat squares, ramps and bitmap-sampled custom ramps) live in a
//! [`world::TileMap`] split into fixed-size chunks. Shapes taller than one
//! tile are mirrored as ghost tiles into the chunks they reach, each chunk
//! keeps a rasterized cache of itself, and [`collision::sat`] resolves
//! overlaps between rotated rectangles.

pub mod collision;
pub mod tiles;
pub mod world;
