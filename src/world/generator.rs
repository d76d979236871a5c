use super::manager::{TileMap, TileMapConfig};
use crate::tiles::{
    AutotileRules, Elevation, Orientation, Tile, TileRegistry, TILE_DIRT, TILE_GRASS, TILE_STONE,
};
use bevy::log::info;
use bevy::math::IVec2;
use image::{Rgba, RgbaImage};
use std::ops::Range;

/// Rows of ground below the surface tile of every column
pub const GROUND_DEPTH: i32 = 3;

/// Columns between boulders on level ground
const BOULDER_SPACING: i32 = 11;

/// Surface height of a column in tile units, measured upward from row 0
fn surface_height(x: i32) -> i32 {
    3 + ((x as f32 * 0.3).sin() * 2.0).round() as i32
}

fn elevation_for(rise: i32) -> Elevation {
    match rise {
        1 => Elevation::Single,
        2 => Elevation::Double,
        _ => Elevation::Triple,
    }
}

const BOULDER_COLOR: Rgba<u8> = Rgba([120, 120, 130, 255]);

/// Bitmap for a two-unit tall boulder that curves up to the right
fn boulder_bitmap(tile_size: u32) -> RgbaImage {
    let height = tile_size * 2;
    let mut image = RgbaImage::new(tile_size, height);
    for x in 0..tile_size {
        let column = (x + 1) * (x + 1) * height / (tile_size * tile_size);
        for y in height - column..height {
            image.put_pixel(x, y, BOULDER_COLOR);
        }
    }
    image
}

/// Registry with the standard autotile rules and the demo terrain bitmaps.
///
/// Build it once at startup and use it both for loading a saved map and for
/// generating a new one, so custom ramps draw the same either way.
pub fn demo_registry(config: &TileMapConfig) -> TileRegistry {
    let mut registry = TileRegistry::new(config.tile_size, AutotileRules::standard());
    registry.register_custom_ramp(TILE_STONE, boulder_bitmap(config.tile_size));
    registry
}

/// Generate a deterministic strip of rolling terrain over `columns`.
///
/// Every column gets a grass surface tile over dirt. Where the next column
/// is higher a ramp climbs to meet it, and level stretches are dotted with
/// boulders when the registry has a stone custom ramp. Flat tiles are
/// autotiled once the strip is complete.
pub fn generate_demo_map(
    config: TileMapConfig,
    registry: &TileRegistry,
    columns: Range<i32>,
) -> TileMap {
    let mut map = TileMap::new(config);
    let boulder = registry.custom_ramp_profile(TILE_STONE);

    let mut placed = Vec::new();
    for x in columns.clone() {
        // y grows downward, so the surface row is negative
        let top = -surface_height(x);
        for y in top..top + GROUND_DEPTH {
            let kind = if y == top { TILE_GRASS } else { TILE_DIRT };
            let pos = IVec2::new(x, y);
            map.add(Tile::flat(pos, kind));
            placed.push(pos);
        }

        let above = IVec2::new(x, top - 1);
        let rise_right = surface_height(x + 1) - surface_height(x);
        let rise_left = surface_height(x - 1) - surface_height(x);
        if rise_right > 0 {
            map.add(Tile::ramp(above, TILE_GRASS, Orientation::RisingRight, elevation_for(rise_right)));
        } else if rise_left > 0 {
            map.add(Tile::ramp(above, TILE_GRASS, Orientation::RisingLeft, elevation_for(rise_left)));
        } else if let Some(boulder) = boulder.as_ref().filter(|_| x.rem_euclid(BOULDER_SPACING) == 0) {
            map.add(Tile::custom_ramp(above, TILE_STONE, boulder.clone()));
        }
    }

    for pos in placed {
        map.refresh_autotile(pos, registry.autotile());
    }

    info!(
        "Generated demo terrain over columns {:?}: {} tiles in {} chunks",
        columns,
        map.tile_count(),
        map.chunk_count()
    );
    map
}
