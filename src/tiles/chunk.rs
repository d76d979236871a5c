use super::constants::NEIGHBOR_OFFSETS;
use super::geometry::{tile_rect, Elevation, Shape, Tile};
use super::registry::TileRegistry;
use super::types::ChunkPos;
use bevy::math::{IVec2, UVec2, Vec2};
use image::imageops;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

/// A cell of a neighboring chunk that a tile's bounding box reaches into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GhostSpill {
    pub chunk: ChunkPos,
    pub local: UVec2,
}

/// Cached rasterization of a chunk
#[derive(Debug, Clone)]
pub struct ChunkRender {
    pub image: RgbaImage,
    /// Pixels the image extends above the chunk's top edge
    pub offset: u32,
}

impl ChunkRender {
    /// World pixel position of the image's top-left corner
    pub fn placement(&self, position: ChunkPos, chunk_pixel_size: f32) -> Vec2 {
        position.to_world(chunk_pixel_size) - Vec2::new(0.0, self.offset as f32)
    }
}

/// Chunk storage: owned tiles, ghost copies of tall neighbors and the
/// pre-render cache
#[derive(Debug, Clone)]
pub struct Chunk {
    pub position: ChunkPos,
    /// Width and height in tiles
    pub size: u32,
    tiles: HashMap<UVec2, Tile>,
    ghosts: HashMap<UVec2, Vec<Tile>>,
    render: Option<ChunkRender>,
    needs_render: bool,
}

impl Chunk {
    pub fn new(position: ChunkPos, size: u32) -> Self {
        Self {
            position,
            size,
            tiles: HashMap::new(),
            ghosts: HashMap::new(),
            render: None,
            needs_render: true,
        }
    }

    fn size_i32(&self) -> i32 {
        self.size as i32
    }

    /// Store a tile at its local coordinate.
    ///
    /// Returns the tile previously stored there and the neighbor cells the
    /// new tile reaches into. Registering ghosts in those cells is up to the
    /// caller, since the neighbors may not exist yet.
    pub fn add(&mut self, tile: Tile, tile_size: u32) -> (Option<Tile>, Vec<GhostSpill>) {
        let local = ChunkPos::local_of(tile.pos, self.size_i32());
        let spills = self.spills(&tile, tile_size);
        let replaced = self.tiles.insert(local, tile);
        self.needs_render = true;
        (replaced, spills)
    }

    /// Neighbor cells a tile stored in this chunk would reach into
    pub fn spills(&self, tile: &Tile, tile_size: u32) -> Vec<GhostSpill> {
        spill_cells(self.position, self.size, tile, tile_size)
    }

    /// Delete the owned tile at a local coordinate
    pub fn remove(&mut self, local: UVec2) -> Option<Tile> {
        let removed = self.tiles.remove(&local);
        if removed.is_some() {
            self.needs_render = true;
        }
        removed
    }

    /// Register a copy of a tile owned by a neighbor. A ghost from the same
    /// owner at the same cell is replaced.
    pub fn add_ghost(&mut self, local: UVec2, tile: Tile) {
        let cell = self.ghosts.entry(local).or_default();
        match cell.iter_mut().find(|ghost| ghost.pos == tile.pos) {
            Some(existing) => *existing = tile,
            None => cell.push(tile),
        }
        self.needs_render = true;
    }

    /// Drop the ghost of the tile owned at `owner` from a cell
    pub fn remove_ghost(&mut self, local: UVec2, owner: IVec2) -> bool {
        let Some(cell) = self.ghosts.get_mut(&local) else {
            return false;
        };
        let before = cell.len();
        cell.retain(|ghost| ghost.pos != owner);
        let removed = cell.len() != before;
        if cell.is_empty() {
            self.ghosts.remove(&local);
        }
        if removed {
            self.needs_render = true;
        }
        removed
    }

    pub fn tile(&self, local: UVec2) -> Option<&Tile> {
        self.tiles.get(&local)
    }

    /// Mutable access to an owned tile; marks the render cache stale
    pub fn tile_mut(&mut self, local: UVec2) -> Option<&mut Tile> {
        let tile = self.tiles.get_mut(&local)?;
        self.needs_render = true;
        Some(tile)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Ghost tiles with the local cell they were registered at
    pub fn ghosts(&self) -> impl Iterator<Item = (UVec2, &Tile)> {
        self.ghosts
            .iter()
            .flat_map(|(local, cell)| cell.iter().map(move |tile| (*local, tile)))
    }

    pub fn owned_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.values().map(Vec::len).sum()
    }

    /// True when no tile is owned; ghosts do not count
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn has_ghosts(&self) -> bool {
        !self.ghosts.is_empty()
    }

    /// Owned and ghost tiles near a region of `size` tiles whose top-left
    /// cell is `pos`. The region is grown by one tile on every side, so a
    /// single tile query covers its 3x3 neighborhood. A ghost registered in
    /// several cells of the region is returned once.
    pub fn get_around(&self, pos: IVec2, size: UVec2, tile_size: u32) -> Vec<&Tile> {
        let lo = pos - IVec2::ONE;
        let hi = pos + size.as_ivec2();
        let inside = |cell: IVec2| cell.cmpge(lo).all() && cell.cmple(hi).all();

        let mut found: Vec<&Tile> = self
            .tiles
            .values()
            .filter(|tile| {
                let (min, max) = tile.covered_cells(tile_size);
                min.cmple(hi).all() && max.cmpge(lo).all()
            })
            .collect();

        let origin = self.position.origin_tile(self.size_i32());
        let mut owners = HashSet::new();
        for (local, cell) in &self.ghosts {
            if inside(origin + local.as_ivec2()) {
                found.extend(cell.iter().filter(|ghost| owners.insert(ghost.pos)));
            }
        }
        found
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn render(&self) -> Option<&ChunkRender> {
        self.render.as_ref()
    }

    /// Rasterize owned and ghost tiles into the render cache.
    ///
    /// The image is as wide as the chunk and tall enough that no shape rising
    /// above the chunk's top edge gets clipped. Ramps go down first, tallest
    /// first, then flat tiles, then custom ramps on top.
    pub fn pre_render(&mut self, registry: &TileRegistry, tile_size: u32) -> &ChunkRender {
        let unit = tile_size;
        let chunk_px = self.size * unit;
        let origin_px = self.position.origin_tile(self.size_i32()).as_vec2() * unit as f32;

        let drawables: Vec<&Tile> = self
            .tiles
            .values()
            .chain(self.ghosts.values().flatten())
            .collect();

        let offset = drawables
            .iter()
            .map(|tile| (origin_px.y - tile_rect(tile, unit).min.y).ceil().max(0.0) as u32)
            .max()
            .unwrap_or(0);

        let mut ramps: Vec<(&Tile, Elevation)> = Vec::new();
        let mut flats: Vec<&Tile> = Vec::new();
        let mut customs: Vec<&Tile> = Vec::new();
        for tile in drawables {
            match &tile.shape {
                Shape::Flat => flats.push(tile),
                Shape::Ramp { elevation, .. } => ramps.push((tile, *elevation)),
                Shape::CustomRamp(_) => customs.push(tile),
            }
        }
        ramps.sort_by_key(|(tile, elevation)| (Reverse(*elevation), tile.pos.y, tile.pos.x));
        flats.sort_by_key(|tile| (tile.pos.y, tile.pos.x));
        customs.sort_by_key(|tile| (tile.pos.y, tile.pos.x));

        let mut image = RgbaImage::new(chunk_px, chunk_px + offset);
        let ordered = ramps
            .into_iter()
            .map(|(tile, _)| tile)
            .chain(flats)
            .chain(customs);
        for tile in ordered {
            let rect = tile_rect(tile, unit);
            let left = (rect.min.x - origin_px.x).round() as i64;
            let bottom = (rect.max.y - origin_px.y).round() as i64 + offset as i64;
            draw_tile(&mut image, registry, tile, unit, left, bottom);
        }

        self.needs_render = false;
        self.render.insert(ChunkRender { image, offset })
    }

    /// Snapshot of the owned tiles for persistence
    pub fn to_data(&self) -> ChunkData {
        let mut tiles: Vec<Tile> = self.tiles.values().cloned().collect();
        tiles.sort_by_key(|tile| (tile.pos.y, tile.pos.x));
        ChunkData {
            position: self.position,
            size: self.size,
            tiles,
        }
    }
}

/// Edge detection: every cell covered by the tile's bounding box that lies
/// in one of the 8 chunks adjacent to `position`. Cells further away are
/// dropped, as are neighbors whose coordinate would overflow.
pub fn spill_cells(position: ChunkPos, chunk_size: u32, tile: &Tile, tile_size: u32) -> Vec<GhostSpill> {
    let size = chunk_size as i32;
    let origin = position.origin_tile(size);
    let (min, max) = tile.covered_cells(tile_size);

    let mut spills = Vec::new();
    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let local = IVec2::new(x, y) - origin;
            let offset = (local.x.div_euclid(size), local.y.div_euclid(size));
            if offset == (0, 0) || !NEIGHBOR_OFFSETS.contains(&offset) {
                continue;
            }
            let Some(chunk) = position.checked_offset(offset.0, offset.1) else {
                continue;
            };
            spills.push(GhostSpill {
                chunk,
                local: UVec2::new(local.x.rem_euclid(size) as u32, local.y.rem_euclid(size) as u32),
            });
        }
    }
    spills
}

/// Draw one tile with its bottom-left corner at (`left`, `bottom`) in image
/// pixels (`bottom` is exclusive)
fn draw_tile(
    image: &mut RgbaImage,
    registry: &TileRegistry,
    tile: &Tile,
    tile_size: u32,
    left: i64,
    bottom: i64,
) {
    let sprite = match &tile.shape {
        Shape::Flat => registry.sprite(tile.kind, tile.variant),
        Shape::Ramp {
            orientation,
            elevation,
        } => registry.ramp_sprite(tile.kind, *orientation, *elevation),
        Shape::CustomRamp(_) => registry.custom_ramp_sprite(tile.kind),
    };

    if let Some(sprite) = sprite {
        imageops::overlay(image, sprite, left, bottom - sprite.height() as i64);
        return;
    }

    // No sprite: fill the area under the surface
    let unit = tile_size as f32;
    let color = registry.fallback_color(tile.kind);
    let (width, _) = tile.shape.size(unit);
    for column in 0..width.round() as i64 {
        let height = tile.shape.surface_height(column as f32 + 0.5, unit).round() as i64;
        let x = left + column;
        if x < 0 || x >= image.width() as i64 {
            continue;
        }
        for y in (bottom - height).max(0)..bottom.min(image.height() as i64) {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

/// Persisted form of a chunk: owned tiles only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkData {
    pub position: ChunkPos,
    pub size: u32,
    pub tiles: Vec<Tile>,
}

/// Helper functions for coordinate conversions
pub mod coords {
    use super::*;

    /// Convert world position (pixels) to tile position
    pub fn world_to_tile(world_pos: Vec2, tile_size: u32) -> IVec2 {
        (world_pos / tile_size as f32).floor().as_ivec2()
    }

    /// Convert tile position to chunk position
    pub fn tile_to_chunk(tile_pos: IVec2, chunk_size: u32) -> ChunkPos {
        ChunkPos::from_tile(tile_pos, chunk_size as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::constants::{TILE_DIRT, TILE_GRASS, TILE_STONE};
    use crate::tiles::geometry::{HeightProfile, Orientation};
    use image::Rgba;

    const UNIT: u32 = 16;

    fn tall_custom(pos: IVec2, rows: u32) -> Tile {
        Tile::custom_ramp(pos, TILE_STONE, HeightProfile::new(vec![UNIT * rows; UNIT as usize]))
    }

    #[test]
    fn test_tall_tile_spills_into_chunk_above() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0), 8);
        let (replaced, spills) = chunk.add(tall_custom(IVec2::new(3, 0), 3), UNIT);

        assert!(replaced.is_none());
        assert_eq!(spills.len(), 2);
        assert!(spills.iter().all(|s| s.chunk == ChunkPos::new(0, -1)));
        assert!(spills.contains(&GhostSpill { chunk: ChunkPos::new(0, -1), local: UVec2::new(3, 7) }));
        assert!(spills.contains(&GhostSpill { chunk: ChunkPos::new(0, -1), local: UVec2::new(3, 6) }));
    }

    #[test]
    fn test_tile_inside_chunk_does_not_spill() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0), 8);
        let (_, spills) = chunk.add(tall_custom(IVec2::new(3, 5), 3), UNIT);
        assert!(spills.is_empty());

        let (_, spills) = chunk.add(Tile::flat(IVec2::new(0, 0), TILE_GRASS), UNIT);
        assert!(spills.is_empty());
    }

    #[test]
    fn test_wide_tile_spills_into_corner() {
        let chunk = Chunk::new(ChunkPos::new(2, 2), 8);
        let tile = Tile::custom_ramp(IVec2::new(23, 16), TILE_STONE, HeightProfile::new(vec![20; 20]));
        let spills = chunk.spills(&tile, UNIT);

        assert_eq!(spills.len(), 3);
        assert!(spills.contains(&GhostSpill { chunk: ChunkPos::new(2, 1), local: UVec2::new(7, 7) }));
        assert!(spills.contains(&GhostSpill { chunk: ChunkPos::new(3, 2), local: UVec2::new(0, 0) }));
        assert!(spills.contains(&GhostSpill { chunk: ChunkPos::new(3, 1), local: UVec2::new(0, 7) }));
    }

    #[test]
    fn test_spill_beyond_adjacent_chunk_is_skipped() {
        let chunk = Chunk::new(ChunkPos::new(0, 0), 2);
        // Four rows tall from row 0 of a 2-tile chunk: rows -1, -2 are in the
        // chunk above, row -3 would be two chunks away
        let spills = chunk.spills(&tall_custom(IVec2::new(0, 0), 4), UNIT);
        assert_eq!(spills.len(), 2);
        assert!(spills.iter().all(|s| s.chunk == ChunkPos::new(0, -1)));
    }

    #[test]
    fn test_add_replaces_and_remove() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0), 8);
        chunk.add(Tile::flat(IVec2::new(1, 1), TILE_GRASS), UNIT);
        let (replaced, _) = chunk.add(Tile::flat(IVec2::new(1, 1), TILE_DIRT), UNIT);

        assert_eq!(replaced.map(|t| t.kind), Some(TILE_GRASS));
        assert_eq!(chunk.owned_count(), 1);
        assert_eq!(chunk.remove(UVec2::new(1, 1)).map(|t| t.kind), Some(TILE_DIRT));
        assert!(chunk.remove(UVec2::new(1, 1)).is_none());
        assert!(chunk.is_empty());
    }

    #[test]
    fn test_ghosts_do_not_count_as_owned() {
        let mut chunk = Chunk::new(ChunkPos::new(0, -1), 8);
        let owner = tall_custom(IVec2::new(3, 0), 3);
        chunk.add_ghost(UVec2::new(3, 7), owner.clone());
        chunk.add_ghost(UVec2::new(3, 7), owner.clone());

        assert!(chunk.is_empty());
        assert_eq!(chunk.ghost_count(), 1);
        assert!(chunk.to_data().tiles.is_empty());

        assert!(chunk.remove_ghost(UVec2::new(3, 7), owner.pos));
        assert!(!chunk.remove_ghost(UVec2::new(3, 7), owner.pos));
        assert!(!chunk.has_ghosts());
    }

    #[test]
    fn test_get_around_neighborhood() {
        let mut chunk = Chunk::new(ChunkPos::new(0, 0), 8);
        chunk.add(Tile::flat(IVec2::new(2, 2), TILE_GRASS), UNIT);
        chunk.add(Tile::flat(IVec2::new(3, 3), TILE_GRASS), UNIT);
        chunk.add(Tile::flat(IVec2::new(6, 6), TILE_GRASS), UNIT);
        // Stands at row 5 but reaches up to row 3
        chunk.add(tall_custom(IVec2::new(4, 5), 3), UNIT);

        let found = chunk.get_around(IVec2::new(3, 2), UVec2::ONE, UNIT);
        let mut positions: Vec<IVec2> = found.iter().map(|t| t.pos).collect();
        positions.sort_by_key(|p| (p.y, p.x));
        assert_eq!(positions, vec![IVec2::new(2, 2), IVec2::new(3, 3), IVec2::new(4, 5)]);

        // Larger footprint reaches the far tile
        let found = chunk.get_around(IVec2::new(3, 2), UVec2::new(4, 4), UNIT);
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_get_around_includes_ghosts() {
        let mut chunk = Chunk::new(ChunkPos::new(0, -1), 8);
        chunk.add_ghost(UVec2::new(3, 7), tall_custom(IVec2::new(3, 0), 3));

        assert_eq!(chunk.get_around(IVec2::new(3, -2), UVec2::ONE, UNIT).len(), 1);
        assert!(chunk.get_around(IVec2::new(0, -6), UVec2::ONE, UNIT).is_empty());
    }

    #[test]
    fn test_get_around_returns_multi_cell_ghost_once() {
        let mut chunk = Chunk::new(ChunkPos::new(0, -1), 8);
        let owner = tall_custom(IVec2::new(3, 0), 3);
        chunk.add_ghost(UVec2::new(3, 7), owner.clone());
        chunk.add_ghost(UVec2::new(3, 6), owner.clone());

        let found = chunk.get_around(IVec2::new(3, -2), UVec2::ONE, UNIT);
        assert_eq!(found, vec![&owner]);
    }

    #[test]
    fn test_pre_render_offset_fits_tall_shapes() {
        let registry = TileRegistry::default();
        let mut chunk = Chunk::new(ChunkPos::new(0, 0), 8);
        chunk.add(Tile::flat(IVec2::new(0, 4), TILE_DIRT), UNIT);
        assert!(chunk.needs_render());

        let render = chunk.pre_render(&registry, UNIT);
        assert_eq!(render.offset, 0);
        assert_eq!(render.image.dimensions(), (8 * UNIT, 8 * UNIT));
        assert!(!chunk.needs_render());

        chunk.add(Tile::ramp(IVec2::new(1, 0), TILE_DIRT, Orientation::RisingRight, Elevation::Triple), UNIT);
        chunk.add(Tile::ramp(IVec2::new(2, 0), TILE_DIRT, Orientation::RisingLeft, Elevation::Double), UNIT);
        assert!(chunk.needs_render());
        let render = chunk.pre_render(&registry, UNIT);
        assert_eq!(render.offset, 2 * UNIT);
        assert_eq!(render.image.height(), 8 * UNIT + 2 * UNIT);
    }

    #[test]
    fn test_pre_render_fallback_fill() {
        let registry = TileRegistry::default();
        let mut chunk = Chunk::new(ChunkPos::new(0, 0), 8);
        chunk.add(Tile::flat(IVec2::new(1, 1), TILE_GRASS), UNIT);
        chunk.add(Tile::ramp(IVec2::new(2, 1), TILE_DIRT, Orientation::RisingRight, Elevation::Single), UNIT);
        let render = chunk.pre_render(&registry, UNIT);

        let grass = registry.fallback_color(TILE_GRASS);
        let dirt = registry.fallback_color(TILE_DIRT);
        assert_eq!(*render.image.get_pixel(UNIT + 1, UNIT + 1), grass);
        // Ramp rising right: bottom-right corner filled, top-left corner empty
        assert_eq!(*render.image.get_pixel(3 * UNIT - 1, 2 * UNIT - 1), dirt);
        assert_eq!(render.image.get_pixel(2 * UNIT, UNIT)[3], 0);
    }

    #[test]
    fn test_pre_render_uses_registered_sprite() {
        let mut registry = TileRegistry::default();
        let red = Rgba([255, 0, 0, 255]);
        registry.register_sprite(TILE_GRASS, 3, RgbaImage::from_pixel(UNIT, UNIT, red));

        let mut chunk = Chunk::new(ChunkPos::new(0, 0), 8);
        let mut tile = Tile::flat(IVec2::new(0, 0), TILE_GRASS);
        tile.variant = 3;
        chunk.add(tile, UNIT);
        let render = chunk.pre_render(&registry, UNIT);
        assert_eq!(*render.image.get_pixel(5, 5), red);
    }

    #[test]
    fn test_render_placement() {
        let render = ChunkRender { image: RgbaImage::new(1, 1), offset: 32 };
        let placed = render.placement(ChunkPos::new(1, 2), 128.0);
        assert_eq!(placed, Vec2::new(128.0, 224.0));
    }

    #[test]
    fn test_world_to_tile() {
        assert_eq!(coords::world_to_tile(Vec2::new(17.0, -1.0), UNIT), IVec2::new(1, -1));
        assert_eq!(coords::tile_to_chunk(IVec2::new(-1, 9), 8), ChunkPos::new(-1, 1));
    }
}
