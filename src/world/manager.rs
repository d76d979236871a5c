use super::serialization::{self, TileMapError};
use crate::tiles::autotile::{self, AutotileRules};
use crate::tiles::chunk::spill_cells;
use crate::tiles::{
    Chunk, ChunkData, ChunkPos, GhostSpill, Shape, Tile, TileRegistry, CHUNK_SIZE, PROXIMITY_RADIUS,
    TILE_SIZE,
};
use bevy::log::{debug, info, warn};
use bevy::math::{IVec2, UVec2};
use bevy::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Tile map configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileMapConfig {
    /// Chunk width and height in tiles
    pub chunk_size: u32,
    /// Pixel size of one tile unit
    pub tile_size: u32,
    /// Distance in tiles from a chunk edge within which `get_around` also
    /// searches the neighbor across that edge
    pub proximity_radius: i32,
}

impl TileMapConfig {
    pub fn chunk_pixel_size(&self) -> f32 {
        (self.chunk_size * self.tile_size) as f32
    }
}

impl Default for TileMapConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            tile_size: TILE_SIZE,
            proximity_radius: PROXIMITY_RADIUS,
        }
    }
}

/// Chunked tile storage. Owns every chunk and the running tile count.
#[derive(Resource, Debug, Clone, Default)]
pub struct TileMap {
    config: TileMapConfig,
    chunks: HashMap<ChunkPos, Chunk>,
    tile_count: usize,
    /// Chunks whose owned tiles changed since the last save
    dirty_chunks: HashSet<ChunkPos>,
}

impl TileMap {
    pub fn new(config: TileMapConfig) -> Self {
        Self {
            config,
            chunks: HashMap::new(),
            tile_count: 0,
            dirty_chunks: HashSet::new(),
        }
    }

    pub fn config(&self) -> &TileMapConfig {
        &self.config
    }

    fn chunk_size_i32(&self) -> i32 {
        self.config.chunk_size as i32
    }

    /// Chunk that owns a tile position
    pub fn chunk_pos_of(&self, pos: IVec2) -> ChunkPos {
        ChunkPos::from_tile(pos, self.chunk_size_i32())
    }

    /// Place a tile, replacing whatever was at its position.
    ///
    /// Creates the owning chunk if needed and registers ghosts in every
    /// neighbor chunk the tile reaches into. Returns the replaced tile.
    pub fn add(&mut self, tile: Tile) -> Option<Tile> {
        let chunk_pos = self.chunk_pos_of(tile.pos);
        let (chunk_size, tile_size) = (self.config.chunk_size, self.config.tile_size);
        let ghost = tile.clone();

        let chunk = self
            .chunks
            .entry(chunk_pos)
            .or_insert_with(|| Chunk::new(chunk_pos, chunk_size));
        let (replaced, spills) = chunk.add(tile, tile_size);
        self.dirty_chunks.insert(chunk_pos);

        match &replaced {
            Some(old) => self.retract_ghosts(chunk_pos, old),
            None => self.tile_count += 1,
        }
        self.propagate_ghosts(&ghost, &spills);
        replaced
    }

    /// Remove the tile at a position. Missing positions are a no-op.
    ///
    /// The tile's ghosts are withdrawn from its neighbors. The owning chunk
    /// is dropped once it owns nothing, unless it still holds ghosts of a
    /// neighbor's tiles.
    pub fn remove(&mut self, pos: IVec2) -> Option<Tile> {
        let chunk_pos = self.chunk_pos_of(pos);
        let local = ChunkPos::local_of(pos, self.chunk_size_i32());
        let chunk = self.chunks.get_mut(&chunk_pos)?;
        let removed = chunk.remove(local)?;
        let emptied = chunk.is_empty() && !chunk.has_ghosts();

        self.tile_count -= 1;
        self.dirty_chunks.insert(chunk_pos);
        self.retract_ghosts(chunk_pos, &removed);
        if emptied {
            self.chunks.remove(&chunk_pos);
            debug!("Dropped empty chunk {:?}", chunk_pos);
        }
        Some(removed)
    }

    fn propagate_ghosts(&mut self, tile: &Tile, spills: &[GhostSpill]) {
        let chunk_size = self.config.chunk_size;
        for spill in spills {
            self.chunks
                .entry(spill.chunk)
                .or_insert_with(|| Chunk::new(spill.chunk, chunk_size))
                .add_ghost(spill.local, tile.clone());
        }
    }

    fn retract_ghosts(&mut self, owner_chunk: ChunkPos, tile: &Tile) {
        let spills = spill_cells(owner_chunk, self.config.chunk_size, tile, self.config.tile_size);
        for spill in spills {
            let Some(neighbor) = self.chunks.get_mut(&spill.chunk) else {
                continue;
            };
            neighbor.remove_ghost(spill.local, tile.pos);
            // Chunks that only ever held ghosts go away with their last ghost
            if neighbor.is_empty() && !neighbor.has_ghosts() {
                self.chunks.remove(&spill.chunk);
            }
        }
    }

    pub fn get_tile(&self, pos: IVec2) -> Option<&Tile> {
        let chunk = self.chunks.get(&self.chunk_pos_of(pos))?;
        chunk.tile(ChunkPos::local_of(pos, self.chunk_size_i32()))
    }

    pub fn chunk(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of owned tiles across all chunks
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    /// Owned and ghost tiles near a region of `size` tiles whose top-left
    /// cell is `pos`.
    ///
    /// Only neighbor chunks whose shared edge is within the configured
    /// proximity radius of the region are searched. Each tile appears once
    /// even when it is seen both as owner and as ghost.
    pub fn get_around(&self, pos: IVec2, size: UVec2) -> Vec<&Tile> {
        let chunk_size = self.chunk_size_i32();
        let radius = self.config.proximity_radius;
        let home = self.chunk_pos_of(pos);
        let local = pos - home.origin_tile(chunk_size);
        let far = local + size.as_ivec2() - IVec2::ONE;

        let mut dxs = vec![0];
        if local.x < radius {
            dxs.push(-1);
        }
        if far.x >= chunk_size - radius {
            dxs.push(1);
        }
        let mut dys = vec![0];
        if local.y < radius {
            dys.push(-1);
        }
        if far.y >= chunk_size - radius {
            dys.push(1);
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for &dy in &dys {
            for &dx in &dxs {
                let Some(chunk) = home
                    .checked_offset(dx, dy)
                    .and_then(|p| self.chunks.get(&p))
                else {
                    continue;
                };
                for tile in chunk.get_around(pos, size, self.config.tile_size) {
                    if seen.insert(tile.pos) {
                        found.push(tile);
                    }
                }
            }
        }
        found
    }

    /// Re-select the autotile variant of the tile at `pos` and of its four
    /// neighbors. Call after adding or removing a tile.
    pub fn refresh_autotile(&mut self, pos: IVec2, rules: &AutotileRules) {
        let mut updates = Vec::new();
        for target in std::iter::once(pos).chain(autotile::cardinal_neighbors(pos)) {
            let Some(tile) = self.get_tile(target) else {
                continue;
            };
            if !matches!(tile.shape, Shape::Flat) {
                continue;
            }
            let lookup = |p: IVec2| self.get_tile(p).map(|t| t.kind);
            if let Some(variant) = rules.resolve(tile.kind, target, lookup) {
                if variant != tile.variant {
                    updates.push((target, variant));
                }
            }
        }

        let chunk_size = self.chunk_size_i32();
        for (target, variant) in updates {
            let chunk_pos = ChunkPos::from_tile(target, chunk_size);
            if let Some(tile) = self
                .chunks
                .get_mut(&chunk_pos)
                .and_then(|chunk| chunk.tile_mut(ChunkPos::local_of(target, chunk_size)))
            {
                tile.variant = variant;
                self.dirty_chunks.insert(chunk_pos);
            }
        }
    }

    /// Pre-render every chunk whose cache is stale. Returns the chunks that
    /// were rendered.
    ///
    /// Geometry is measured with the map's tile size; registry sprites are
    /// drawn as they are.
    pub fn pre_render_chunks(&mut self, registry: &TileRegistry) -> Vec<ChunkPos> {
        if registry.tile_size() != self.config.tile_size {
            warn!(
                "Registry tile size {} differs from map tile size {}",
                registry.tile_size(),
                self.config.tile_size
            );
        }
        let tile_size = self.config.tile_size;
        let mut rendered = Vec::new();
        for chunk in self.chunks.values_mut().filter(|chunk| chunk.needs_render()) {
            chunk.pre_render(registry, tile_size);
            rendered.push(chunk.position);
        }
        rendered
    }

    pub fn dirty_chunks(&self) -> impl Iterator<Item = &ChunkPos> {
        self.dirty_chunks.iter()
    }

    /// Path of a chunk's save file inside a save directory
    pub fn chunk_path(dir: &Path, pos: &ChunkPos) -> PathBuf {
        dir.join(pos.file_name())
    }

    /// Write every chunk that owns tiles and delete chunk files for chunks
    /// that no longer exist
    pub fn serialize(&mut self, dir: &Path) -> Result<usize, TileMapError> {
        fs::create_dir_all(dir)?;

        let mut written = HashSet::new();
        for chunk in self.chunks.values().filter(|chunk| !chunk.is_empty()) {
            serialization::save_chunk(&chunk.to_data(), Self::chunk_path(dir, &chunk.position))?;
            written.insert(chunk.position);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let stale = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(serialization::parse_chunk_file_name)
                .is_some_and(|pos| !written.contains(&pos));
            if stale {
                serialization::delete_chunk(&path)?;
            }
        }

        self.dirty_chunks.clear();
        info!("Saved {} chunks to {:?}", written.len(), dir);
        Ok(written.len())
    }

    /// Write chunks changed since the last save (autosave)
    pub fn save_dirty(&mut self, dir: &Path) -> Result<usize, TileMapError> {
        let mut saved = 0;
        let dirty: Vec<ChunkPos> = self.dirty_chunks.iter().copied().collect();
        for pos in dirty {
            let path = Self::chunk_path(dir, &pos);
            match self.chunks.get(&pos).filter(|chunk| !chunk.is_empty()) {
                Some(chunk) => {
                    serialization::save_chunk(&chunk.to_data(), &path)?;
                    saved += 1;
                }
                None if serialization::chunk_exists(&path) => serialization::delete_chunk(&path)?,
                None => {}
            }
            self.dirty_chunks.remove(&pos);
            debug!("Autosaved chunk {:?}", pos);
        }
        Ok(saved)
    }

    /// Load every chunk file in a directory.
    ///
    /// A chunk that fails to load is skipped and listed in the report; the
    /// rest of the map still loads. Ghosts are rebuilt from the loaded tiles
    /// and every chunk is pre-rendered before returning.
    pub fn deserialize(
        dir: &Path,
        config: TileMapConfig,
        registry: &TileRegistry,
    ) -> Result<(TileMap, LoadReport), TileMapError> {
        let mut map = TileMap::new(config);
        let mut report = LoadReport::default();

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(expected) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(serialization::parse_chunk_file_name)
            else {
                continue;
            };

            match serialization::load_chunk(&path).and_then(|data| map.check_loaded(expected, data)) {
                Ok(data) => {
                    for tile in data.tiles {
                        map.add(tile);
                    }
                    report.loaded.push(expected);
                }
                Err(e) => {
                    warn!("Failed to load chunk {:?}: {}", expected, e);
                    report.failed.push((path, e));
                }
            }
        }

        map.dirty_chunks.clear();
        map.pre_render_chunks(registry);
        info!(
            "Loaded {} chunks ({} tiles) from {:?}, {} failed",
            report.loaded.len(),
            map.tile_count,
            dir,
            report.failed.len()
        );
        Ok((map, report))
    }

    fn check_loaded(&self, expected: ChunkPos, data: ChunkData) -> Result<ChunkData, TileMapError> {
        if data.size != self.config.chunk_size {
            return Err(TileMapError::InvalidChunkSize(data.size));
        }
        if data.position != expected {
            return Err(TileMapError::ChunkPositionMismatch {
                expected,
                found: data.position,
            });
        }
        Ok(data)
    }
}

/// Outcome of a bulk load
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ChunkPos>,
    pub failed: Vec<(PathBuf, TileMapError)>,
}
