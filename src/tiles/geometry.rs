//! Tile geometry: the closed set of shapes a tile can take and the bounding
//! boxes derived from them.
//!
//! Coordinates are screen-style (y grows down). Every shape stands on the
//! bottom edge of its tile cell and grows upward, so a tall shape reaches
//! into the rows above its own position.

use super::types::TileId;
use bevy::math::{IVec2, Rect};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Which side of a ramp is raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// High on the left, low on the right
    RisingLeft,
    /// Low on the left, high on the right
    RisingRight,
}

/// Ramp height as a multiple of the tile unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Elevation {
    Half,
    Single,
    Double,
    Triple,
}

impl Elevation {
    pub const ALL: [Elevation; 4] = [
        Elevation::Half,
        Elevation::Single,
        Elevation::Double,
        Elevation::Triple,
    ];

    pub const fn factor(self) -> f32 {
        match self {
            Elevation::Half => 0.5,
            Elevation::Single => 1.0,
            Elevation::Double => 2.0,
            Elevation::Triple => 3.0,
        }
    }
}

/// Per-pixel-column heights sampled from a bitmap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightProfile {
    columns: Vec<u32>,
    orientation: Orientation,
}

impl HeightProfile {
    /// Build a profile from raw column heights; the low side is inferred.
    pub fn new(columns: Vec<u32>) -> Self {
        let orientation = match (columns.first(), columns.last()) {
            (Some(first), Some(last)) if first > last => Orientation::RisingLeft,
            _ => Orientation::RisingRight,
        };
        Self {
            columns,
            orientation,
        }
    }

    /// Sample a bitmap. Each column's height is the run of solid (non
    /// transparent) pixels counted up from the bottom row, stopping at the
    /// first empty pixel.
    pub fn from_image(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let columns = (0..width)
            .map(|x| {
                (0..height)
                    .rev()
                    .take_while(|&y| image.get_pixel(x, y)[3] > 0)
                    .count() as u32
            })
            .collect();
        Self::new(columns)
    }

    pub fn columns(&self) -> &[u32] {
        &self.columns
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.columns.len() as u32
    }

    /// Tallest column in pixels
    pub fn max_height(&self) -> u32 {
        self.columns.iter().copied().max().unwrap_or(0)
    }

    /// Height of the column under a pixel offset, clamped to the profile
    pub fn height_at(&self, x: u32) -> u32 {
        if self.columns.is_empty() {
            return 0;
        }
        let index = (x as usize).min(self.columns.len() - 1);
        self.columns[index]
    }
}

/// Discriminant of a [`Shape`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Flat,
    Ramp,
    CustomRamp,
}

/// Geometry carried by a tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Flat,
    Ramp {
        orientation: Orientation,
        elevation: Elevation,
    },
    CustomRamp(HeightProfile),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Flat => ShapeKind::Flat,
            Shape::Ramp { .. } => ShapeKind::Ramp,
            Shape::CustomRamp(_) => ShapeKind::CustomRamp,
        }
    }

    /// Bounding box size in pixels
    pub fn size(&self, tile_size: f32) -> (f32, f32) {
        match self {
            Shape::Flat => (tile_size, tile_size),
            Shape::Ramp { elevation, .. } => (tile_size, tile_size * elevation.factor()),
            Shape::CustomRamp(profile) => (profile.width() as f32, profile.max_height() as f32),
        }
    }

    /// Height of the walkable surface above the bottom edge, `local_x` pixels
    /// from the left edge of the bounding box
    pub fn surface_height(&self, local_x: f32, tile_size: f32) -> f32 {
        match self {
            Shape::Flat => tile_size,
            Shape::Ramp {
                orientation,
                elevation,
            } => {
                let t = (local_x / tile_size).clamp(0.0, 1.0);
                let rise = match orientation {
                    Orientation::RisingRight => t,
                    Orientation::RisingLeft => 1.0 - t,
                };
                rise * tile_size * elevation.factor()
            }
            Shape::CustomRamp(profile) => profile.height_at(local_x.max(0.0) as u32) as f32,
        }
    }
}

/// A placed piece of terrain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Tile coordinate of the bottom-left cell
    pub pos: IVec2,
    pub kind: TileId,
    /// Sprite variant, chosen by autotiling for flat tiles
    pub variant: u8,
    pub shape: Shape,
}

impl Tile {
    pub fn flat(pos: IVec2, kind: TileId) -> Self {
        Self {
            pos,
            kind,
            variant: 0,
            shape: Shape::Flat,
        }
    }

    pub fn ramp(pos: IVec2, kind: TileId, orientation: Orientation, elevation: Elevation) -> Self {
        Self {
            pos,
            kind,
            variant: 0,
            shape: Shape::Ramp {
                orientation,
                elevation,
            },
        }
    }

    pub fn custom_ramp(pos: IVec2, kind: TileId, profile: HeightProfile) -> Self {
        Self {
            pos,
            kind,
            variant: 0,
            shape: Shape::CustomRamp(profile),
        }
    }

    pub fn shape_kind(&self) -> ShapeKind {
        self.shape.kind()
    }

    /// Inclusive range of tile cells the bounding box touches
    pub fn covered_cells(&self, tile_size: u32) -> (IVec2, IVec2) {
        let unit = tile_size as f32;
        let (width, height) = self.shape.size(unit);
        let cols = ((width / unit).ceil() as i32).max(1);
        let rows = ((height / unit).ceil() as i32).max(1);
        (
            IVec2::new(self.pos.x, self.pos.y - rows + 1),
            IVec2::new(self.pos.x + cols - 1, self.pos.y),
        )
    }
}

/// Axis-aligned bounding rectangle of a tile in world pixels.
///
/// Shared by physics queries and debug drawing; both must go through here.
pub fn tile_rect(tile: &Tile, tile_size: u32) -> Rect {
    let unit = tile_size as f32;
    let (width, height) = tile.shape.size(unit);
    let left = tile.pos.x as f32 * unit;
    let bottom = (tile.pos.y + 1) as f32 * unit;
    Rect::new(left, bottom - height, left + width, bottom)
}
