//! Neighbor-driven variant selection.
//!
//! A tile looks at its four cardinal neighbors, records which of them are
//! the same kind as itself in a 4-bit mask and picks the sprite variant
//! registered for that mask.
//!
//! ```text
//!        UP (1)
//! LEFT (8)  X  RIGHT (2)
//!       DOWN (4)
//! ```

use super::constants::AUTOTILE_KINDS;
use super::types::TileId;
use bevy::math::IVec2;
use std::collections::{HashMap, HashSet};

pub const MASK_UP: u8 = 1;
pub const MASK_RIGHT: u8 = 2;
pub const MASK_DOWN: u8 = 4;
pub const MASK_LEFT: u8 = 8;

/// Neighbor offsets paired with their mask bit (y grows down)
const CARDINALS: [(IVec2, u8); 4] = [
    (IVec2::new(0, -1), MASK_UP),
    (IVec2::new(1, 0), MASK_RIGHT),
    (IVec2::new(0, 1), MASK_DOWN),
    (IVec2::new(-1, 0), MASK_LEFT),
];

/// Connectivity patterns of the standard terrain sheet and their variants
pub const STANDARD_PATTERNS: [(u8, u8); 10] = [
    (0, 0),                                     // isolated
    (MASK_RIGHT | MASK_DOWN | MASK_LEFT, 1),    // open top
    (MASK_UP | MASK_RIGHT | MASK_DOWN, 2),      // open left
    (MASK_UP | MASK_DOWN | MASK_LEFT, 3),       // open right
    (MASK_LEFT | MASK_RIGHT, 4),                // open top and bottom
    (MASK_RIGHT | MASK_DOWN, 5),                // top-left corner
    (MASK_DOWN | MASK_LEFT, 6),                 // top-right corner
    (MASK_UP | MASK_RIGHT, 7),                  // bottom-left corner
    (MASK_UP | MASK_LEFT, 8),                   // bottom-right corner
    (MASK_UP | MASK_RIGHT | MASK_DOWN | MASK_LEFT, 9), // enclosed
];

/// Immutable autotile configuration
#[derive(Debug, Clone, Default)]
pub struct AutotileRules {
    tileable: HashSet<TileId>,
    patterns: HashMap<u8, u8>,
}

impl AutotileRules {
    pub fn new(
        tileable: impl IntoIterator<Item = TileId>,
        patterns: impl IntoIterator<Item = (u8, u8)>,
    ) -> Self {
        Self {
            tileable: tileable.into_iter().collect(),
            patterns: patterns.into_iter().collect(),
        }
    }

    /// Rules for the built-in terrain kinds and sheet layout
    pub fn standard() -> Self {
        Self::new(AUTOTILE_KINDS, STANDARD_PATTERNS)
    }

    pub fn is_tileable(&self, kind: TileId) -> bool {
        self.tileable.contains(&kind)
    }

    /// Variant registered for a mask, if any
    pub fn variant_for(&self, mask: u8) -> Option<u8> {
        self.patterns.get(&mask).copied()
    }

    /// Pick a variant for a tile of `kind` at `pos`.
    ///
    /// `lookup` returns the kind of the tile at a position. `None` means the
    /// kind is not autotiled or the mask has no pattern; either way the
    /// current variant should be kept.
    pub fn resolve<F>(&self, kind: TileId, pos: IVec2, lookup: F) -> Option<u8>
    where
        F: Fn(IVec2) -> Option<TileId>,
    {
        if !self.is_tileable(kind) {
            return None;
        }
        self.variant_for(neighbor_mask(pos, kind, lookup))
    }
}

/// Bitmask of cardinal neighbors that share `kind`
pub fn neighbor_mask<F>(pos: IVec2, kind: TileId, lookup: F) -> u8
where
    F: Fn(IVec2) -> Option<TileId>,
{
    CARDINALS
        .iter()
        .filter(|(offset, _)| lookup(pos + *offset) == Some(kind))
        .fold(0, |mask, (_, bit)| mask | bit)
}

/// The four cardinal neighbors of a position
pub fn cardinal_neighbors(pos: IVec2) -> [IVec2; 4] {
    CARDINALS.map(|(offset, _)| pos + offset)
}
