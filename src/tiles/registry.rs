use super::autotile::AutotileRules;
use super::constants::{TILE_DIRT, TILE_GRASS, TILE_PLANK, TILE_SIZE, TILE_STONE};
use super::geometry::{Elevation, HeightProfile, Orientation};
use super::types::TileId;
use bevy::prelude::Resource;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;

/// Tile registry for sprites and lookup tables.
///
/// Built once at startup and treated as read-only afterwards. Chunk
/// pre-rendering and autotiling take it as a parameter.
#[derive(Resource, Debug, Clone)]
pub struct TileRegistry {
    tile_size: u32,
    sprites: HashMap<(TileId, u8), RgbaImage>,
    ramp_sprites: HashMap<(TileId, Orientation, Elevation), RgbaImage>,
    custom_ramps: HashMap<TileId, RgbaImage>,
    autotile: AutotileRules,
}

impl TileRegistry {
    pub fn new(tile_size: u32, autotile: AutotileRules) -> Self {
        Self {
            tile_size,
            sprites: HashMap::new(),
            ramp_sprites: HashMap::new(),
            custom_ramps: HashMap::new(),
            autotile,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn autotile(&self) -> &AutotileRules {
        &self.autotile
    }

    /// Register the sprite for one variant of a flat tile kind
    pub fn register_sprite(&mut self, kind: TileId, variant: u8, image: RgbaImage) {
        self.sprites.insert((kind, variant), image);
    }

    /// Register a ramp sprite drawn rising to the right.
    ///
    /// Scaled copies for every elevation and mirrored copies for the other
    /// orientation are produced here so drawing never resizes.
    pub fn register_ramp(&mut self, kind: TileId, base: &RgbaImage) {
        for elevation in Elevation::ALL {
            let height = ((self.tile_size as f32 * elevation.factor()).round() as u32).max(1);
            let scaled = imageops::resize(base, self.tile_size, height, FilterType::Nearest);
            let mirrored = imageops::flip_horizontal(&scaled);
            self.ramp_sprites
                .insert((kind, Orientation::RisingRight, elevation), scaled);
            self.ramp_sprites
                .insert((kind, Orientation::RisingLeft, elevation), mirrored);
        }
    }

    /// Register the source bitmap of a custom ramp and return the height
    /// profile sampled from it
    pub fn register_custom_ramp(&mut self, kind: TileId, bitmap: RgbaImage) -> HeightProfile {
        let profile = HeightProfile::from_image(&bitmap);
        self.custom_ramps.insert(kind, bitmap);
        profile
    }

    pub fn sprite(&self, kind: TileId, variant: u8) -> Option<&RgbaImage> {
        self.sprites.get(&(kind, variant))
    }

    pub fn ramp_sprite(
        &self,
        kind: TileId,
        orientation: Orientation,
        elevation: Elevation,
    ) -> Option<&RgbaImage> {
        self.ramp_sprites.get(&(kind, orientation, elevation))
    }

    pub fn custom_ramp_sprite(&self, kind: TileId) -> Option<&RgbaImage> {
        self.custom_ramps.get(&kind)
    }

    /// Height profile of a registered custom ramp bitmap
    pub fn custom_ramp_profile(&self, kind: TileId) -> Option<HeightProfile> {
        self.custom_ramps.get(&kind).map(HeightProfile::from_image)
    }

    /// Flat colour used when a kind has no sprite
    pub fn fallback_color(&self, kind: TileId) -> Rgba<u8> {
        match kind {
            TILE_GRASS => Rgba([86, 160, 62, 255]),
            TILE_DIRT => Rgba([134, 96, 67, 255]),
            TILE_STONE => Rgba([120, 120, 128, 255]),
            TILE_PLANK => Rgba([176, 132, 80, 255]),
            _ => {
                // Spread unknown kinds over the hue circle
                let h = kind.wrapping_mul(97);
                Rgba([(h & 0xff) as u8, ((h >> 3) & 0xff) as u8, ((h >> 6) & 0xff) as u8, 255])
            }
        }
    }
}

impl Default for TileRegistry {
    fn default() -> Self {
        Self::new(TILE_SIZE, AutotileRules::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_sprites_scaled_per_elevation() {
        let mut registry = TileRegistry::default();
        let mut base = RgbaImage::new(16, 16);
        base.put_pixel(15, 0, Rgba([255, 0, 0, 255]));
        registry.register_ramp(7, &base);

        for elevation in Elevation::ALL {
            let sprite = registry
                .ramp_sprite(7, Orientation::RisingRight, elevation)
                .expect("ramp sprite");
            assert_eq!(sprite.width(), 16);
            assert_eq!(sprite.height(), (16.0 * elevation.factor()) as u32);
        }

        // Mirrored copy has the marker pixel on the other side
        let left = registry
            .ramp_sprite(7, Orientation::RisingLeft, Elevation::Single)
            .expect("mirrored sprite");
        assert_eq!(left.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_custom_ramp_registration_returns_profile() {
        let mut registry = TileRegistry::default();
        let mut bitmap = RgbaImage::new(2, 4);
        bitmap.put_pixel(1, 3, Rgba([1, 1, 1, 255]));
        let profile = registry.register_custom_ramp(9, bitmap);
        assert_eq!(profile.columns(), &[0, 1]);
        assert!(registry.custom_ramp_sprite(9).is_some());
        assert_eq!(registry.custom_ramp_profile(9), Some(profile));
        assert_eq!(registry.custom_ramp_profile(10), None);
        assert!(registry.sprite(9, 0).is_none());
    }
}
