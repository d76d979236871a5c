use super::manager::TileMap;
use crate::tiles::{ChunkPos, ChunkRender, TileRegistry};
use bevy::asset::RenderAssetUsages;
use bevy::image::ImageSampler;
use bevy::prelude::*;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Marks the sprite entity showing one chunk's pre-rendered image
#[derive(Component, Debug, Clone, Copy)]
pub struct ChunkSprite {
    pub position: ChunkPos,
}

/// Where the map is saved and how often dirty chunks are flushed
#[derive(Resource, Debug)]
pub struct SaveSettings {
    pub directory: PathBuf,
    pub autosave: Timer,
}

impl SaveSettings {
    pub fn new(directory: impl Into<PathBuf>, autosave_secs: f32) -> Self {
        Self {
            directory: directory.into(),
            autosave: Timer::from_seconds(autosave_secs, TimerMode::Repeating),
        }
    }
}

/// Copy a chunk's cached raster into a bevy image
pub fn chunk_image(render: &ChunkRender) -> Image {
    let (width, height) = render.image.dimensions();
    let mut image = Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        render.image.as_raw().clone(),
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
    );
    image.sampler = ImageSampler::nearest();
    image
}

/// Translation of a chunk sprite's center.
///
/// The map is laid out with y growing downward while bevy's y grows
/// upward, so the vertical axis is flipped here.
pub fn chunk_translation(render: &ChunkRender, position: ChunkPos, chunk_pixel_size: f32) -> Vec3 {
    let (width, height) = render.image.dimensions();
    let top_left = render.placement(position, chunk_pixel_size);
    Vec3::new(
        top_left.x + width as f32 / 2.0,
        -(top_left.y + height as f32 / 2.0),
        0.0,
    )
}

/// System to pre-render stale chunks and keep one sprite per chunk in sync.
///
/// Chunks rendered before the first run, such as those pre-rendered on load,
/// get a sprite as soon as the system sees them without one.
pub fn sync_chunk_sprites(
    mut commands: Commands,
    mut map: ResMut<TileMap>,
    registry: Res<TileRegistry>,
    mut images: ResMut<Assets<Image>>,
    mut sprites: Query<(Entity, &ChunkSprite, &mut Sprite, &mut Transform)>,
) {
    let rendered = map.pre_render_chunks(&registry);
    let chunk_pixel_size = map.config().chunk_pixel_size();

    let mut existing: HashMap<ChunkPos, Entity> = HashMap::new();
    for (entity, chunk_sprite, _, _) in sprites.iter() {
        if map.chunk(chunk_sprite.position).is_some() {
            existing.insert(chunk_sprite.position, entity);
        } else {
            commands.entity(entity).despawn();
            debug!("Despawned sprite of removed chunk {:?}", chunk_sprite.position);
        }
    }

    let mut targets: HashSet<ChunkPos> = rendered.into_iter().collect();
    targets.extend(
        map.chunks()
            .filter(|chunk| chunk.render().is_some() && !existing.contains_key(&chunk.position))
            .map(|chunk| chunk.position),
    );

    for position in targets {
        let Some(render) = map.chunk(position).and_then(|chunk| chunk.render()) else {
            continue;
        };
        let handle = images.add(chunk_image(render));
        let translation = chunk_translation(render, position, chunk_pixel_size);

        match existing.get(&position).and_then(|&entity| sprites.get_mut(entity).ok()) {
            Some((_, _, mut sprite, mut transform)) => {
                let old = std::mem::replace(&mut sprite.image, handle);
                images.remove(&old);
                transform.translation = translation;
                debug!("Updated sprite of chunk {:?}", position);
            }
            None => {
                commands.spawn((
                    Sprite::from_image(handle),
                    Transform::from_translation(translation),
                    ChunkSprite { position },
                ));
                debug!("Spawned sprite for chunk {:?}", position);
            }
        }
    }
}

/// System to periodically save dirty chunks (autosave)
pub fn autosave_dirty_chunks(
    time: Res<Time>,
    mut settings: ResMut<SaveSettings>,
    mut map: ResMut<TileMap>,
) {
    if !settings.autosave.tick(time.delta()).just_finished() {
        return;
    }
    if map.dirty_chunks().next().is_none() {
        return;
    }
    match map.save_dirty(&settings.directory) {
        Ok(saved) => info!("Autosaved {} chunks", saved),
        Err(e) => error!("Failed to autosave map: {}", e),
    }
}

/// System to log map statistics for debugging
pub fn log_map_stats(map: Res<TileMap>) {
    if map.is_changed() {
        debug!("Map: {} tiles in {} chunks", map.tile_count(), map.chunk_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiles::{Chunk, Elevation, Orientation, Tile, TILE_DIRT};
    use crate::world::TileMapConfig;
    use bevy::asset::{AssetApp, AssetPlugin};
    use bevy::math::IVec2;

    fn sprite_app(map: TileMap, registry: TileRegistry) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Image>()
            .insert_resource(map)
            .insert_resource(registry)
            .add_systems(Update, sync_chunk_sprites);
        app
    }

    fn sprite_positions(app: &mut App) -> HashSet<ChunkPos> {
        let world = app.world_mut();
        world
            .query::<&ChunkSprite>()
            .iter(world)
            .map(|sprite| sprite.position)
            .collect()
    }

    fn rendered_chunk() -> (Chunk, TileRegistry) {
        let registry = TileRegistry::default();
        let mut chunk = Chunk::new(ChunkPos::new(1, 0), 8);
        chunk.add(
            Tile::ramp(IVec2::new(8, 0), TILE_DIRT, Orientation::RisingRight, Elevation::Double),
            16,
        );
        chunk.pre_render(&registry, 16);
        (chunk, registry)
    }

    #[test]
    fn test_chunk_image_matches_raster() {
        let (chunk, _) = rendered_chunk();
        let render = chunk.render().expect("rendered");
        let image = chunk_image(render);
        assert_eq!(image.width(), 128);
        assert_eq!(image.height(), 128 + 16);
        assert_eq!(image.data.as_deref(), Some(render.image.as_raw().as_slice()));
    }

    #[test]
    fn test_chunk_translation_flips_y() {
        let (chunk, _) = rendered_chunk();
        let render = chunk.render().expect("rendered");
        let translation = chunk_translation(render, chunk.position, 128.0);
        // Top-left sits at (128, -16) in map space; center is half the image below
        assert_eq!(translation, Vec3::new(128.0 + 64.0, -(-16.0 + 72.0), 0.0));
    }

    #[test]
    fn test_loaded_chunks_get_sprites() {
        let config = TileMapConfig::default();
        let registry = TileRegistry::default();
        let dir = tempfile::tempdir().expect("temp dir");
        let mut saved = TileMap::new(config);
        saved.add(Tile::flat(IVec2::new(0, 0), TILE_DIRT));
        saved.add(Tile::flat(IVec2::new(9, 0), TILE_DIRT));
        saved.serialize(dir.path()).unwrap();

        // Loading pre-renders every chunk, so nothing is stale on the first run
        let (mut map, _) = TileMap::deserialize(dir.path(), config, &registry).unwrap();
        assert!(map.pre_render_chunks(&registry).is_empty());

        let mut app = sprite_app(map, registry);
        app.update();
        app.update();

        let expected: HashSet<ChunkPos> = [ChunkPos::new(0, 0), ChunkPos::new(1, 0)].into();
        assert_eq!(sprite_positions(&mut app), expected);
    }

    #[test]
    fn test_removed_chunk_sprite_despawned() {
        let mut map = TileMap::default();
        map.add(Tile::flat(IVec2::new(0, 0), TILE_DIRT));
        map.add(Tile::flat(IVec2::new(9, 0), TILE_DIRT));

        let mut app = sprite_app(map, TileRegistry::default());
        app.update();
        app.update();
        assert_eq!(sprite_positions(&mut app).len(), 2);

        app.world_mut().resource_mut::<TileMap>().remove(IVec2::new(9, 0));
        app.update();
        app.update();
        let expected: HashSet<ChunkPos> = [ChunkPos::new(0, 0)].into();
        assert_eq!(sprite_positions(&mut app), expected);
    }
}
