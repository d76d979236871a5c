use bevy::{input::mouse::MouseWheel, prelude::*, window::PrimaryWindow};

use slopemap::collision::{intersect, tile_obb, OrientedRect};
use slopemap::tiles::{chunk::coords, tile_rect};
use slopemap::world::{demo_registry, generate_demo_map, loader, TileMap, TileMapConfig};

// Camera zoom configuration
const ZOOM_MIN: f32 = 0.25; // Max zoom in (smaller = more zoomed in)
const ZOOM_MAX: f32 = 3.0; // Max zoom out (larger = more zoomed out)
const ZOOM_SPEED: f32 = 0.1; // Zoom change per input

const SAVE_DIRECTORY: &str = "saves/world";
const AUTOSAVE_SECS: f32 = 30.0;

/// Half size of the collision probe that follows the cursor, in pixels
const PROBE_HALF_EXTENTS: Vec2 = Vec2::new(10.0, 18.0);
/// Probe rotation speed in degrees per second
const PROBE_SPIN: f32 = 45.0;

fn main() {
    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(ImagePlugin::default_nearest()))
        .insert_resource(loader::SaveSettings::new(SAVE_DIRECTORY, AUTOSAVE_SECS))
        .add_systems(Startup, (setup_camera, setup_map))
        .add_systems(
            Update,
            (
                move_camera,
                zoom_camera,
                save_on_key,
                draw_collision_probe,
                loader::sync_chunk_sprites,
                loader::autosave_dirty_chunks,
                loader::log_map_stats,
            ),
        );

    #[cfg(feature = "debug_chunks")]
    app.add_systems(Update, draw_chunk_borders);

    app.run();
}

fn setup_camera(mut commands: Commands) {
    commands.spawn((Camera2d, Transform::from_xyz(0.0, 48.0, 999.0)));
}

/// Load the saved map, or generate demo terrain when there is none
fn setup_map(mut commands: Commands, settings: Res<loader::SaveSettings>) {
    let config = TileMapConfig::default();
    let registry = demo_registry(&config);

    let map = match TileMap::deserialize(&settings.directory, config, &registry) {
        Ok((map, report)) if !report.loaded.is_empty() => {
            info!(
                "Loaded map from {:?} ({} chunks failed)",
                settings.directory,
                report.failed.len()
            );
            map
        }
        Ok(_) => {
            info!("No saved chunks in {:?}, using demo terrain", settings.directory);
            generate_demo_map(config, &registry, -48..48)
        }
        Err(e) => {
            info!("No saved map at {:?} ({}), using demo terrain", settings.directory, e);
            generate_demo_map(config, &registry, -48..48)
        }
    };

    commands.insert_resource(map);
    commands.insert_resource(registry);
}

/// Cursor position in map space (pixels, y growing downward)
fn cursor_map_position(
    windows: &Query<&Window, With<PrimaryWindow>>,
    cameras: &Query<(&Camera, &GlobalTransform), With<Camera2d>>,
) -> Option<Vec2> {
    let window = windows.single().ok()?;
    let (camera, camera_transform) = cameras.single().ok()?;
    let cursor = window.cursor_position()?;
    let world = camera.viewport_to_world_2d(camera_transform, cursor).ok()?;
    Some(Vec2::new(world.x, -world.y))
}

/// Flip a map space point into bevy world space
fn to_world(point: Vec2) -> Vec2 {
    Vec2::new(point.x, -point.y)
}

/// F5 writes the whole map to disk
fn save_on_key(
    keyboard: Res<ButtonInput<KeyCode>>,
    settings: Res<loader::SaveSettings>,
    mut map: ResMut<TileMap>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }
    match map.serialize(&settings.directory) {
        Ok(saved) => info!("Saved {} chunks to {:?}", saved, settings.directory),
        Err(e) => error!("Failed to save map: {}", e),
    }
}

/// Spin a probe rectangle under the cursor and test it against the nearby
/// tiles
fn draw_collision_probe(
    time: Res<Time>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<Camera2d>>,
    map: Res<TileMap>,
    mut gizmos: Gizmos,
) {
    let Some(cursor) = cursor_map_position(&windows, &cameras) else {
        return;
    };
    let tile_size = map.config().tile_size;
    let probe = OrientedRect::new(cursor, PROBE_HALF_EXTENTS, time.elapsed_secs() * PROBE_SPIN);

    let footprint = (PROBE_HALF_EXTENTS * 2.0 / tile_size as f32).ceil().as_uvec2();
    let origin = coords::world_to_tile(cursor - PROBE_HALF_EXTENTS, tile_size);

    let mut push = Vec2::ZERO;
    for tile in map.get_around(origin, footprint) {
        let result = intersect(&probe, &tile_obb(tile, tile_size));
        let rect = tile_rect(tile, tile_size);
        let color = if result.intersects {
            push += result.resolution();
            Color::srgb(0.9, 0.3, 0.2)
        } else {
            Color::srgb(0.5, 0.5, 0.5)
        };
        gizmos.rect_2d(
            Isometry2d::from_translation(to_world(rect.center())),
            rect.size(),
            color,
        );
    }

    let corners = probe.corners();
    let color = if push == Vec2::ZERO {
        Color::srgb(0.3, 0.9, 0.4)
    } else {
        Color::srgb(0.9, 0.3, 0.2)
    };
    gizmos.linestrip_2d(
        corners.iter().chain(corners.first()).map(|&corner| to_world(corner)),
        color,
    );
    if push != Vec2::ZERO {
        gizmos.arrow_2d(to_world(cursor), to_world(cursor + push), Color::WHITE);
    }
}

#[cfg(feature = "debug_chunks")]
fn draw_chunk_borders(map: Res<TileMap>, mut gizmos: Gizmos) {
    let size = map.config().chunk_pixel_size();
    for chunk in map.chunks() {
        let top_left = chunk.position.to_world(size);
        let center = top_left + Vec2::splat(size / 2.0);
        let color = if chunk.has_ghosts() {
            Color::srgb(0.9, 0.6, 0.1)
        } else {
            Color::srgb(0.2, 0.4, 0.9)
        };
        gizmos.rect_2d(Isometry2d::from_translation(to_world(center)), Vec2::splat(size), color);
    }
}

/// Camera movement system
fn move_camera(
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut camera_query: Query<&mut Transform, With<Camera2d>>,
) {
    if let Ok(mut transform) = camera_query.single_mut() {
        let speed = 200.0; // pixels per second
        let delta = time.delta_secs();

        if keyboard.pressed(KeyCode::KeyW) || keyboard.pressed(KeyCode::ArrowUp) {
            transform.translation.y += speed * delta;
        }
        if keyboard.pressed(KeyCode::KeyS) || keyboard.pressed(KeyCode::ArrowDown) {
            transform.translation.y -= speed * delta;
        }
        if keyboard.pressed(KeyCode::KeyA) || keyboard.pressed(KeyCode::ArrowLeft) {
            transform.translation.x -= speed * delta;
        }
        if keyboard.pressed(KeyCode::KeyD) || keyboard.pressed(KeyCode::ArrowRight) {
            transform.translation.x += speed * delta;
        }
    }
}

/// Camera zoom system - supports scroll wheel and keyboard (- and = keys)
fn zoom_camera(
    mut scroll_events: MessageReader<MouseWheel>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut camera_query: Query<&mut Projection, With<Camera2d>>,
) {
    if let Ok(mut projection) = camera_query.single_mut() {
        let mut zoom_delta = 0.0;

        for event in scroll_events.read() {
            zoom_delta -= event.y * ZOOM_SPEED;
        }

        if keyboard.just_pressed(KeyCode::Minus) {
            zoom_delta += ZOOM_SPEED;
        }
        if keyboard.just_pressed(KeyCode::Equal) {
            zoom_delta -= ZOOM_SPEED;
        }

        if zoom_delta != 0.0 {
            if let Projection::Orthographic(ref mut ortho) = projection.as_mut() {
                ortho.scale = (ortho.scale + zoom_delta).clamp(ZOOM_MIN, ZOOM_MAX);
            }
        }
    }
}
