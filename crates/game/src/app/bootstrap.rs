use std::path::Path;
use std::sync::Arc;

use jumper_engine::ecs::ImageHandle;
use jumper_engine::map::{load_map_file, TiledMap};
use jumper_engine::render::ImageStore;
use jumper_engine::{resolve_app_paths, AppPaths, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::config::{config_path, load_game_config, ConfigError, GameConfig};
use super::gameplay::{self, GameplaySettings, SceneImages};

const PLAYER_IMAGE_KEY: &str = "player";
const ENEMY_IMAGE_KEY: &str = "enemy";
const PLACEHOLDER_IMAGE_SIZE: u32 = 16;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
    pub(crate) images: ImageStore,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Paths(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Jumper Startup ===");

    let paths = resolve_app_paths()?;
    let game_config = load_game_config(&config_path(&paths.root))?;
    let map = load_start_map(&paths, game_config.start_map.as_deref());

    let mut images = ImageStore::default();
    let scene_images = load_scene_images(&mut images, &paths.sprites_dir);
    info!(
        images = images.len(),
        map = %map.name,
        "assets_ready"
    );

    let scene = gameplay::build_scene(
        GameplaySettings::from_config(&game_config),
        map,
        scene_images,
    );

    Ok(AppWiring {
        config: loop_config(&game_config),
        scene,
        images,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn loop_config(game_config: &GameConfig) -> LoopConfig {
    LoopConfig {
        window_width: game_config.window_width,
        window_height: game_config.window_height,
        target_tps: game_config.target_tps,
        damage_pool_capacity: game_config.damage_pool_capacity,
        show_physics_debug: game_config.show_physics_debug,
        ..LoopConfig::default()
    }
}

/// Falls back to the built-in demo level when no map is configured or it fails to load.
fn load_start_map(paths: &AppPaths, start_map: Option<&str>) -> Arc<TiledMap> {
    let Some(file_name) = start_map else {
        info!("start_map_not_configured_using_demo");
        return Arc::new(gameplay::demo_map());
    };
    let path = paths.maps_dir.join(file_name);
    match load_map_file(&path) {
        Ok(map) => {
            info!(
                map = %map.name,
                width = map.width,
                height = map.height,
                layers = map.layers.len(),
                "start_map_loaded"
            );
            Arc::new(map)
        }
        Err(error) => {
            warn!(error = %error, "start_map_load_failed_using_demo");
            Arc::new(gameplay::demo_map())
        }
    }
}

fn load_scene_images(images: &mut ImageStore, sprites_dir: &Path) -> SceneImages {
    SceneImages {
        player: load_or_placeholder(images, sprites_dir, PLAYER_IMAGE_KEY, [70, 140, 230, 255]),
        enemy: load_or_placeholder(images, sprites_dir, ENEMY_IMAGE_KEY, [210, 70, 70, 255]),
    }
}

/// A missing sprite is replaced with a flat colored square under the same key.
fn load_or_placeholder(
    images: &mut ImageStore,
    sprites_dir: &Path,
    key: &str,
    color: [u8; 4],
) -> Option<ImageHandle> {
    if let Some(handle) = images.load_png_or_warn(sprites_dir, key) {
        return Some(handle);
    }
    let pixel_count = (PLACEHOLDER_IMAGE_SIZE * PLACEHOLDER_IMAGE_SIZE) as usize;
    let rgba = color.repeat(pixel_count);
    match images.insert_rgba(key, PLACEHOLDER_IMAGE_SIZE, PLACEHOLDER_IMAGE_SIZE, rgba) {
        Ok(handle) => Some(handle),
        Err(error) => {
            warn!(image_key = key, error = %error, "placeholder_image_failed");
            None
        }
    }
}
