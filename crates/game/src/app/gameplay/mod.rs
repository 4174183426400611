use std::sync::Arc;

use jumper_engine::ecs::{
    run_damage_system, spawn_damage, EntityDesc, EntityId, HealthComponent, ImageHandle,
    ParticleComponent, Rect, SpatialComponent, Vec2, VisualComponent, World,
};
use jumper_engine::map::{
    MapLayer, MapObject, ObjectLayer, Properties, PropertyValue, TileLayer, TiledMap,
    PROPERTY_PARALLAX_VALUE,
};
use jumper_engine::render::SparkBurst;
use jumper_engine::{InputSnapshot, Scene, SceneCommand, SceneContext};
use tracing::{debug, info, warn};

use super::config::GameConfig;

const GRAVITY_UNITS_PER_SECOND_SQ: f32 = 32.0;
const MAX_FALL_SPEED_UNITS_PER_SECOND: f32 = 20.0;
const COLLISION_EPSILON: f32 = 1e-4;
const PLAYER_SIZE: Vec2 = Vec2::new(0.8, 0.9);
const PLAYER_MAX_HEALTH: f32 = 5.0;
const ENEMY_SIZE: Vec2 = Vec2::new(0.9, 0.9);
const ENEMY_DEFAULT_HEALTH: f32 = 3.0;
const ATTACK_SIZE: Vec2 = Vec2::new(1.0, 0.9);
const ATTACK_SPARK_COUNT: usize = 10;
const ATTACK_SPARK_SPEED: f32 = 4.0;
const ATTACK_SPARK_COLOR: [u8; 3] = [255, 196, 80];
const PLAYER_OBJECT_KIND: &str = "Player";
const ENEMY_OBJECT_KIND: &str = "Enemy";
const ENEMY_HEALTH_PROPERTY: &str = "health";
const SOLID_LAYER_PROPERTY: &str = "solid";
const DEMO_MAP_NAME: &str = "demo";

include!("types.rs");
include!("level.rs");
include!("physics.rs");
include!("scene_impl.rs");

pub(crate) fn build_scene(
    settings: GameplaySettings,
    map: Arc<TiledMap>,
    images: SceneImages,
) -> Box<dyn Scene> {
    Box::new(PlatformerScene::new(settings, map, images))
}
