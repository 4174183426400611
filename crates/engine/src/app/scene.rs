use tracing::{info, warn};

use crate::ecs::{release_flagged_damage, DamageRecord, Pool, World};
use crate::map::MapChangeHandle;
use crate::render::Camera2D;

use super::input::InputSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SceneCommand {
    #[default]
    None,
    Quit,
}

/// Everything a scene may touch during `load`, `update` and `unload`.
pub struct SceneContext<'a> {
    pub world: &'a mut World,
    pub damage_pool: &'a mut Pool<DamageRecord>,
    pub camera: &'a mut Camera2D,
    pub map_change: &'a MapChangeHandle,
}

pub trait Scene {
    fn load(&mut self, ctx: &mut SceneContext<'_>);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        ctx: &mut SceneContext<'_>,
    ) -> SceneCommand;
    fn unload(&mut self, ctx: &mut SceneContext<'_>);
    fn debug_title(&self, _world: &World) -> Option<String> {
        None
    }
}

/// Owns the active scene together with its world and damage pool.
pub(crate) struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: World,
    damage_pool: Pool<DamageRecord>,
    is_loaded: bool,
}

impl SceneRuntime {
    pub(crate) fn new(scene: Box<dyn Scene>, damage_pool_capacity: usize) -> Self {
        Self {
            scene,
            world: World::default(),
            damage_pool: Pool::with_capacity(damage_pool_capacity),
            is_loaded: false,
        }
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub(crate) fn damage_pool(&self) -> &Pool<DamageRecord> {
        &self.damage_pool
    }

    pub(crate) fn load(&mut self, camera: &mut Camera2D, map_change: &MapChangeHandle) {
        if self.is_loaded {
            return;
        }
        let mut ctx = SceneContext {
            world: &mut self.world,
            damage_pool: &mut self.damage_pool,
            camera,
            map_change,
        };
        self.scene.load(&mut ctx);
        self.is_loaded = true;
        self.apply_pending();
        info!(entity_count = self.world.entity_count(), "scene_loaded");
    }

    pub(crate) fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        camera: &mut Camera2D,
        map_change: &MapChangeHandle,
    ) -> SceneCommand {
        self.world.store_previous_positions();
        let mut ctx = SceneContext {
            world: &mut self.world,
            damage_pool: &mut self.damage_pool,
            camera,
            map_change,
        };
        let command = self.scene.update(fixed_dt_seconds, input, &mut ctx);
        self.apply_pending();
        command
    }

    pub(crate) fn unload(&mut self, camera: &mut Camera2D, map_change: &MapChangeHandle) {
        if !self.is_loaded {
            return;
        }
        let mut ctx = SceneContext {
            world: &mut self.world,
            damage_pool: &mut self.damage_pool,
            camera,
            map_change,
        };
        self.scene.unload(&mut ctx);
        let removed = self.world.clear();
        self.release_removed(removed);
        self.is_loaded = false;
        if self.damage_pool.checked_out_count() > 0 {
            warn!(
                checked_out = self.damage_pool.checked_out_count(),
                "damage_records_leaked_on_unload"
            );
        }
    }

    pub(crate) fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }

    /// Returns pooled records of flagged entities, then applies spawns and removals.
    pub(crate) fn apply_pending(&mut self) {
        release_flagged_damage(&mut self.world, &mut self.damage_pool);
        let removed = self.world.apply_pending();
        self.release_removed(removed);
    }

    fn release_removed(&mut self, removed: Vec<crate::ecs::Entity>) {
        for entity in removed {
            let Some(handle) = entity.damage else {
                continue;
            };
            if let Err(error) = self.damage_pool.release(handle) {
                warn!(entity = entity.id.0, error = %error, "damage_record_release_failed");
            }
        }
    }
}
