mod components;
mod damage;
mod pool;
mod world;

pub use components::{
    HealthComponent, ImageHandle, ParticleComponent, SpatialComponent, VisualComponent,
};
pub use damage::{
    release_flagged_damage, run_damage_system, spawn_damage, DamageRecord, DamageReport,
};
pub use pool::{Pool, PoolError, PoolHandle, Poolable};
pub use world::{Entity, EntityDesc, EntityId, EntityIdAllocator, Rect, Vec2, World};
