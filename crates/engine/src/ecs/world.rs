use super::components::{
    HealthComponent, ParticleComponent, SpatialComponent, VisualComponent,
};
use super::pool::PoolHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, other: Vec2, alpha: f32) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * alpha,
            y: self.y + (other.y - self.y) * alpha,
        }
    }
}

/// Axis-aligned rectangle, `position` is the bottom-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Capability slots of an entity. A system only looks at the slots it needs, so an entity
/// is drawable when it has both `spatial` and `visual`, emits particles when it has
/// `particle` and `spatial`, and so on.
#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub debug_name: &'static str,
    pub spatial: Option<SpatialComponent>,
    pub visual: Option<VisualComponent>,
    pub particle: Option<ParticleComponent>,
    pub health: Option<HealthComponent>,
    pub damage: Option<PoolHandle>,
    removal_flagged: bool,
}

impl Entity {
    pub fn is_flagged_for_removal(&self) -> bool {
        self.removal_flagged
    }
}

#[derive(Debug, Default)]
pub struct EntityDesc {
    pub debug_name: &'static str,
    pub spatial: Option<SpatialComponent>,
    pub visual: Option<VisualComponent>,
    pub particle: Option<ParticleComponent>,
    pub health: Option<HealthComponent>,
    pub damage: Option<PoolHandle>,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Entity storage. Spawns and removals are deferred until `apply_pending` so a system that
/// is iterating `entities()` never sees the set change under it.
#[derive(Debug, Default)]
pub struct World {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
}

impl World {
    pub fn spawn(&mut self, desc: EntityDesc) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            debug_name: desc.debug_name,
            spatial: desc.spatial,
            visual: desc.visual,
            particle: desc.particle,
            health: desc.health,
            damage: desc.damage,
            removal_flagged: false,
        });
        id
    }

    /// Marks an entity so that every view skips it from now on. The entity itself stays in
    /// storage until the next `apply_pending`, which lets the owner of pooled components
    /// release them first.
    pub fn flag_for_removal(&mut self, id: EntityId) -> bool {
        if let Some(entity) = self.find_entity_mut(id) {
            entity.removal_flagged = true;
            return true;
        }
        if let Some(entity) = self.pending_spawns.iter_mut().find(|entity| entity.id == id) {
            entity.removal_flagged = true;
            return true;
        }
        false
    }

    /// Drops flagged entities and appends pending spawns. Returns the removed entities so
    /// callers can hand back anything they still own.
    pub fn apply_pending(&mut self) -> Vec<Entity> {
        let mut removed = Vec::new();
        if self.entities.iter().any(Entity::is_flagged_for_removal) {
            let (gone, kept): (Vec<_>, Vec<_>) = self
                .entities
                .drain(..)
                .partition(Entity::is_flagged_for_removal);
            self.entities = kept;
            removed = gone;
        }
        for entity in self.pending_spawns.drain(..) {
            if entity.is_flagged_for_removal() {
                removed.push(entity);
            } else {
                self.entities.push(entity);
            }
        }
        removed
    }

    pub fn clear(&mut self) -> Vec<Entity> {
        let mut removed: Vec<Entity> = self.entities.drain(..).collect();
        removed.append(&mut self.pending_spawns);
        removed
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [Entity] {
        &mut self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn store_previous_positions(&mut self) {
        for spatial in self.entities.iter_mut().filter_map(|e| e.spatial.as_mut()) {
            spatial.previous_position = spatial.position;
        }
    }

    pub fn interpolate(&mut self, alpha: f32) {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0)
        } else {
            1.0
        };
        for spatial in self.entities.iter_mut().filter_map(|e| e.spatial.as_mut()) {
            spatial.interpolated_position = spatial.previous_position.lerp(spatial.position, alpha);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spatial_at(x: f32, y: f32) -> SpatialComponent {
        SpatialComponent::new(Vec2::new(x, y), Vec2::new(1.0, 1.0))
    }

    #[test]
    fn spawn_is_deferred_until_apply_pending() {
        let mut world = World::default();
        let id = world.spawn(EntityDesc {
            debug_name: "player",
            spatial: Some(spatial_at(0.0, 0.0)),
            ..EntityDesc::default()
        });
        assert!(world.find_entity(id).is_none());

        world.apply_pending();
        assert_eq!(world.find_entity(id).map(|e| e.debug_name), Some("player"));
    }

    #[test]
    fn flagged_entities_are_returned_by_apply_pending() {
        let mut world = World::default();
        let keep = world.spawn(EntityDesc::default());
        let drop = world.spawn(EntityDesc::default());
        world.apply_pending();

        assert!(world.flag_for_removal(drop));
        assert!(world.find_entity(drop).expect("still stored").is_flagged_for_removal());

        let removed = world.apply_pending();
        assert_eq!(removed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![drop]);
        assert!(world.find_entity(keep).is_some());
        assert!(world.find_entity(drop).is_none());
    }

    #[test]
    fn flagging_pending_spawn_never_inserts_it() {
        let mut world = World::default();
        let id = world.spawn(EntityDesc::default());
        assert!(world.flag_for_removal(id));
        let removed = world.apply_pending();
        assert_eq!(removed.len(), 1);
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn flagging_unknown_entity_reports_false() {
        let mut world = World::default();
        assert!(!world.flag_for_removal(EntityId(42)));
    }

    #[test]
    fn interpolation_blends_previous_and_current_position() {
        let mut world = World::default();
        let id = world.spawn(EntityDesc {
            spatial: Some(spatial_at(0.0, 0.0)),
            ..EntityDesc::default()
        });
        world.apply_pending();

        world.store_previous_positions();
        world
            .find_entity_mut(id)
            .and_then(|e| e.spatial.as_mut())
            .expect("spatial")
            .position = Vec2::new(4.0, 2.0);
        world.interpolate(0.25);

        let interpolated = world
            .find_entity(id)
            .and_then(|e| e.spatial.as_ref())
            .expect("spatial")
            .interpolated_position;
        assert_eq!(interpolated, Vec2::new(1.0, 0.5));
    }
}
