use std::collections::HashSet;

use tracing::{debug, warn};

use super::pool::{Pool, PoolHandle, Poolable};
use super::world::{EntityId, World};

/// A pooled damage effect. Each record hits a given target at most once while it is
/// checked out; the set of targets is only cleared when the record goes back to the pool.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DamageRecord {
    pub damage: f32,
    pub life_span: f32,
    pub source: Option<EntityId>,
    damaged: HashSet<EntityId>,
}

impl DamageRecord {
    pub fn init(&mut self, source: EntityId, damage: f32, life_span: f32) {
        self.source = Some(source);
        self.damage = damage;
        self.life_span = life_span;
    }

    pub fn has_damaged(&self, target: EntityId) -> bool {
        self.damaged.contains(&target)
    }

    /// Records a hit on `target`. Returns `false` when the target was already hit by this
    /// record, in which case nothing changes.
    pub fn try_damage(&mut self, target: EntityId) -> bool {
        self.damaged.insert(target)
    }

    pub fn damaged_targets(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.damaged.iter().copied()
    }

    pub fn damaged_count(&self) -> usize {
        self.damaged.len()
    }

    /// Counts down the remaining life span. Returns `true` once it has run out.
    pub fn tick(&mut self, delta_seconds: f32) -> bool {
        self.life_span -= delta_seconds;
        self.life_span <= 0.0
    }
}

impl Poolable for DamageRecord {
    fn reset(&mut self) {
        self.damage = 0.0;
        self.life_span = 0.0;
        self.source = None;
        self.damaged.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageReport {
    pub hits: u32,
    pub kills: u32,
    pub expired: u32,
}

/// Checks out a record, initialises it and returns the handle to attach to an entity.
pub fn spawn_damage(
    pool: &mut Pool<DamageRecord>,
    source: EntityId,
    damage: f32,
    life_span: f32,
) -> Result<PoolHandle, super::pool::PoolError> {
    let handle = pool.checkout()?;
    if let Some(record) = pool.get_mut(handle) {
        record.init(source, damage, life_span);
    }
    Ok(handle)
}

/// Advances every damage effect by one step: counts down life spans, applies damage once
/// per overlapping target that has health, and flags dead targets and expired effects for
/// removal. Records of expired effects go straight back to the pool.
pub fn run_damage_system(
    world: &mut World,
    pool: &mut Pool<DamageRecord>,
    delta_seconds: f32,
) -> DamageReport {
    let mut report = DamageReport::default();
    let mut to_flag = Vec::new();

    let effects: Vec<(EntityId, PoolHandle)> = world
        .entities()
        .iter()
        .filter(|entity| !entity.is_flagged_for_removal())
        .filter_map(|entity| entity.damage.map(|handle| (entity.id, handle)))
        .collect();

    for (effect_id, handle) in effects {
        // An effect without a spatial hits nothing but still ages out.
        let effect_bounds = world
            .find_entity(effect_id)
            .and_then(|entity| entity.spatial.as_ref())
            .map(|spatial| spatial.bounds());
        let Some(record) = pool.get_mut(handle) else {
            warn!(entity = effect_id.0, "damage_record_handle_stale");
            continue;
        };

        if let Some(effect_bounds) = effect_bounds {
            for target in world.entities_mut() {
                if target.id == effect_id
                    || Some(target.id) == record.source
                    || target.is_flagged_for_removal()
                {
                    continue;
                }
                let (Some(spatial), Some(health)) =
                    (target.spatial.as_ref(), target.health.as_mut())
                else {
                    continue;
                };
                if health.is_dead() || !spatial.bounds().overlaps(&effect_bounds) {
                    continue;
                }
                if !record.try_damage(target.id) {
                    continue;
                }
                health.current -= record.damage;
                report.hits += 1;
                debug!(
                    source = ?record.source.map(|id| id.0),
                    target = target.id.0,
                    damage = record.damage,
                    remaining = health.current,
                    "damage_applied"
                );
                if health.is_dead() {
                    report.kills += 1;
                    to_flag.push(target.id);
                }
            }
        }

        if record.tick(delta_seconds) {
            report.expired += 1;
            to_flag.push(effect_id);
        }
    }

    for id in to_flag {
        world.flag_for_removal(id);
    }
    release_flagged_damage(world, pool);
    report
}

/// Returns the records of every flagged entity to the pool and detaches the handles, so a
/// removed effect can never keep a record checked out.
pub fn release_flagged_damage(world: &mut World, pool: &mut Pool<DamageRecord>) {
    for entity in world.entities_mut() {
        if !entity.is_flagged_for_removal() {
            continue;
        }
        if let Some(handle) = entity.damage.take() {
            if let Err(error) = pool.release(handle) {
                warn!(entity = entity.id.0, error = %error, "damage_record_release_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EntityDesc, HealthComponent, SpatialComponent, Vec2};

    fn spatial_at(x: f32, y: f32) -> Option<SpatialComponent> {
        Some(SpatialComponent::new(Vec2::new(x, y), Vec2::new(1.0, 1.0)))
    }

    #[test]
    fn reset_empties_target_set_regardless_of_contents() {
        let mut record = DamageRecord::default();
        record.init(EntityId(1), 10.0, 1.0);
        for id in 2..20 {
            record.try_damage(EntityId(id));
        }
        record.reset();
        assert_eq!(record.damaged_count(), 0);
        assert_eq!(record.source, None);
        assert_eq!(record.damage, 0.0);
        assert_eq!(record.life_span, 0.0);
    }

    #[test]
    fn repeated_target_is_a_no_op_and_new_target_is_added() {
        let a = EntityId(10);
        let b = EntityId(11);
        let mut record = DamageRecord::default();
        record.init(EntityId(1), 5.0, 1.0);
        assert!(record.try_damage(a));

        assert!(!record.try_damage(a));
        assert_eq!(record.damaged_count(), 1);

        assert!(record.try_damage(b));
        let mut targets: Vec<_> = record.damaged_targets().collect();
        targets.sort();
        assert_eq!(targets, vec![a, b]);
    }

    #[test]
    fn pooled_record_does_not_remember_targets_of_previous_effect() {
        let mut pool = Pool::<DamageRecord>::with_capacity(1);
        let first = spawn_damage(&mut pool, EntityId(1), 5.0, 1.0).expect("spawn");
        pool.get_mut(first).expect("live").try_damage(EntityId(7));
        pool.release(first).expect("release");

        let second = spawn_damage(&mut pool, EntityId(2), 3.0, 1.0).expect("reuse");
        let record = pool.get(second).expect("live");
        assert!(!record.has_damaged(EntityId(7)));
        assert_eq!(record.source, Some(EntityId(2)));
    }

    #[test]
    fn system_hits_each_target_once_over_many_frames() {
        let mut world = World::default();
        let mut pool = Pool::<DamageRecord>::with_capacity(4);
        let attacker = world.spawn(EntityDesc {
            spatial: spatial_at(0.0, 0.0),
            health: Some(HealthComponent::new(100.0)),
            ..EntityDesc::default()
        });
        let target = world.spawn(EntityDesc {
            spatial: spatial_at(0.5, 0.0),
            health: Some(HealthComponent::new(100.0)),
            ..EntityDesc::default()
        });
        let handle = spawn_damage(&mut pool, attacker, 25.0, 1.0).expect("spawn");
        world.spawn(EntityDesc {
            spatial: spatial_at(0.25, 0.0),
            damage: Some(handle),
            ..EntityDesc::default()
        });
        world.apply_pending();

        let mut total = DamageReport::default();
        for _ in 0..5 {
            let report = run_damage_system(&mut world, &mut pool, 0.1);
            total.hits += report.hits;
        }

        assert_eq!(total.hits, 1);
        let health = |id| world.find_entity(id).and_then(|e| e.health).expect("health");
        assert_eq!(health(target).current, 75.0);
        assert_eq!(health(attacker).current, 100.0);
    }

    #[test]
    fn expired_effect_is_flagged_and_record_released() {
        let mut world = World::default();
        let mut pool = Pool::<DamageRecord>::with_capacity(1);
        let handle = spawn_damage(&mut pool, EntityId(99), 1.0, 0.15).expect("spawn");
        let effect = world.spawn(EntityDesc {
            spatial: spatial_at(0.0, 0.0),
            damage: Some(handle),
            ..EntityDesc::default()
        });
        world.apply_pending();

        assert_eq!(run_damage_system(&mut world, &mut pool, 0.1).expired, 0);
        assert_eq!(run_damage_system(&mut world, &mut pool, 0.1).expired, 1);

        let entity = world.find_entity(effect).expect("stored until apply_pending");
        assert!(entity.is_flagged_for_removal());
        assert!(entity.damage.is_none());
        assert_eq!(pool.checked_out_count(), 0);
        assert!(pool.get(handle).is_none());
    }

    #[test]
    fn effect_without_spatial_still_expires() {
        let mut world = World::default();
        let mut pool = Pool::<DamageRecord>::with_capacity(1);
        let handle = spawn_damage(&mut pool, EntityId(99), 1.0, 0.1).expect("spawn");
        let effect = world.spawn(EntityDesc {
            damage: Some(handle),
            ..EntityDesc::default()
        });
        world.apply_pending();

        let report = run_damage_system(&mut world, &mut pool, 0.1);
        assert_eq!(report.expired, 1);
        assert_eq!(report.hits, 0);
        assert!(world.find_entity(effect).expect("effect").is_flagged_for_removal());
        assert_eq!(pool.checked_out_count(), 0);
    }

    #[test]
    fn lethal_hit_flags_target() {
        let mut world = World::default();
        let mut pool = Pool::<DamageRecord>::with_capacity(1);
        let target = world.spawn(EntityDesc {
            spatial: spatial_at(0.0, 0.0),
            health: Some(HealthComponent::new(10.0)),
            ..EntityDesc::default()
        });
        let handle = spawn_damage(&mut pool, EntityId(500), 50.0, 1.0).expect("spawn");
        world.spawn(EntityDesc {
            spatial: spatial_at(0.0, 0.0),
            damage: Some(handle),
            ..EntityDesc::default()
        });
        world.apply_pending();

        let report = run_damage_system(&mut world, &mut pool, 0.016);
        assert_eq!(report.kills, 1);
        assert!(world.find_entity(target).expect("target").is_flagged_for_removal());
    }
}
