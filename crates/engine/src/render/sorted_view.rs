use crate::ecs::{EntityId, World};

/// Draw order over drawable entities, stored as indices into `World::entities()`.
///
/// Indices are only valid until the world applies pending spawns or removals, so the view
/// is rebuilt with `force_sort` at the start of every frame.
#[derive(Debug, Default)]
pub struct SortedEntityView {
    order: Vec<usize>,
}

impl SortedEntityView {
    pub fn force_sort(&mut self, world: &World) {
        let entities = world.entities();
        self.order.clear();
        self.order.extend(
            entities
                .iter()
                .enumerate()
                .filter(|(_, entity)| {
                    entity.visual.is_some()
                        && entity.spatial.is_some()
                        && !entity.is_flagged_for_removal()
                })
                .map(|(index, _)| index),
        );
        self.order.sort_by(|&a, &b| {
            let left = &entities[a];
            let right = &entities[b];
            match (&left.spatial, &right.spatial) {
                (Some(l), Some(r)) => l.cmp_draw_order(r),
                _ => std::cmp::Ordering::Equal,
            }
            .then(left.id.cmp(&right.id))
        });
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.order
    }

    pub fn ids(&self, world: &World) -> Vec<EntityId> {
        self.order
            .iter()
            .filter_map(|&index| world.entities().get(index).map(|entity| entity.id))
            .collect()
    }
}
