use std::collections::HashSet;
use std::sync::Arc;

use tracing::error;

use crate::ecs::{EntityId, Rect, Vec2, World};
use crate::map::{MapChangeHandle, MapState, TileAnimationClock, TileLayer, TileLayerCatalog};

use super::camera::Camera2D;
use super::debug::{NoDebugRenderer, PhysicsDebugRenderer};
use super::parallax::draw_with_parallax;
use super::sorted_view::SortedEntityView;
use super::surface::{BlendFunction, DrawSession, DrawSurface};

/// Images are lowered slightly so sprites standing on a tile edge overlap it instead of
/// leaving a seam.
pub const VISUAL_VERTICAL_OFFSET: f32 = 0.01;

/// Counts for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub entities_drawn: u32,
    pub missing_visuals: u32,
    pub particle_effects: u32,
    pub layers_drawn: u32,
    pub parallax_layers: u32,
}

/// Composes map layers, sorted entities and particles into one frame.
///
/// Per frame, in order: pending map swap, tile animation, entity resort, projection, then
/// inside one draw session background layers, entities, particles, blend reset and
/// foreground layers. The physics debug overlay runs after the session closes.
pub struct FrameRenderer {
    camera: Camera2D,
    map_state: MapState,
    map_change: MapChangeHandle,
    sorted_view: SortedEntityView,
    animation_clock: TileAnimationClock,
    debug_renderer: Box<dyn PhysicsDebugRenderer>,
    missing_visual_warned: HashSet<EntityId>,
}

impl FrameRenderer {
    pub fn new(camera: Camera2D) -> Self {
        Self {
            camera,
            map_state: MapState::NoMap,
            map_change: MapChangeHandle::default(),
            sorted_view: SortedEntityView::default(),
            animation_clock: TileAnimationClock::default(),
            debug_renderer: Box::new(NoDebugRenderer),
            missing_visual_warned: HashSet::new(),
        }
    }

    pub fn with_debug_renderer(mut self, debug_renderer: Box<dyn PhysicsDebugRenderer>) -> Self {
        self.debug_renderer = debug_renderer;
        self
    }

    pub fn set_debug_renderer(&mut self, debug_renderer: Box<dyn PhysicsDebugRenderer>) {
        self.debug_renderer = debug_renderer;
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn map_state(&self) -> &MapState {
        &self.map_state
    }

    /// Handle for publishing map changes; clones share the same pending slot.
    pub fn map_change_handle(&self) -> MapChangeHandle {
        self.map_change.clone()
    }

    pub fn animation_time_ms(&self) -> u64 {
        self.animation_clock.base_time_ms()
    }

    pub fn render(
        &mut self,
        delta_seconds: f32,
        world: &mut World,
        surface: &mut dyn DrawSurface,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        self.map_state.apply_pending(&self.map_change);
        self.animation_clock.advance(delta_seconds);
        self.sorted_view.force_sort(world);

        self.camera.update();
        surface.set_projection(self.camera.combined());

        // Cloned so the camera can be borrowed mutably while layers are drawn.
        let catalog = self.map_state.catalog().cloned();
        let animation_ms = self.animation_clock.base_time_ms();
        {
            let mut session = DrawSession::begin(surface);
            if let Some(catalog) = catalog.as_ref() {
                let layers = catalog.background_layers();
                self.draw_layers(catalog, layers, animation_ms, session.surface(), &mut stats);
            }
            self.draw_entities(world, session.surface(), &mut stats);
            draw_particles(world, session.surface(), delta_seconds, &mut stats);
            session.surface().set_blend_function(BlendFunction::ALPHA);
            if let Some(catalog) = catalog.as_ref() {
                let layers = catalog.foreground_layers();
                self.draw_layers(catalog, layers, animation_ms, session.surface(), &mut stats);
            }
        }

        self.debug_renderer
            .render(world, surface, self.camera.combined());
        stats
    }

    fn draw_layers<'c>(
        &mut self,
        catalog: &'c Arc<TileLayerCatalog>,
        layers: impl Iterator<Item = (usize, &'c TileLayer)>,
        animation_ms: u64,
        surface: &mut dyn DrawSurface,
        stats: &mut FrameStats,
    ) {
        let map = catalog.map();
        for (draw_index, layer) in layers {
            let factor = catalog.parallax_for_draw_index(draw_index);
            let shifted = draw_with_parallax(&mut self.camera, surface, factor, |surface| {
                surface.draw_tile_layer(map, layer, animation_ms);
            });
            stats.layers_drawn += 1;
            if shifted {
                stats.parallax_layers += 1;
            }
        }
    }

    fn draw_entities(
        &mut self,
        world: &mut World,
        surface: &mut dyn DrawSurface,
        stats: &mut FrameStats,
    ) {
        let entities = world.entities_mut();
        for &index in self.sorted_view.indices() {
            let Some(entity) = entities.get_mut(index) else {
                continue;
            };
            let (Some(spatial), Some(visual)) = (entity.spatial.as_ref(), entity.visual.as_mut())
            else {
                continue;
            };

            let interpolated = spatial.interpolated_position;
            visual.position = Vec2::new(
                interpolated.x - (visual.width - spatial.size.x) * 0.5,
                interpolated.y - VISUAL_VERTICAL_OFFSET,
            );

            let Some(image) = visual.image else {
                stats.missing_visuals += 1;
                if self.missing_visual_warned.insert(entity.id) {
                    error!(
                        entity = entity.id.0,
                        debug_name = entity.debug_name,
                        "renderer_entity_without_image"
                    );
                }
                continue;
            };

            surface.draw_image(
                image,
                Rect::new(
                    visual.position.x,
                    visual.position.y,
                    visual.width,
                    visual.height,
                ),
            );
            stats.entities_drawn += 1;
        }
    }
}

fn draw_particles(
    world: &mut World,
    surface: &mut dyn DrawSurface,
    delta_seconds: f32,
    stats: &mut FrameStats,
) {
    for entity in world.entities_mut() {
        if entity.is_flagged_for_removal() {
            continue;
        }
        let (Some(spatial), Some(particle)) = (entity.spatial.as_ref(), entity.particle.as_mut())
        else {
            continue;
        };
        if particle.effect.is_finished() {
            continue;
        }
        let origin = Vec2::new(
            spatial.interpolated_position.x + spatial.size.x * 0.5,
            spatial.interpolated_position.y + spatial.size.y * 0.5,
        );
        particle.effect.draw(surface, origin, delta_seconds);
        // Only effects still running after this frame's advance count as drawn.
        if !particle.effect.is_finished() {
            stats.particle_effects += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{
        EntityDesc, ImageHandle, ParticleComponent, SpatialComponent, VisualComponent,
    };
    use crate::map::{MapLayer, PropertyValue, TiledMap, PROPERTY_PARALLAX_VALUE};
    use crate::render::{BoundsDebugRenderer, DrawCommand, RecordingSurface, SparkBurst};

    fn layer(name: &str, parallax: Option<f32>) -> MapLayer {
        let mut layer = TileLayer::new(name, 2, 1, vec![1, 1]).unwrap();
        if let Some(factor) = parallax {
            layer = layer.with_property(PROPERTY_PARALLAX_VALUE, PropertyValue::Float(factor));
        }
        MapLayer::Tile(layer)
    }

    fn test_map() -> Arc<TiledMap> {
        Arc::new(
            TiledMap::new("level", 100, 9)
                .with_layer(layer("background_sky", Some(0.5)))
                .with_layer(layer("ground", None))
                .with_layer(layer("decor", Some(0.25))),
        )
    }

    fn spawn_drawable(world: &mut World, x: f32, y: f32, image: Option<u32>) -> EntityId {
        let visual = match image {
            Some(handle) => VisualComponent::new(ImageHandle(handle), 2.0, 1.0),
            None => VisualComponent::without_image(2.0, 1.0),
        };
        world.spawn(EntityDesc {
            debug_name: "drawable",
            spatial: Some(SpatialComponent::new(Vec2::new(x, y), Vec2::new(1.0, 1.0))),
            visual: Some(visual),
            ..EntityDesc::default()
        })
    }

    fn renderer_with_map() -> FrameRenderer {
        let renderer = FrameRenderer::new(Camera2D::new(16.0, 9.0));
        renderer.map_change_handle().publish(test_map());
        renderer
    }

    fn position_of(commands: &[DrawCommand], predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        commands
            .iter()
            .position(predicate)
            .expect("command should be recorded")
    }

    #[test]
    fn frame_draws_in_pipeline_order() {
        let mut renderer = renderer_with_map();
        let mut world = World::default();
        spawn_drawable(&mut world, 1.0, 2.0, Some(7));
        world.spawn(EntityDesc {
            debug_name: "sparks",
            spatial: Some(SpatialComponent::new(Vec2::new(3.0, 3.0), Vec2::new(1.0, 1.0))),
            particle: Some(ParticleComponent::new(SparkBurst::new(3, 1.0, 1.0, [255, 0, 0]))),
            ..EntityDesc::default()
        });
        world.apply_pending();
        let mut surface = RecordingSurface::default();

        let stats = renderer.render(1.0 / 60.0, &mut world, &mut surface);
        let commands = surface.commands();

        let begin = position_of(commands, |c| *c == DrawCommand::Begin);
        let background = position_of(commands, |c| {
            matches!(c, DrawCommand::TileLayer { name, .. } if name == "background_sky")
        });
        let image = position_of(commands, |c| matches!(c, DrawCommand::Image { .. }));
        let particle = position_of(commands, |c| matches!(c, DrawCommand::FillRect { .. }));
        let blend_reset = position_of(commands, |c| {
            *c == DrawCommand::SetBlend(BlendFunction::ALPHA)
        });
        let foreground = position_of(commands, |c| {
            matches!(c, DrawCommand::TileLayer { name, .. } if name == "ground")
        });
        let end = position_of(commands, |c| *c == DrawCommand::End);

        assert!(begin < background);
        assert!(background < image);
        assert!(image < particle);
        assert!(particle < blend_reset);
        assert!(blend_reset < foreground);
        assert!(foreground < end);
        assert_eq!(
            stats,
            FrameStats {
                entities_drawn: 1,
                missing_visuals: 0,
                particle_effects: 1,
                layers_drawn: 3,
                parallax_layers: 0,
            }
        );
    }

    #[test]
    fn entities_draw_in_sorted_order_at_offset_position() {
        let mut renderer = FrameRenderer::new(Camera2D::new(16.0, 9.0));
        let mut world = World::default();
        spawn_drawable(&mut world, 0.0, 4.0, Some(1));
        let low = spawn_drawable(&mut world, 5.0, 1.0, Some(2));
        world.apply_pending();
        let mut surface = RecordingSurface::default();

        renderer.render(0.0, &mut world, &mut surface);

        let draws = surface.image_draws();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].0, ImageHandle(2));
        assert_eq!(draws[1].0, ImageHandle(1));
        let bounds = draws[0].1;
        assert_eq!(bounds.x, 4.5);
        assert!((bounds.y - (1.0 - VISUAL_VERTICAL_OFFSET)).abs() < 1e-6);
        assert_eq!((bounds.width, bounds.height), (2.0, 1.0));

        let visual = world
            .find_entity(low)
            .and_then(|entity| entity.visual)
            .unwrap();
        assert_eq!(visual.position, Vec2::new(bounds.x, bounds.y));
    }

    #[test]
    fn missing_image_is_skipped_and_later_entities_still_draw() {
        let mut renderer = FrameRenderer::new(Camera2D::new(16.0, 9.0));
        let mut world = World::default();
        spawn_drawable(&mut world, 0.0, 0.0, Some(1));
        spawn_drawable(&mut world, 0.0, 1.0, None);
        spawn_drawable(&mut world, 0.0, 2.0, Some(3));
        world.apply_pending();
        let mut surface = RecordingSurface::default();

        let stats = renderer.render(0.0, &mut world, &mut surface);
        let images: Vec<ImageHandle> = surface
            .image_draws()
            .into_iter()
            .map(|(image, _)| image)
            .collect();
        assert_eq!(images, vec![ImageHandle(1), ImageHandle(3)]);
        assert_eq!(stats.missing_visuals, 1);
        assert_eq!(stats.entities_drawn, 2);

        let again = renderer.render(0.0, &mut world, &mut surface);
        assert_eq!(again.missing_visuals, 1);
    }

    #[test]
    fn parallax_layers_are_shifted_and_camera_is_restored() {
        let mut renderer = renderer_with_map();
        renderer.camera_mut().position = Vec2::new(40.0, 4.5);
        let mut world = World::default();
        let mut surface = RecordingSurface::default();

        let stats = renderer.render(0.0, &mut world, &mut surface);
        let restored = renderer.camera().combined();
        assert_eq!(renderer.camera().position.x, 40.0);
        assert_eq!(surface.projection(), restored);
        assert_eq!(stats.parallax_layers, 2);

        let layers = surface.tile_layer_draws();
        let names: Vec<&str> = layers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["background_sky", "ground", "decor"]);
        assert_ne!(layers[0].1, restored);
        assert_eq!(layers[1].1, restored);
        assert_ne!(layers[2].1, restored);
        assert_ne!(layers[0].1, layers[2].1);
    }

    #[test]
    fn camera_at_start_draws_layers_unshifted() {
        let mut renderer = renderer_with_map();
        let mut world = World::default();
        let mut surface = RecordingSurface::default();

        let stats = renderer.render(0.0, &mut world, &mut surface);
        assert_eq!(stats.parallax_layers, 0);
        let combined = renderer.camera().combined();
        assert!(surface
            .tile_layer_draws()
            .iter()
            .all(|(_, projection)| *projection == combined));
    }

    #[test]
    fn no_map_draws_no_layers() {
        let mut renderer = FrameRenderer::new(Camera2D::default());
        let mut world = World::default();
        let mut surface = RecordingSurface::default();
        let stats = renderer.render(0.0, &mut world, &mut surface);
        assert_eq!(stats.layers_drawn, 0);
        assert!(surface.tile_layer_draws().is_empty());
        assert!(matches!(renderer.map_state(), MapState::NoMap));
    }

    #[test]
    fn map_change_is_picked_up_at_frame_start() {
        let mut renderer = FrameRenderer::new(Camera2D::default());
        let handle = renderer.map_change_handle();
        let mut world = World::default();
        let mut surface = RecordingSurface::default();

        renderer.render(0.0, &mut world, &mut surface);
        assert!(surface.tile_layer_draws().is_empty());

        handle.publish(test_map());
        surface.clear();
        renderer.render(0.0, &mut world, &mut surface);
        assert_eq!(surface.tile_layer_draws().len(), 3);
        assert!(!handle.has_pending());
    }

    #[test]
    fn debug_overlay_runs_after_session_closes() {
        let mut renderer = FrameRenderer::new(Camera2D::new(16.0, 9.0))
            .with_debug_renderer(Box::new(BoundsDebugRenderer::new(true)));
        let mut world = World::default();
        spawn_drawable(&mut world, 2.0, 2.0, Some(1));
        world.apply_pending();
        let mut surface = RecordingSurface::default();

        renderer.render(0.0, &mut world, &mut surface);
        let commands = surface.commands();
        let first_end = position_of(commands, |c| *c == DrawCommand::End);
        let stroke = position_of(commands, |c| matches!(c, DrawCommand::StrokeRect { .. }));
        assert!(first_end < stroke);
        assert_eq!(surface.draws_outside_session(), 0);
    }

    #[test]
    fn flagged_particles_are_not_drawn() {
        let mut renderer = FrameRenderer::new(Camera2D::default());
        let mut world = World::default();
        let sparks = world.spawn(EntityDesc {
            debug_name: "sparks",
            spatial: Some(SpatialComponent::new(Vec2::ZERO, Vec2::new(1.0, 1.0))),
            particle: Some(ParticleComponent::new(SparkBurst::new(2, 1.0, 1.0, [0, 0, 255]))),
            ..EntityDesc::default()
        });
        world.apply_pending();
        world.flag_for_removal(sparks);
        let mut surface = RecordingSurface::default();

        let stats = renderer.render(0.1, &mut world, &mut surface);
        assert_eq!(stats.particle_effects, 0);
    }

    #[test]
    fn finished_particles_are_skipped() {
        let mut renderer = FrameRenderer::new(Camera2D::default());
        let mut world = World::default();
        world.spawn(EntityDesc {
            debug_name: "sparks",
            spatial: Some(SpatialComponent::new(Vec2::ZERO, Vec2::new(1.0, 1.0))),
            particle: Some(ParticleComponent::new(SparkBurst::new(2, 1.0, 0.05, [0, 0, 255]))),
            ..EntityDesc::default()
        });
        world.apply_pending();

        for _ in 0..2 {
            let mut surface = RecordingSurface::default();
            let stats = renderer.render(0.1, &mut world, &mut surface);
            assert_eq!(stats.particle_effects, 0);
            assert!(!surface
                .commands()
                .iter()
                .any(|command| matches!(command, DrawCommand::FillRect { .. })));
        }
    }

    #[test]
    fn animation_clock_advances_with_frames() {
        let mut renderer = renderer_with_map();
        let mut world = World::default();
        let mut surface = RecordingSurface::default();
        renderer.render(0.25, &mut world, &mut surface);
        renderer.render(0.25, &mut world, &mut surface);
        assert_eq!(renderer.animation_time_ms(), 500);
    }
}
