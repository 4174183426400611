use crate::ecs::World;

use super::camera::ViewProjection;
use super::surface::{DrawSession, DrawSurface};

/// Overlay drawn after the frame's draw session has closed. Implementations open their own
/// session if they draw through the surface.
pub trait PhysicsDebugRenderer {
    fn render(&mut self, world: &World, surface: &mut dyn DrawSurface, combined: ViewProjection);
}

/// Overlay that draws nothing.
#[derive(Debug, Default)]
pub struct NoDebugRenderer;

impl PhysicsDebugRenderer for NoDebugRenderer {
    fn render(&mut self, _world: &World, _surface: &mut dyn DrawSurface, _combined: ViewProjection) {}
}

const BOUNDS_COLOR: [u8; 4] = [64, 255, 96, 255];
const FLAGGED_COLOR: [u8; 4] = [255, 64, 64, 255];

/// Wireframe of every spatial body. Entities flagged for removal are drawn in a separate
/// color so lingering bodies are easy to spot.
#[derive(Debug, Default)]
pub struct BoundsDebugRenderer {
    pub enabled: bool,
}

impl BoundsDebugRenderer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl PhysicsDebugRenderer for BoundsDebugRenderer {
    fn render(&mut self, world: &World, surface: &mut dyn DrawSurface, combined: ViewProjection) {
        if !self.enabled {
            return;
        }
        surface.set_projection(combined);
        let mut session = DrawSession::begin(surface);
        for entity in world.entities() {
            let Some(spatial) = entity.spatial.as_ref() else {
                continue;
            };
            let color = if entity.is_flagged_for_removal() {
                FLAGGED_COLOR
            } else {
                BOUNDS_COLOR
            };
            session.surface().stroke_rect(spatial.bounds(), color);
        }
    }
}
