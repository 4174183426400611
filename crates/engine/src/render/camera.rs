use crate::ecs::Vec2;

/// Orthographic world-to-NDC transform. NDC spans `-1..=1` on both axes with y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewProjection {
    pub scale_x: f32,
    pub scale_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl Default for ViewProjection {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
        }
    }
}

impl ViewProjection {
    pub fn orthographic(center: Vec2, width: f32, height: f32) -> Self {
        let scale_x = 2.0 / width.max(f32::EPSILON);
        let scale_y = 2.0 / height.max(f32::EPSILON);
        Self {
            scale_x,
            scale_y,
            translate_x: -center.x * scale_x,
            translate_y: -center.y * scale_y,
        }
    }

    pub fn project(&self, world: Vec2) -> Vec2 {
        Vec2 {
            x: world.x * self.scale_x + self.translate_x,
            y: world.y * self.scale_y + self.translate_y,
        }
    }

    pub fn unproject(&self, ndc: Vec2) -> Vec2 {
        Vec2 {
            x: (ndc.x - self.translate_x) / self.scale_x,
            y: (ndc.y - self.translate_y) / self.scale_y,
        }
    }
}

/// Side-scroller camera. `viewport_width`/`viewport_height` are in world units; `combined`
/// is only refreshed by `update`, so a moved camera must be updated before drawing with it.
#[derive(Debug, Clone, Copy)]
pub struct Camera2D {
    pub position: Vec2,
    pub viewport_width: f32,
    pub viewport_height: f32,
    combined: ViewProjection,
}

impl Camera2D {
    pub fn new(viewport_width: f32, viewport_height: f32) -> Self {
        let mut camera = Self {
            position: Vec2::new(viewport_width * 0.5, viewport_height * 0.5),
            viewport_width,
            viewport_height,
            combined: ViewProjection::default(),
        };
        camera.update();
        camera
    }

    pub fn update(&mut self) {
        self.combined =
            ViewProjection::orthographic(self.position, self.viewport_width, self.viewport_height);
    }

    pub fn combined(&self) -> ViewProjection {
        self.combined
    }

    /// Centers the camera on `target` without showing anything left of or below the world
    /// origin.
    pub fn follow(&mut self, target: Vec2, world_width: f32) {
        let half_w = self.viewport_width * 0.5;
        let half_h = self.viewport_height * 0.5;
        let max_x = (world_width - half_w).max(half_w);
        self.position.x = target.x.clamp(half_w, max_x);
        self.position.y = target.y.max(half_h);
    }
}

impl Default for Camera2D {
    fn default() -> Self {
        Self::new(16.0, 9.0)
    }
}
