use crate::ecs::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

pub fn ndc_to_screen(ndc: Vec2, viewport: Viewport) -> (f32, f32) {
    let x = (ndc.x + 1.0) * 0.5 * viewport.width as f32;
    let y = (1.0 - ndc.y) * 0.5 * viewport.height as f32;
    (x, y)
}

pub fn screen_to_ndc(screen_x: f32, screen_y: f32, viewport: Viewport) -> Vec2 {
    let width = (viewport.width as f32).max(1.0);
    let height = (viewport.height as f32).max(1.0);
    Vec2 {
        x: screen_x / width * 2.0 - 1.0,
        y: 1.0 - screen_y / height * 2.0,
    }
}
