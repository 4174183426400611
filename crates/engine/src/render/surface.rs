use crate::ecs::{ImageHandle, Rect};
use crate::map::{TileLayer, TiledMap};

use super::camera::ViewProjection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFunction {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendFunction {
    pub const ALPHA: BlendFunction = BlendFunction {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
    pub const ADDITIVE: BlendFunction = BlendFunction {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::One,
    };
}

impl Default for BlendFunction {
    fn default() -> Self {
        Self::ALPHA
    }
}

/// Target of all frame drawing. Rectangles are in world units and go through the current
/// projection. Draw calls are only valid between `begin` and `end`; use [`DrawSession`]
/// rather than calling those two directly.
pub trait DrawSurface {
    fn begin(&mut self);
    fn end(&mut self);
    fn set_projection(&mut self, projection: ViewProjection);
    fn projection(&self) -> ViewProjection;
    fn set_blend_function(&mut self, blend: BlendFunction);
    fn draw_image(&mut self, image: ImageHandle, bounds: Rect);
    fn draw_tile_layer(&mut self, map: &TiledMap, layer: &TileLayer, animation_time_ms: u64);
    fn fill_rect(&mut self, bounds: Rect, color: [u8; 4]);
    fn stroke_rect(&mut self, bounds: Rect, color: [u8; 4]);
}

/// Open draw session; `end` runs when the session is dropped.
pub struct DrawSession<'a> {
    surface: &'a mut dyn DrawSurface,
}

impl<'a> DrawSession<'a> {
    pub fn begin(surface: &'a mut dyn DrawSurface) -> Self {
        surface.begin();
        Self { surface }
    }

    pub fn surface(&mut self) -> &mut dyn DrawSurface {
        &mut *self.surface
    }
}

impl Drop for DrawSession<'_> {
    fn drop(&mut self) {
        self.surface.end();
    }
}
