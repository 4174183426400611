use crate::ecs::{ImageHandle, Rect};
use crate::map::{TileLayer, TiledMap};

use super::camera::ViewProjection;
use super::surface::{BlendFunction, DrawSurface};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Begin,
    End,
    SetProjection(ViewProjection),
    SetBlend(BlendFunction),
    Image {
        image: ImageHandle,
        bounds: Rect,
        projection: ViewProjection,
    },
    TileLayer {
        name: String,
        projection: ViewProjection,
        animation_time_ms: u64,
    },
    FillRect {
        bounds: Rect,
        color: [u8; 4],
        blend: BlendFunction,
    },
    StrokeRect {
        bounds: Rect,
        color: [u8; 4],
    },
}

/// Headless surface that records every call. Draw calls issued outside a session are
/// counted instead of recorded.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
    projection: ViewProjection,
    blend: BlendFunction,
    in_session: bool,
    draws_outside_session: usize,
}

impl RecordingSurface {
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn in_session(&self) -> bool {
        self.in_session
    }

    pub fn draws_outside_session(&self) -> usize {
        self.draws_outside_session
    }

    pub fn blend(&self) -> BlendFunction {
        self.blend
    }

    pub fn tile_layer_draws(&self) -> Vec<(String, ViewProjection)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::TileLayer {
                    name, projection, ..
                } => Some((name.clone(), *projection)),
                _ => None,
            })
            .collect()
    }

    pub fn image_draws(&self) -> Vec<(ImageHandle, Rect)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Image { image, bounds, .. } => Some((*image, *bounds)),
                _ => None,
            })
            .collect()
    }

    fn record_draw(&mut self, command: DrawCommand) {
        if self.in_session {
            self.commands.push(command);
        } else {
            self.draws_outside_session += 1;
        }
    }
}

impl DrawSurface for RecordingSurface {
    fn begin(&mut self) {
        self.in_session = true;
        self.commands.push(DrawCommand::Begin);
    }

    fn end(&mut self) {
        self.in_session = false;
        self.commands.push(DrawCommand::End);
    }

    fn set_projection(&mut self, projection: ViewProjection) {
        self.projection = projection;
        self.commands.push(DrawCommand::SetProjection(projection));
    }

    fn projection(&self) -> ViewProjection {
        self.projection
    }

    fn set_blend_function(&mut self, blend: BlendFunction) {
        self.blend = blend;
        self.commands.push(DrawCommand::SetBlend(blend));
    }

    fn draw_image(&mut self, image: ImageHandle, bounds: Rect) {
        let projection = self.projection;
        self.record_draw(DrawCommand::Image {
            image,
            bounds,
            projection,
        });
    }

    fn draw_tile_layer(&mut self, _map: &TiledMap, layer: &TileLayer, animation_time_ms: u64) {
        let projection = self.projection;
        self.record_draw(DrawCommand::TileLayer {
            name: layer.name().to_string(),
            projection,
            animation_time_ms,
        });
    }

    fn fill_rect(&mut self, bounds: Rect, color: [u8; 4]) {
        let blend = self.blend;
        self.record_draw(DrawCommand::FillRect {
            bounds,
            color,
            blend,
        });
    }

    fn stroke_rect(&mut self, bounds: Rect, color: [u8; 4]) {
        self.record_draw(DrawCommand::StrokeRect { bounds, color });
    }
}
