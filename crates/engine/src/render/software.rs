use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::warn;

use crate::ecs::{ImageHandle, Rect, Vec2};
use crate::image_keys::{validate_image_key, ImageKeyError};
use crate::map::{TileLayer, TiledMap};

use super::camera::ViewProjection;
use super::surface::{BlendFactor, BlendFunction, DrawSurface};
use super::transform::{ndc_to_screen, screen_to_ndc, Viewport};

const TILE_PALETTE: [[u8; 4]; 6] = [
    [74, 112, 56, 255],
    [112, 83, 58, 255],
    [88, 96, 110, 255],
    [58, 86, 128, 255],
    [128, 110, 64, 255],
    [68, 74, 62, 255],
];

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("invalid image key: {0}")]
    InvalidKey(#[from] ImageKeyError),
    #[error("failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("rgba buffer for {width}x{height} image has {actual} bytes")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decoded images addressed by [`ImageHandle`]. A key is loaded at most once; loading it
/// again returns the existing handle.
#[derive(Debug, Default)]
pub struct ImageStore {
    images: Vec<LoadedImage>,
    handles_by_key: HashMap<String, ImageHandle>,
    warned_failed_keys: HashSet<String>,
}

impl ImageStore {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn get(&self, handle: ImageHandle) -> Option<&LoadedImage> {
        self.images.get(handle.0 as usize)
    }

    pub fn handle_for(&self, key: &str) -> Option<ImageHandle> {
        self.handles_by_key.get(key).copied()
    }

    pub fn insert_rgba(
        &mut self,
        key: &str,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> Result<ImageHandle, ImageLoadError> {
        validate_image_key(key)?;
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ImageLoadError::SizeMismatch {
                width,
                height,
                actual: rgba.len(),
            });
        }
        Ok(self.store(key, LoadedImage { width, height, rgba }))
    }

    /// Loads `<images_dir>/<key>.png`.
    pub fn load_png(&mut self, images_dir: &Path, key: &str) -> Result<ImageHandle, ImageLoadError> {
        validate_image_key(key)?;
        if let Some(handle) = self.handle_for(key) {
            return Ok(handle);
        }
        let path = images_dir.join(format!("{key}.png"));
        let reader = ImageReader::open(&path).map_err(|source| ImageLoadError::Open {
            path: path.clone(),
            source,
        })?;
        let decoded = reader
            .decode()
            .map_err(|source| ImageLoadError::Decode {
                path: path.clone(),
                source,
            })?;
        let image = decoded.to_rgba8();
        let loaded = LoadedImage {
            width: image.width(),
            height: image.height(),
            rgba: image.into_raw(),
        };
        Ok(self.store(key, loaded))
    }

    /// Like `load_png`, but a failure is logged once per key and yields `None`, which leaves
    /// the entity without an image.
    pub fn load_png_or_warn(&mut self, images_dir: &Path, key: &str) -> Option<ImageHandle> {
        match self.load_png(images_dir, key) {
            Ok(handle) => Some(handle),
            Err(error) => {
                if self.warned_failed_keys.insert(key.to_string()) {
                    warn!(image_key = key, error = %error, "image_load_failed");
                }
                None
            }
        }
    }

    fn store(&mut self, key: &str, image: LoadedImage) -> ImageHandle {
        if let Some(handle) = self.handle_for(key) {
            self.images[handle.0 as usize] = image;
            return handle;
        }
        let handle = ImageHandle(self.images.len() as u32);
        self.images.push(image);
        self.handles_by_key.insert(key.to_string(), handle);
        handle
    }
}

/// RGBA8 frame buffer implementing [`DrawSurface`] on the CPU.
#[derive(Debug)]
pub struct SoftwareSurface {
    viewport: Viewport,
    frame: Vec<u8>,
    projection: ViewProjection,
    blend: BlendFunction,
    in_session: bool,
    warned_draw_outside_session: bool,
    images: ImageStore,
}

impl SoftwareSurface {
    pub fn new(width: u32, height: u32, images: ImageStore) -> Self {
        Self {
            viewport: Viewport { width, height },
            frame: vec![0; width as usize * height as usize * 4],
            projection: ViewProjection::default(),
            blend: BlendFunction::ALPHA,
            in_session: false,
            warned_draw_outside_session: false,
            images,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport { width, height };
        self.frame = vec![0; width as usize * height as usize * 4];
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.viewport.width || y >= self.viewport.height {
            return None;
        }
        let offset = (y as usize * self.viewport.width as usize + x as usize) * 4;
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(pixel)
    }

    fn drawing_allowed(&mut self) -> bool {
        if self.in_session {
            return true;
        }
        if !self.warned_draw_outside_session {
            self.warned_draw_outside_session = true;
            warn!("software_surface_draw_outside_session_ignored");
        }
        false
    }

    /// Pixel rectangle `[left, right) x [top, bottom)` covered by a world rectangle.
    fn screen_rect(&self, bounds: Rect) -> ScreenRect {
        let (x0, y0) = ndc_to_screen(
            self.projection.project(Vec2::new(bounds.x, bounds.y)),
            self.viewport,
        );
        let (x1, y1) = ndc_to_screen(
            self.projection.project(Vec2::new(
                bounds.x + bounds.width,
                bounds.y + bounds.height,
            )),
            self.viewport,
        );
        ScreenRect {
            left: x0.min(x1).round() as i32,
            right: x0.max(x1).round() as i32,
            top: y0.min(y1).round() as i32,
            bottom: y0.max(y1).round() as i32,
        }
    }

    fn blend_pixel(&mut self, x: i32, y: i32, src: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.viewport.width as i32 || y >= self.viewport.height as i32
        {
            return;
        }
        let offset = (y as usize * self.viewport.width as usize + x as usize) * 4;
        blend_texel(&mut self.frame[offset..offset + 4], src, self.blend);
    }

    fn fill_screen_rect(&mut self, rect: ScreenRect, color: [u8; 4]) {
        let left = rect.left.max(0);
        let top = rect.top.max(0);
        let right = rect.right.min(self.viewport.width as i32);
        let bottom = rect.bottom.min(self.viewport.height as i32);
        for y in top..bottom {
            for x in left..right {
                self.blend_pixel(x, y, color);
            }
        }
    }

    /// World-space tile range visible through the current projection.
    fn visible_world_bounds(&self) -> (Vec2, Vec2) {
        let corner_a = self
            .projection
            .unproject(screen_to_ndc(0.0, 0.0, self.viewport));
        let corner_b = self.projection.unproject(screen_to_ndc(
            self.viewport.width as f32,
            self.viewport.height as f32,
            self.viewport,
        ));
        (
            Vec2::new(corner_a.x.min(corner_b.x), corner_a.y.min(corner_b.y)),
            Vec2::new(corner_a.x.max(corner_b.x), corner_a.y.max(corner_b.y)),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenRect {
    left: i32,
    right: i32,
    top: i32,
    bottom: i32,
}

fn blend_texel(dst: &mut [u8], src: [u8; 4], blend: BlendFunction) {
    let src_alpha = src[3] as f32 / 255.0;
    let src_factor = blend_factor(blend.src, src_alpha);
    let dst_factor = blend_factor(blend.dst, src_alpha);
    for channel in 0..3 {
        let value = src[channel] as f32 * src_factor + dst[channel] as f32 * dst_factor;
        dst[channel] = value.round().clamp(0.0, 255.0) as u8;
    }
    let alpha = src[3] as f32 + dst[3] as f32 * (1.0 - src_alpha);
    dst[3] = alpha.round().clamp(0.0, 255.0) as u8;
}

fn blend_factor(factor: BlendFactor, src_alpha: f32) -> f32 {
    match factor {
        BlendFactor::Zero => 0.0,
        BlendFactor::One => 1.0,
        BlendFactor::SrcAlpha => src_alpha,
        BlendFactor::OneMinusSrcAlpha => 1.0 - src_alpha,
    }
}

fn tile_color(gid: u32) -> [u8; 4] {
    TILE_PALETTE[gid as usize % TILE_PALETTE.len()]
}

impl DrawSurface for SoftwareSurface {
    fn begin(&mut self) {
        if self.in_session {
            warn!("software_surface_begin_while_open");
        }
        self.in_session = true;
    }

    fn end(&mut self) {
        self.in_session = false;
    }

    fn set_projection(&mut self, projection: ViewProjection) {
        self.projection = projection;
    }

    fn projection(&self) -> ViewProjection {
        self.projection
    }

    fn set_blend_function(&mut self, blend: BlendFunction) {
        self.blend = blend;
    }

    fn draw_image(&mut self, image: ImageHandle, bounds: Rect) {
        if !self.drawing_allowed() {
            return;
        }
        let rect = self.screen_rect(bounds);
        let width = rect.right - rect.left;
        let height = rect.bottom - rect.top;
        if width <= 0 || height <= 0 {
            return;
        }
        let Self {
            viewport,
            frame,
            blend,
            images,
            ..
        } = self;
        let Some(source) = images.get(image) else {
            return;
        };
        if source.width == 0 || source.height == 0 {
            return;
        }
        let (src_w, src_h) = (source.width as usize, source.height as usize);
        let rgba = &source.rgba;
        let frame_w = viewport.width as usize;

        let left = rect.left.max(0);
        let top = rect.top.max(0);
        let right = rect.right.min(viewport.width as i32);
        let bottom = rect.bottom.min(viewport.height as i32);
        for y in top..bottom {
            let src_y = ((y - rect.top) as usize * src_h / height as usize).min(src_h - 1);
            for x in left..right {
                let src_x = ((x - rect.left) as usize * src_w / width as usize).min(src_w - 1);
                let offset = (src_y * src_w + src_x) * 4;
                let texel = [rgba[offset], rgba[offset + 1], rgba[offset + 2], rgba[offset + 3]];
                if texel[3] == 0 {
                    continue;
                }
                let target = (y as usize * frame_w + x as usize) * 4;
                blend_texel(&mut frame[target..target + 4], texel, *blend);
            }
        }
    }

    fn draw_tile_layer(&mut self, map: &TiledMap, layer: &TileLayer, animation_time_ms: u64) {
        if !self.drawing_allowed() {
            return;
        }
        let (min, max) = self.visible_world_bounds();
        let x_start = min.x.floor().max(0.0) as u32;
        let x_end = (max.x.ceil().max(0.0) as u32).min(layer.width());
        let y_start = min.y.floor().max(0.0) as u32;
        let y_end = (max.y.ceil().max(0.0) as u32).min(layer.height());

        for world_y in y_start..y_end {
            let row = layer.height() - 1 - world_y;
            for x in x_start..x_end {
                let Some(gid) = layer.tile_at(x, row) else {
                    continue;
                };
                let gid = map.resolve_gid(gid, animation_time_ms);
                let rect = self.screen_rect(Rect::new(x as f32, world_y as f32, 1.0, 1.0));
                self.fill_screen_rect(rect, tile_color(gid));
            }
        }
    }

    fn fill_rect(&mut self, bounds: Rect, color: [u8; 4]) {
        if !self.drawing_allowed() {
            return;
        }
        let rect = self.screen_rect(bounds);
        self.fill_screen_rect(rect, color);
    }

    fn stroke_rect(&mut self, bounds: Rect, color: [u8; 4]) {
        if !self.drawing_allowed() {
            return;
        }
        let rect = self.screen_rect(bounds);
        if rect.right <= rect.left || rect.bottom <= rect.top {
            return;
        }
        for x in rect.left..rect.right {
            self.blend_pixel(x, rect.top, color);
            self.blend_pixel(x, rect.bottom - 1, color);
        }
        for y in rect.top..rect.bottom {
            self.blend_pixel(rect.left, y, color);
            self.blend_pixel(rect.right - 1, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{AnimationFrame, MapLayer, TileAnimation};
    use crate::render::DrawSession;
    use tempfile::TempDir;

    /// 8x8 pixel surface looking at world `0..8 x 0..8`.
    fn surface() -> SoftwareSurface {
        let mut surface = SoftwareSurface::new(8, 8, ImageStore::default());
        surface.set_projection(ViewProjection::orthographic(Vec2::new(4.0, 4.0), 8.0, 8.0));
        surface.clear([0, 0, 0, 255]);
        surface
    }

    #[test]
    fn fill_rect_covers_projected_pixels_with_world_y_up() {
        let mut surface = surface();
        {
            let mut session = DrawSession::begin(&mut surface);
            session
                .surface()
                .fill_rect(Rect::new(0.0, 0.0, 2.0, 1.0), [255, 0, 0, 255]);
        }
        assert_eq!(surface.pixel(0, 7), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(1, 7), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(2, 7), Some([0, 0, 0, 255]));
        assert_eq!(surface.pixel(0, 6), Some([0, 0, 0, 255]));
    }

    #[test]
    fn draws_outside_session_are_ignored() {
        let mut surface = surface();
        surface.fill_rect(Rect::new(0.0, 0.0, 8.0, 8.0), [255, 255, 255, 255]);
        assert_eq!(surface.pixel(3, 3), Some([0, 0, 0, 255]));
    }

    #[test]
    fn alpha_and_additive_blending() {
        let mut surface = surface();
        surface.clear([100, 100, 100, 255]);
        {
            let mut session = DrawSession::begin(&mut surface);
            let s = session.surface();
            s.set_blend_function(BlendFunction::ALPHA);
            s.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), [200, 0, 0, 128]);
            s.set_blend_function(BlendFunction::ADDITIVE);
            s.fill_rect(Rect::new(1.0, 0.0, 1.0, 1.0), [200, 0, 0, 255]);
        }
        let alpha = surface.pixel(0, 7).unwrap();
        assert_eq!(alpha[0], 150);
        assert_eq!(alpha[1], 50);
        let additive = surface.pixel(1, 7).unwrap();
        assert_eq!(additive[0], 255);
        assert_eq!(additive[1], 100);
    }

    #[test]
    fn repeated_image_draws_blend_with_the_current_function() {
        let mut images = ImageStore::default();
        let handle = images.insert_rgba("glow", 1, 1, vec![200, 0, 0, 128]).unwrap();
        let mut surface = SoftwareSurface::new(8, 8, images);
        surface.set_projection(ViewProjection::orthographic(Vec2::new(4.0, 4.0), 8.0, 8.0));
        surface.clear([100, 100, 100, 255]);
        {
            let mut session = DrawSession::begin(&mut surface);
            let s = session.surface();
            s.draw_image(handle, Rect::new(0.0, 0.0, 1.0, 1.0));
            s.draw_image(handle, Rect::new(0.0, 0.0, 1.0, 1.0));
        }
        assert_eq!(surface.pixel(0, 7).unwrap()[0], 175);
        assert_eq!(surface.pixel(1, 7), Some([100, 100, 100, 255]));
    }

    #[test]
    fn draw_image_scales_into_bounds() {
        let mut images = ImageStore::default();
        let rgba = [[255, 0, 0, 255], [0, 255, 0, 255]].concat();
        let handle = images.insert_rgba("two", 2, 1, rgba).unwrap();
        let mut surface = SoftwareSurface::new(8, 8, images);
        surface.set_projection(ViewProjection::orthographic(Vec2::new(4.0, 4.0), 8.0, 8.0));
        {
            let mut session = DrawSession::begin(&mut surface);
            session
                .surface()
                .draw_image(handle, Rect::new(0.0, 0.0, 4.0, 1.0));
        }
        assert_eq!(surface.pixel(0, 7), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(1, 7), Some([255, 0, 0, 255]));
        assert_eq!(surface.pixel(2, 7), Some([0, 255, 0, 255]));
        assert_eq!(surface.pixel(3, 7), Some([0, 255, 0, 255]));
        assert_eq!(surface.pixel(4, 7), Some([0, 0, 0, 0]));
    }

    #[test]
    fn tile_layer_uses_animated_gid() {
        let tiles = vec![0, 0, 1, 0];
        let layer = TileLayer::new("ground", 2, 2, tiles).unwrap();
        let mut map = TiledMap::new("level", 2, 2).with_layer(MapLayer::Tile(layer.clone()));
        map.animations.insert(
            1,
            TileAnimation::new(vec![
                AnimationFrame {
                    gid: 1,
                    duration_ms: 100,
                },
                AnimationFrame {
                    gid: 2,
                    duration_ms: 100,
                },
            ]),
        );
        let mut surface = surface();
        {
            let mut session = DrawSession::begin(&mut surface);
            session.surface().draw_tile_layer(&map, &layer, 150);
        }
        // Row 1 of a 2-high layer is world y 0, the bottom pixel row.
        assert_eq!(surface.pixel(0, 7), Some(tile_color(2)));
        assert_eq!(surface.pixel(1, 7), Some([0, 0, 0, 255]));
        assert_eq!(surface.pixel(0, 6), Some([0, 0, 0, 255]));
    }

    #[test]
    fn image_store_validates_keys_and_sizes() {
        let mut images = ImageStore::default();
        assert!(matches!(
            images.insert_rgba("Bad.Key", 1, 1, vec![0; 4]),
            Err(ImageLoadError::InvalidKey(_))
        ));
        assert!(matches!(
            images.insert_rgba("short", 2, 2, vec![0; 4]),
            Err(ImageLoadError::SizeMismatch { actual: 4, .. })
        ));
        let first = images.insert_rgba("ok", 1, 1, vec![1; 4]).unwrap();
        let again = images.insert_rgba("ok", 1, 1, vec![2; 4]).unwrap();
        assert_eq!(first, again);
        assert_eq!(images.len(), 1);
        assert_eq!(images.get(first).map(|image| image.rgba[0]), Some(2));
    }

    #[test]
    fn load_png_reads_file_and_missing_file_warns_once() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path();
        std::fs::create_dir_all(dir.join("actors")).unwrap();
        let pixels = image::RgbaImage::from_pixel(3, 2, image::Rgba([9, 8, 7, 255]));
        pixels.save(dir.join("actors/hero.png")).unwrap();

        let mut images = ImageStore::default();
        let handle = images.load_png(dir, "actors/hero").unwrap();
        let loaded = images.get(handle).unwrap();
        assert_eq!((loaded.width, loaded.height), (3, 2));
        assert_eq!(&loaded.rgba[0..4], &[9, 8, 7, 255]);
        assert_eq!(images.load_png(dir, "actors/hero").unwrap(), handle);

        assert!(matches!(
            images.load_png(dir, "actors/missing"),
            Err(ImageLoadError::Open { .. })
        ));
        assert_eq!(images.load_png_or_warn(dir, "actors/missing"), None);
        assert_eq!(images.len(), 1);
    }
}
