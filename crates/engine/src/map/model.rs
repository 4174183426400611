use std::collections::HashMap;

use thiserror::Error;

use crate::ecs::Vec2;

pub const TILED_LAYER_BACKGROUND_PREFIX: &str = "background";
pub const PROPERTY_PARALLAX_VALUE: &str = "parallaxValue";

/// Global tile id as stored in the map file. 0 means "no tile".
pub type TileGid = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    String(String),
}

impl PropertyValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PropertyValue::Float(value) => Some(*value),
            PropertyValue::Int(value) => Some(*value as f32),
            PropertyValue::Bool(_) | PropertyValue::String(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: HashMap<String, PropertyValue>,
}

impl Properties {
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn f32_or(&self, key: &str, default: f32) -> f32 {
        self.get(key)
            .and_then(PropertyValue::as_f32)
            .unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
}

/// Tile grid convention: row 0 is the top row, as in the map file. World y grows upwards,
/// so tile (x, row) covers world cells `x * tile_w .. (x + 1) * tile_w` horizontally and
/// `(height - 1 - row) * tile_h ..` vertically.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    name: String,
    visible: bool,
    width: u32,
    height: u32,
    tiles: Vec<TileGid>,
    properties: Properties,
}

impl TileLayer {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        tiles: Vec<TileGid>,
    ) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            name: name.into(),
            visible: true,
            width,
            height,
            tiles,
            properties: Properties::default(),
        })
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub fn tile_at(&self, x: u32, row: u32) -> Option<TileGid> {
        if x >= self.width || row >= self.height {
            return None;
        }
        self.tiles
            .get(row as usize * self.width as usize + x as usize)
            .copied()
            .filter(|gid| *gid != 0)
    }

    pub fn is_background(&self) -> bool {
        self.name.starts_with(TILED_LAYER_BACKGROUND_PREFIX)
    }

    pub fn parallax_factor(&self) -> f32 {
        let raw = self.properties.f32_or(PROPERTY_PARALLAX_VALUE, 0.0);
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    pub kind: String,
    pub position: Vec2,
    pub size: Vec2,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectLayer {
    pub name: String,
    pub visible: bool,
    pub objects: Vec<MapObject>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapLayer {
    Tile(TileLayer),
    Object(ObjectLayer),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    pub gid: TileGid,
    pub duration_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileAnimation {
    frames: Vec<AnimationFrame>,
    total_ms: u64,
}

impl TileAnimation {
    pub fn new(frames: Vec<AnimationFrame>) -> Self {
        let total_ms = frames.iter().map(|frame| frame.duration_ms as u64).sum();
        Self { frames, total_ms }
    }

    pub fn frame_at(&self, base_time_ms: u64) -> Option<TileGid> {
        if self.total_ms == 0 {
            return self.frames.first().map(|frame| frame.gid);
        }
        let mut remaining = base_time_ms % self.total_ms;
        for frame in &self.frames {
            let duration = frame.duration_ms as u64;
            if remaining < duration {
                return Some(frame.gid);
            }
            remaining -= duration;
        }
        self.frames.last().map(|frame| frame.gid)
    }
}

/// World units are tiles: a layer tile is one unit wide regardless of its pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct TiledMap {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<MapLayer>,
    pub animations: HashMap<TileGid, TileAnimation>,
    pub properties: Properties,
}

impl TiledMap {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            tile_width: 16,
            tile_height: 16,
            layers: Vec::new(),
            animations: HashMap::new(),
            properties: Properties::default(),
        }
    }

    pub fn with_layer(mut self, layer: MapLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn tile_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            MapLayer::Tile(tile_layer) => Some(tile_layer),
            MapLayer::Object(_) => None,
        })
    }

    pub fn objects(&self) -> impl Iterator<Item = &MapObject> {
        self.layers
            .iter()
            .filter_map(|layer| match layer {
                MapLayer::Object(object_layer) => Some(object_layer.objects.iter()),
                MapLayer::Tile(_) => None,
            })
            .flatten()
    }

    /// Current gid for an animated tile, or `gid` itself when it is not animated.
    pub fn resolve_gid(&self, gid: TileGid, base_time_ms: u64) -> TileGid {
        self.animations
            .get(&gid)
            .and_then(|animation| animation.frame_at(base_time_ms))
            .unwrap_or(gid)
    }

    pub fn tile_origin_world(&self, layer: &TileLayer, x: u32, row: u32) -> Option<Vec2> {
        if x >= layer.width() || row >= layer.height() {
            return None;
        }
        Some(Vec2 {
            x: x as f32,
            y: (layer.height() - 1 - row) as f32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_layer_rejects_wrong_tile_count() {
        let result = TileLayer::new("ground", 3, 2, vec![1; 5]);
        assert_eq!(
            result,
            Err(TilemapError::TileCountMismatch {
                expected: 6,
                actual: 5
            })
        );
    }

    #[test]
    fn parallax_defaults_to_zero_and_is_clamped() {
        let plain = TileLayer::new("background_sky", 1, 1, vec![1]).expect("layer");
        assert_eq!(plain.parallax_factor(), 0.0);

        let int_value = plain
            .clone()
            .with_property(PROPERTY_PARALLAX_VALUE, PropertyValue::Int(1));
        assert_eq!(int_value.parallax_factor(), 1.0);

        let too_large = plain
            .clone()
            .with_property(PROPERTY_PARALLAX_VALUE, PropertyValue::Float(3.5));
        assert_eq!(too_large.parallax_factor(), 1.0);

        let wrong_type = plain.with_property(
            PROPERTY_PARALLAX_VALUE,
            PropertyValue::String("fast".to_string()),
        );
        assert_eq!(wrong_type.parallax_factor(), 0.0);
    }

    #[test]
    fn background_classification_uses_name_prefix() {
        let bgd = TileLayer::new("background_hills", 1, 1, vec![0]).expect("layer");
        let fgd = TileLayer::new("ground", 1, 1, vec![0]).expect("layer");
        let infix = TileLayer::new("my_background", 1, 1, vec![0]).expect("layer");
        assert!(bgd.is_background());
        assert!(!fgd.is_background());
        assert!(!infix.is_background());
    }

    #[test]
    fn empty_gid_is_not_a_tile() {
        let layer = TileLayer::new("ground", 2, 1, vec![0, 7]).expect("layer");
        assert_eq!(layer.tile_at(0, 0), None);
        assert_eq!(layer.tile_at(1, 0), Some(7));
        assert_eq!(layer.tile_at(2, 0), None);
    }

    #[test]
    fn animation_cycles_through_frames() {
        let animation = TileAnimation::new(vec![
            AnimationFrame {
                gid: 5,
                duration_ms: 100,
            },
            AnimationFrame {
                gid: 6,
                duration_ms: 50,
            },
        ]);
        assert_eq!(animation.frame_at(0), Some(5));
        assert_eq!(animation.frame_at(99), Some(5));
        assert_eq!(animation.frame_at(100), Some(6));
        assert_eq!(animation.frame_at(150), Some(5));
    }

    #[test]
    fn tile_rows_map_top_down_to_world_bottom_up() {
        let map = TiledMap::new("test", 2, 3);
        let layer = TileLayer::new("ground", 2, 3, vec![1; 6]).expect("layer");
        assert_eq!(map.tile_origin_world(&layer, 0, 0), Some(Vec2::new(0.0, 2.0)));
        assert_eq!(map.tile_origin_world(&layer, 1, 2), Some(Vec2::new(1.0, 0.0)));
        assert_eq!(map.tile_origin_world(&layer, 2, 0), None);
    }
}
