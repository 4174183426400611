use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::ecs::Vec2;

use super::model::{
    AnimationFrame, MapLayer, MapObject, ObjectLayer, Properties, PropertyValue, TileAnimation,
    TileGid, TileLayer, TiledMap, TilemapError,
};
use super::tmx::{MapErrorCode, MapLoadError, SourceLocation, GID_FLIP_FLAGS_MASK};

#[derive(Debug, Deserialize)]
struct RawMap {
    width: u32,
    height: u32,
    #[serde(rename = "tilewidth")]
    tile_width: u32,
    #[serde(rename = "tileheight")]
    tile_height: u32,
    #[serde(default)]
    layers: Vec<RawLayer>,
    #[serde(default)]
    tilesets: Vec<RawTileset>,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawLayer {
    TileLayer {
        #[serde(default)]
        name: String,
        width: u32,
        height: u32,
        #[serde(default)]
        data: Vec<u32>,
        #[serde(default)]
        encoding: Option<String>,
        #[serde(default = "default_visible")]
        visible: bool,
        #[serde(default)]
        properties: Vec<RawProperty>,
    },
    ObjectGroup {
        #[serde(default)]
        name: String,
        #[serde(default = "default_visible")]
        visible: bool,
        #[serde(default)]
        objects: Vec<RawObject>,
        #[serde(default)]
        properties: Vec<RawProperty>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawTileset {
    #[serde(rename = "firstgid")]
    first_gid: u32,
    #[serde(default)]
    tiles: Vec<RawTile>,
}

#[derive(Debug, Deserialize)]
struct RawTile {
    id: u32,
    #[serde(default)]
    animation: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "tileid")]
    tile_id: u32,
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    value: Value,
}

fn default_visible() -> bool {
    true
}

/// Loads a map saved in Tiled's JSON format. Produces the same model as the TMX loader.
pub fn load_tmj_file(path: &Path) -> Result<TiledMap, MapLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| MapLoadError {
        code: MapErrorCode::ReadFile,
        message: format!("failed to read map file: {source}"),
        file_path: path.to_path_buf(),
        location: None,
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    parse_tmj(&name, path, &raw)
}

pub fn parse_tmj(name: &str, file_path: &Path, raw: &str) -> Result<TiledMap, MapLoadError> {
    let error = |code: MapErrorCode, message: String| MapLoadError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: None,
    };
    let parsed: RawMap = serde_json::from_str(raw).map_err(|source| MapLoadError {
        code: MapErrorCode::JsonMalformed,
        message: format!("malformed map JSON: {source}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: source.line(),
            column: source.column(),
        }),
    })?;

    let mut map = TiledMap::new(name, parsed.width, parsed.height);
    map.tile_width = parsed.tile_width;
    map.tile_height = parsed.tile_height;
    map.properties = convert_properties(parsed.properties).map_err(|message| {
        error(MapErrorCode::InvalidValue, message)
    })?;
    map.animations = collect_animations(&parsed.tilesets);

    let tile_w = parsed.tile_width.max(1) as f32;
    let tile_h = parsed.tile_height.max(1) as f32;
    for layer in parsed.layers {
        match layer {
            RawLayer::TileLayer {
                name,
                width,
                height,
                data,
                encoding,
                visible,
                properties,
            } => {
                if let Some(other) = encoding.filter(|encoding| encoding != "csv") {
                    return Err(error(
                        MapErrorCode::UnsupportedEncoding,
                        format!("layer '{name}' uses encoding '{other}'; only csv is supported"),
                    ));
                }
                let tiles = data
                    .into_iter()
                    .map(|gid| gid & !GID_FLIP_FLAGS_MASK)
                    .collect();
                let properties = convert_properties(properties)
                    .map_err(|message| error(MapErrorCode::InvalidValue, message))?;
                let mut tile_layer =
                    TileLayer::new(name, width, height, tiles).map_err(|source| match source {
                        TilemapError::TileCountMismatch { .. } => {
                            error(MapErrorCode::TileCountMismatch, source.to_string())
                        }
                    })?;
                *tile_layer.properties_mut() = properties;
                map.layers
                    .push(MapLayer::Tile(tile_layer.with_visible(visible)));
            }
            RawLayer::ObjectGroup {
                name,
                visible,
                objects,
                properties,
            } => {
                let mut converted = Vec::with_capacity(objects.len());
                for object in objects {
                    let width = object.width / tile_w;
                    let height = object.height / tile_h;
                    converted.push(MapObject {
                        id: object.id,
                        name: object.name,
                        kind: if object.kind.is_empty() {
                            object.class
                        } else {
                            object.kind
                        },
                        position: Vec2::new(
                            object.x / tile_w,
                            parsed.height as f32 - object.y / tile_h - height,
                        ),
                        size: Vec2::new(width, height),
                        properties: convert_properties(object.properties)
                            .map_err(|message| error(MapErrorCode::InvalidValue, message))?,
                    });
                }
                map.layers.push(MapLayer::Object(ObjectLayer {
                    name,
                    visible,
                    objects: converted,
                    properties: convert_properties(properties)
                        .map_err(|message| error(MapErrorCode::InvalidValue, message))?,
                }));
            }
            RawLayer::Unsupported => {}
        }
    }

    Ok(map)
}

fn collect_animations(tilesets: &[RawTileset]) -> HashMap<TileGid, TileAnimation> {
    let mut animations = HashMap::new();
    for tileset in tilesets {
        for tile in tileset.tiles.iter().filter(|tile| !tile.animation.is_empty()) {
            let frames = tile
                .animation
                .iter()
                .map(|frame| AnimationFrame {
                    gid: tileset.first_gid + frame.tile_id,
                    duration_ms: frame.duration,
                })
                .collect();
            animations.insert(tileset.first_gid + tile.id, TileAnimation::new(frames));
        }
    }
    animations
}

fn convert_properties(raw: Vec<RawProperty>) -> Result<Properties, String> {
    let mut properties = Properties::default();
    for property in raw {
        let kind = property.kind.as_deref().unwrap_or("string");
        let value = match (kind, &property.value) {
            ("bool", Value::Bool(value)) => PropertyValue::Bool(*value),
            ("int", Value::Number(number)) => match number.as_i64() {
                Some(value) => PropertyValue::Int(value),
                None => {
                    return Err(format!(
                        "property '{}' value {number} is not an int",
                        property.name
                    ))
                }
            },
            ("float", Value::Number(number)) => match number.as_f64() {
                Some(value) => PropertyValue::Float(value as f32),
                None => {
                    return Err(format!(
                        "property '{}' value {number} is not a float",
                        property.name
                    ))
                }
            },
            (_, Value::String(value)) => PropertyValue::String(value.clone()),
            (kind, other) => {
                return Err(format!(
                    "property '{}' of type {kind} has unexpected value {other}",
                    property.name
                ))
            }
        };
        properties.insert(property.name, value);
    }
    Ok(properties)
}
