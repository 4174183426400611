use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::ecs::Vec2;

use super::model::{
    AnimationFrame, MapLayer, MapObject, ObjectLayer, Properties, PropertyValue, TileAnimation,
    TileGid, TileLayer, TiledMap, TilemapError,
};

pub(super) const GID_FLIP_FLAGS_MASK: u32 = 0xE000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapErrorCode {
    ReadFile,
    XmlMalformed,
    JsonMalformed,
    InvalidRoot,
    MissingAttribute,
    InvalidValue,
    UnsupportedEncoding,
    TileCountMismatch,
}

#[derive(Debug, Clone)]
pub struct MapLoadError {
    pub code: MapErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for MapLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for MapLoadError {}

/// Loads a `.tmj`/`.json` map with the JSON loader and anything else as TMX.
pub fn load_map_file(path: &Path) -> Result<TiledMap, MapLoadError> {
    match path.extension().and_then(|extension| extension.to_str()) {
        Some("tmj") | Some("json") => super::tmj::load_tmj_file(path),
        _ => load_tmx_file(path),
    }
}

pub fn load_tmx_file(path: &Path) -> Result<TiledMap, MapLoadError> {
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
    parse_tmx(&name, path, &raw)
}

pub fn parse_tmx(name: &str, file_path: &Path, raw: &str) -> Result<TiledMap, MapLoadError> {
    let doc = Document::parse(raw).map_err(|error| MapLoadError {
        code: MapErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = ParseContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "map" {
        return Err(ctx.error_at(
            MapErrorCode::InvalidRoot,
            "root element must be <map>".to_string(),
            root,
        ));
    }

    let mut map = TiledMap::new(name, ctx.u32_attr(root, "width")?, ctx.u32_attr(root, "height")?);
    map.tile_width = ctx.u32_attr(root, "tilewidth")?;
    map.tile_height = ctx.u32_attr(root, "tileheight")?;

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "properties" => map.properties = ctx.parse_properties(child)?,
            "tileset" => ctx.parse_tileset_animations(child, &mut map.animations)?,
            "layer" => map.layers.push(MapLayer::Tile(ctx.parse_tile_layer(child)?)),
            "objectgroup" => {
                let layer = ctx.parse_object_layer(child, map.tile_width, map.tile_height, map.height)?;
                map.layers.push(MapLayer::Object(layer));
            }
            // Image layers and groups are not drawn by the frame renderer.
            _ => {}
        }
    }

    Ok(map)
}

struct ParseContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl<'a, 'input> ParseContext<'a, 'input> {
    fn parse_tile_layer(&self, node: Node<'_, '_>) -> Result<TileLayer, MapLoadError> {
        let name = node.attribute("name").unwrap_or_default().to_string();
        let width = self.u32_attr(node, "width")?;
        let height = self.u32_attr(node, "height")?;
        let visible = self.visible_attr(node)?;

        let mut properties = Properties::default();
        let mut tiles = None;
        for child in node.children().filter(|child| child.is_element()) {
            match child.tag_name().name() {
                "properties" => properties = self.parse_properties(child)?,
                "data" => tiles = Some(self.parse_csv_data(&name, child)?),
                _ => {}
            }
        }
        let tiles = tiles.ok_or_else(|| {
            self.error_at(
                MapErrorCode::MissingAttribute,
                format!("layer '{name}' has no <data> element"),
                node,
            )
        })?;

        let mut layer = TileLayer::new(name, width, height, tiles).map_err(|error| match error {
            TilemapError::TileCountMismatch { .. } => {
                self.error_at(MapErrorCode::TileCountMismatch, error.to_string(), node)
            }
        })?;
        *layer.properties_mut() = properties;
        Ok(layer.with_visible(visible))
    }

    fn parse_csv_data(&self, layer_name: &str, node: Node<'_, '_>) -> Result<Vec<TileGid>, MapLoadError> {
        match node.attribute("encoding") {
            Some("csv") => {}
            other => {
                return Err(self.error_at(
                    MapErrorCode::UnsupportedEncoding,
                    format!(
                        "layer '{layer_name}' uses encoding '{}'; only csv is supported",
                        other.unwrap_or("xml")
                    ),
                    node,
                ))
            }
        }
        let text = node.text().unwrap_or_default();
        text.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry
                    .parse::<u32>()
                    .map(|gid| gid & !GID_FLIP_FLAGS_MASK)
                    .map_err(|_| {
                        self.error_at(
                            MapErrorCode::InvalidValue,
                            format!("layer '{layer_name}' has invalid tile id '{entry}'"),
                            node,
                        )
                    })
            })
            .collect()
    }

    fn parse_object_layer(
        &self,
        node: Node<'_, '_>,
        tile_width: u32,
        tile_height: u32,
        map_height: u32,
    ) -> Result<ObjectLayer, MapLoadError> {
        let tile_w = tile_width.max(1) as f32;
        let tile_h = tile_height.max(1) as f32;
        let mut layer = ObjectLayer {
            name: node.attribute("name").unwrap_or_default().to_string(),
            visible: self.visible_attr(node)?,
            objects: Vec::new(),
            properties: Properties::default(),
        };

        for child in node.children().filter(|child| child.is_element()) {
            match child.tag_name().name() {
                "properties" => layer.properties = self.parse_properties(child)?,
                "object" => {
                    let width = self.f32_attr_or(child, "width", 0.0)? / tile_w;
                    let height = self.f32_attr_or(child, "height", 0.0)? / tile_h;
                    let x = self.f32_attr_or(child, "x", 0.0)? / tile_w;
                    let top = self.f32_attr_or(child, "y", 0.0)? / tile_h;
                    let properties = child
                        .children()
                        .find(|grandchild| grandchild.has_tag_name("properties"))
                        .map(|props| self.parse_properties(props))
                        .transpose()?
                        .unwrap_or_default();
                    layer.objects.push(MapObject {
                        id: self.u32_attr(child, "id")?,
                        name: child.attribute("name").unwrap_or_default().to_string(),
                        kind: child
                            .attribute("type")
                            .or_else(|| child.attribute("class"))
                            .unwrap_or_default()
                            .to_string(),
                        position: Vec2::new(x, map_height as f32 - top - height),
                        size: Vec2::new(width, height),
                        properties,
                    });
                }
                _ => {}
            }
        }
        Ok(layer)
    }

    fn parse_tileset_animations(
        &self,
        node: Node<'_, '_>,
        animations: &mut HashMap<TileGid, TileAnimation>,
    ) -> Result<(), MapLoadError> {
        let first_gid = self.u32_attr(node, "firstgid")?;
        for tile in node.children().filter(|child| child.has_tag_name("tile")) {
            let Some(animation) = tile.children().find(|child| child.has_tag_name("animation"))
            else {
                continue;
            };
            let local_id = self.u32_attr(tile, "id")?;
            let mut frames = Vec::new();
            for frame in animation.children().filter(|child| child.has_tag_name("frame")) {
                frames.push(AnimationFrame {
                    gid: first_gid + self.u32_attr(frame, "tileid")?,
                    duration_ms: self.u32_attr(frame, "duration")?,
                });
            }
            if !frames.is_empty() {
                animations.insert(first_gid + local_id, TileAnimation::new(frames));
            }
        }
        Ok(())
    }

    fn parse_properties(&self, node: Node<'_, '_>) -> Result<Properties, MapLoadError> {
        let mut properties = Properties::default();
        for property in node.children().filter(|child| child.has_tag_name("property")) {
            let name = self.required_attr(property, "name")?;
            let raw = property
                .attribute("value")
                .or_else(|| property.text())
                .unwrap_or_default();
            let value = match property.attribute("type").unwrap_or("string") {
                "bool" => PropertyValue::Bool(raw == "true"),
                "int" => PropertyValue::Int(raw.parse::<i64>().map_err(|_| {
                    self.error_at(
                        MapErrorCode::InvalidValue,
                        format!("property '{name}' value '{raw}' is not an int"),
                        property,
                    )
                })?),
                "float" => PropertyValue::Float(raw.parse::<f32>().map_err(|_| {
                    self.error_at(
                        MapErrorCode::InvalidValue,
                        format!("property '{name}' value '{raw}' is not a float"),
                        property,
                    )
                })?),
                _ => PropertyValue::String(raw.to_string()),
            };
            properties.insert(name, value);
        }
        Ok(properties)
    }

    fn visible_attr(&self, node: Node<'_, '_>) -> Result<bool, MapLoadError> {
        match node.attribute("visible") {
            None | Some("1") => Ok(true),
            Some("0") => Ok(false),
            Some(other) => Err(self.error_at(
                MapErrorCode::InvalidValue,
                format!("visible must be 0 or 1, got '{other}'"),
                node,
            )),
        }
    }

    fn required_attr<'n>(
        &self,
        node: Node<'n, '_>,
        attribute: &str,
    ) -> Result<&'n str, MapLoadError> {
        node.attribute(attribute).ok_or_else(|| {
            self.error_at(
                MapErrorCode::MissingAttribute,
                format!(
                    "<{}> is missing attribute '{attribute}'",
                    node.tag_name().name()
                ),
                node,
            )
        })
    }

    fn u32_attr(&self, node: Node<'_, '_>, attribute: &str) -> Result<u32, MapLoadError> {
        let raw = self.required_attr(node, attribute)?;
        raw.parse::<u32>().map_err(|_| {
            self.error_at(
                MapErrorCode::InvalidValue,
                format!("attribute '{attribute}' value '{raw}' is not an unsigned integer"),
                node,
            )
        })
    }

    fn f32_attr_or(
        &self,
        node: Node<'_, '_>,
        attribute: &str,
        default: f32,
    ) -> Result<f32, MapLoadError> {
        let Some(raw) = node.attribute(attribute) else {
            return Ok(default);
        };
        raw.parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| {
                self.error_at(
                    MapErrorCode::InvalidValue,
                    format!("attribute '{attribute}' value '{raw}' is not a number"),
                    node,
                )
            })
    }

    fn error_at(&self, code: MapErrorCode, message: String, node: Node<'_, '_>) -> MapLoadError {
        let pos = self.doc.text_pos_at(node.range().start);
        MapLoadError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}
