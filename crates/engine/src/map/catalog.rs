use std::sync::Arc;

use tracing::debug;

use super::model::{MapLayer, TileLayer, TiledMap};

/// Drawable tile layers of one loaded map, split into background and foreground.
///
/// `parallax` is indexed by absolute draw order: entries `0..background_count()` belong to
/// the background layers and the foreground layers continue from there. A catalog is never
/// mutated after `build`; a map change produces a new one.
#[derive(Debug, Clone)]
pub struct TileLayerCatalog {
    map: Arc<TiledMap>,
    background: Vec<usize>,
    foreground: Vec<usize>,
    parallax: Vec<f32>,
}

impl TileLayerCatalog {
    pub fn build(map: Arc<TiledMap>) -> Self {
        let mut background = Vec::new();
        let mut foreground = Vec::new();
        let mut background_parallax = Vec::new();
        let mut foreground_parallax = Vec::new();

        for (index, layer) in map.layers.iter().enumerate() {
            let MapLayer::Tile(tile_layer) = layer else {
                continue;
            };
            if !tile_layer.is_visible() {
                continue;
            }
            if tile_layer.is_background() {
                background.push(index);
                background_parallax.push(tile_layer.parallax_factor());
            } else {
                foreground.push(index);
                foreground_parallax.push(tile_layer.parallax_factor());
            }
        }

        let mut parallax = background_parallax;
        parallax.extend(foreground_parallax);
        debug!(
            map = map.name.as_str(),
            background_layers = background.len(),
            foreground_layers = foreground.len(),
            "tile_layer_catalog_built"
        );

        Self {
            map,
            background,
            foreground,
            parallax,
        }
    }

    pub fn map(&self) -> &Arc<TiledMap> {
        &self.map
    }

    pub fn background_count(&self) -> usize {
        self.background.len()
    }

    pub fn foreground_count(&self) -> usize {
        self.foreground.len()
    }

    pub fn parallax_table(&self) -> &[f32] {
        &self.parallax
    }

    pub fn parallax_for_draw_index(&self, draw_index: usize) -> f32 {
        self.parallax.get(draw_index).copied().unwrap_or(0.0)
    }

    /// Background layers with their draw index.
    pub fn background_layers(&self) -> impl Iterator<Item = (usize, &TileLayer)> {
        self.background
            .iter()
            .enumerate()
            .filter_map(move |(draw_index, layer_index)| {
                self.tile_layer(*layer_index)
                    .map(|layer| (draw_index, layer))
            })
    }

    /// Foreground layers with their draw index, continuing after the background layers.
    pub fn foreground_layers(&self) -> impl Iterator<Item = (usize, &TileLayer)> {
        let offset = self.background.len();
        self.foreground
            .iter()
            .enumerate()
            .filter_map(move |(position, layer_index)| {
                self.tile_layer(*layer_index)
                    .map(|layer| (offset + position, layer))
            })
    }

    fn tile_layer(&self, layer_index: usize) -> Option<&TileLayer> {
        match self.map.layers.get(layer_index) {
            Some(MapLayer::Tile(layer)) => Some(layer),
            _ => None,
        }
    }
}
