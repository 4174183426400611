mod catalog;
mod model;
mod state;
mod tmj;
mod tmx;

pub use catalog::TileLayerCatalog;
pub use model::{
    AnimationFrame, MapLayer, MapObject, ObjectLayer, Properties, PropertyValue, TileAnimation,
    TileGid, TileLayer, TiledMap, TilemapError, PROPERTY_PARALLAX_VALUE,
    TILED_LAYER_BACKGROUND_PREFIX,
};
pub use state::{MapChangeHandle, MapState, TileAnimationClock};
pub use tmj::{load_tmj_file, parse_tmj};
pub use tmx::{load_map_file, load_tmx_file, parse_tmx, MapErrorCode, MapLoadError, SourceLocation};
