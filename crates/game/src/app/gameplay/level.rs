const DEMO_MAP_WIDTH: u32 = 48;
const DEMO_MAP_HEIGHT: u32 = 12;
const DEMO_SKY_GID: u32 = 1;
const DEMO_HILL_GID: u32 = 2;
const DEMO_GROUND_GID: u32 = 3;
const DEMO_DECOR_GID: u32 = 4;

/// Built-in level used when no map file is configured or loadable. Rows are listed top
/// first, as in a map file.
pub(crate) fn demo_map() -> TiledMap {
    let (w, h) = (DEMO_MAP_WIDTH, DEMO_MAP_HEIGHT);

    let sky = vec![DEMO_SKY_GID; (w * h) as usize];

    let mut hills = vec![0; (w * h) as usize];
    for x in 0..w {
        // Rolling outline, three to five tiles high.
        let peak = 3 + (x / 4) % 3;
        for row in (h - peak)..h {
            hills[(row * w + x) as usize] = DEMO_HILL_GID;
        }
    }

    let mut ground = vec![0; (w * h) as usize];
    let fill = |tiles: &mut Vec<u32>, xs: std::ops::Range<u32>, row: u32| {
        for x in xs {
            tiles[(row * w + x) as usize] = DEMO_GROUND_GID;
        }
    };
    fill(&mut ground, 0..w, h - 1);
    fill(&mut ground, 0..w, h - 2);
    fill(&mut ground, 10..15, 7);
    fill(&mut ground, 20..25, 5);
    fill(&mut ground, 30..31, 9);
    fill(&mut ground, 30..31, 8);

    let mut decor = vec![0; (w * h) as usize];
    for x in [4, 17, 27, 41] {
        decor[((h - 3) * w + x) as usize] = DEMO_DECOR_GID;
    }

    let layers = [
        demo_tile_layer("background_sky", sky).map(|layer| {
            layer.with_property(
                PROPERTY_PARALLAX_VALUE,
                PropertyValue::Float(0.2),
            )
        }),
        demo_tile_layer("background_hills", hills).map(|layer| {
            layer.with_property(
                PROPERTY_PARALLAX_VALUE,
                PropertyValue::Float(0.5),
            )
        }),
        demo_tile_layer("ground", ground)
            .map(|layer| layer.with_property(SOLID_LAYER_PROPERTY, PropertyValue::Bool(true))),
        demo_tile_layer("decor", decor),
    ];

    let mut map = TiledMap::new(DEMO_MAP_NAME, w, h);
    for layer in layers.into_iter().flatten() {
        map = map.with_layer(MapLayer::Tile(layer));
    }
    map.with_layer(MapLayer::Object(ObjectLayer {
        name: "spawns".to_string(),
        visible: true,
        objects: vec![
            demo_object(1, PLAYER_OBJECT_KIND, Vec2::new(2.0, 2.0), None),
            demo_object(2, ENEMY_OBJECT_KIND, Vec2::new(12.0, 5.0), None),
            demo_object(3, ENEMY_OBJECT_KIND, Vec2::new(22.0, 7.0), Some(2.0)),
            demo_object(4, ENEMY_OBJECT_KIND, Vec2::new(38.0, 2.0), Some(5.0)),
        ],
        properties: Properties::default(),
    }))
}

fn demo_tile_layer(name: &str, tiles: Vec<u32>) -> Option<TileLayer> {
    match TileLayer::new(name, DEMO_MAP_WIDTH, DEMO_MAP_HEIGHT, tiles) {
        Ok(layer) => Some(layer),
        Err(error) => {
            warn!(layer = name, error = %error, "demo_layer_invalid");
            None
        }
    }
}

fn demo_object(id: u32, kind: &str, position: Vec2, health: Option<f32>) -> MapObject {
    let mut object = MapObject {
        id,
        name: kind.to_lowercase(),
        kind: kind.to_string(),
        position,
        size: Vec2::new(1.0, 1.0),
        properties: Properties::default(),
    };
    if let Some(health) = health {
        object
            .properties
            .insert(ENEMY_HEALTH_PROPERTY, PropertyValue::Float(health));
    }
    object
}

impl SpawnPoints {
    fn from_map(map: &TiledMap) -> Self {
        let mut player = None;
        let mut enemies = Vec::new();
        for object in map.objects() {
            match object.kind.as_str() {
                PLAYER_OBJECT_KIND if player.is_none() => player = Some(object.position),
                PLAYER_OBJECT_KIND => {
                    warn!(object = object.id, "duplicate_player_spawn_ignored");
                }
                ENEMY_OBJECT_KIND => enemies.push(EnemySpawn {
                    position: object.position,
                    health: object
                        .properties
                        .f32_or(ENEMY_HEALTH_PROPERTY, ENEMY_DEFAULT_HEALTH)
                        .max(f32::EPSILON),
                }),
                _ => {}
            }
        }
        let player = player.unwrap_or_else(|| {
            warn!(map = %map.name, "player_spawn_missing");
            Vec2::new(1.0, map.height as f32 * 0.5)
        });
        Self { player, enemies }
    }
}

/// Solid cells in world coordinates, collected from foreground tile layers that carry
/// `solid = true`. The map edges and everything below `y = 0` count as solid.
#[derive(Debug, Clone, PartialEq)]
struct SolidGrid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl SolidGrid {
    fn from_map(map: &TiledMap) -> Self {
        let mut grid = Self {
            width: map.width,
            height: map.height,
            cells: vec![false; map.width as usize * map.height as usize],
        };
        for layer in map.tile_layers().filter(|layer| is_solid_layer(layer)) {
            for row in 0..layer.height() {
                for x in 0..layer.width() {
                    if layer.tile_at(x, row).is_none() {
                        continue;
                    }
                    if let Some(origin) = map.tile_origin_world(layer, x, row) {
                        grid.mark_solid(origin.x as i64, origin.y as i64);
                    }
                }
            }
        }
        grid
    }

    fn mark_solid(&mut self, x: i64, y: i64) {
        if let Some(index) = self.index(x, y) {
            self.cells[index] = true;
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn solid_count(&self) -> usize {
        self.cells.iter().filter(|solid| **solid).count()
    }

    fn is_solid(&self, x: i64, y: i64) -> bool {
        if y < 0 || x < 0 || x >= self.width as i64 {
            return true;
        }
        self.index(x, y)
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(false)
    }

    fn overlaps(&self, rect: Rect) -> bool {
        let min_x = rect.x.floor() as i64;
        let max_x = (rect.x + rect.width - COLLISION_EPSILON).floor() as i64;
        let min_y = rect.y.floor() as i64;
        let max_y = (rect.y + rect.height - COLLISION_EPSILON).floor() as i64;
        (min_y..=max_y).any(|y| (min_x..=max_x).any(|x| self.is_solid(x, y)))
    }
}

fn is_solid_layer(layer: &TileLayer) -> bool {
    !layer.is_background()
        && matches!(
            layer.properties().get(SOLID_LAYER_PROPERTY),
            Some(PropertyValue::Bool(true))
        )
}
