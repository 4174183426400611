#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GameplaySettings {
    pub(crate) player_speed: f32,
    pub(crate) jump_speed: f32,
    pub(crate) attack_damage: f32,
    pub(crate) attack_life_span: f32,
}

impl GameplaySettings {
    pub(crate) fn from_config(config: &GameConfig) -> Self {
        Self {
            player_speed: config.player_speed,
            jump_speed: config.jump_speed,
            attack_damage: config.attack_damage,
            attack_life_span: config.attack_life_span,
        }
    }
}

impl Default for GameplaySettings {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SceneImages {
    pub(crate) player: Option<ImageHandle>,
    pub(crate) enemy: Option<ImageHandle>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    fn from_axis(axis: f32, current: Facing) -> Facing {
        if axis < 0.0 {
            Facing::Left
        } else if axis > 0.0 {
            Facing::Right
        } else {
            current
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Body {
    velocity: Vec2,
    on_ground: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct SpawnPoints {
    player: Vec2,
    enemies: Vec<EnemySpawn>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct EnemySpawn {
    position: Vec2,
    health: f32,
}
