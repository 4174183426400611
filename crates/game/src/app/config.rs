use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub(crate) const CONFIG_ENV_VAR: &str = "JUMPER_CONFIG";
pub(crate) const CONFIG_FILE_NAME: &str = "jumper.json";

/// Tunables read from `jumper.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    pub(crate) window_width: u32,
    pub(crate) window_height: u32,
    pub(crate) target_tps: u32,
    /// Map file name under `assets/maps`. `None` uses the built-in demo level.
    pub(crate) start_map: Option<String>,
    pub(crate) player_speed: f32,
    pub(crate) jump_speed: f32,
    pub(crate) attack_damage: f32,
    pub(crate) attack_life_span: f32,
    pub(crate) damage_pool_capacity: usize,
    pub(crate) show_physics_debug: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            target_tps: 60,
            start_map: Some("level1.tmx".to_string()),
            player_speed: 6.0,
            jump_speed: 11.0,
            attack_damage: 1.0,
            attack_life_span: 0.25,
            damage_pool_capacity: 64,
            show_physics_debug: false,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path} at `{field}`: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config {path}: `{field}` {reason}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: &'static str,
    },
}

/// `JUMPER_CONFIG` when set, otherwise `<root>/jumper.json`.
pub(crate) fn config_path(root: &Path) -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| root.join(CONFIG_FILE_NAME))
}

/// Loads the config at `path`. A missing file yields the defaults.
pub(crate) fn load_game_config(path: &Path) -> Result<GameConfig, ConfigError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "game_config_not_found_using_defaults");
            return Ok(GameConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let config = parse_game_config(path, &raw)?;
    info!(path = %path.display(), "game_config_loaded");
    Ok(config)
}

pub(crate) fn parse_game_config(path: &Path, raw: &str) -> Result<GameConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let config: GameConfig =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let field = error.path().to_string();
            ConfigError::Parse {
                path: path.to_path_buf(),
                field,
                source: error.into_inner(),
            }
        })?;
    validate(path, &config)?;
    Ok(config)
}

fn validate(path: &Path, config: &GameConfig) -> Result<(), ConfigError> {
    let invalid = |field: &'static str, reason: &'static str| ConfigError::Invalid {
        path: path.to_path_buf(),
        field,
        reason,
    };
    if config.window_width == 0 || config.window_height == 0 {
        return Err(invalid("window_width/window_height", "must be non-zero"));
    }
    if config.target_tps == 0 {
        return Err(invalid("target_tps", "must be non-zero"));
    }
    if config.damage_pool_capacity == 0 {
        return Err(invalid("damage_pool_capacity", "must be non-zero"));
    }
    for (field, value) in [
        ("player_speed", config.player_speed),
        ("jump_speed", config.jump_speed),
        ("attack_damage", config.attack_damage),
        ("attack_life_span", config.attack_life_span),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(invalid(field, "must be a positive number"));
        }
    }
    Ok(())
}
