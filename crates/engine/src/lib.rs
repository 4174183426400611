use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod ecs;
mod image_keys;
pub mod map;
pub mod render;

pub use app::{
    run_app, run_app_with_metrics, AppError, InputAction, InputSnapshot, LoopConfig,
    LoopMetricsSnapshot, MetricsHandle, Scene, SceneCommand, SceneContext,
};
pub use image_keys::ImageKeyError;

pub const ROOT_ENV_VAR: &str = "JUMPER_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub sprites_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: PathBuf) -> Self {
        let assets_dir = root.join("assets");
        Self {
            maps_dir: assets_dir.join("maps"),
            sprites_dir: assets_dir.join("sprites"),
            assets_dir,
            root,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("JUMPER_ROOT could not be read: {0}")]
    RootVarUnreadable(#[source] env::VarError),
    #[error("executable location unavailable: {0}")]
    ExecutableUnknown(#[source] std::io::Error),
    #[error("JUMPER_ROOT={} has no Cargo.toml and assets/ directory", .path.display())]
    RootVarNotAProject { path: PathBuf },
    #[error(
        "no Cargo.toml with an assets/ directory above {}; set JUMPER_ROOT to the jumper checkout",
        .searched_from.display()
    )]
    ProjectRootMissing { searched_from: PathBuf },
}

/// Resolves the project root from `JUMPER_ROOT`, or by searching upward from the executable.
pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = match env::var(ROOT_ENV_VAR) {
        Ok(value) => root_from_env(PathBuf::from(value))?,
        Err(env::VarError::NotPresent) => {
            let executable = env::current_exe().map_err(StartupError::ExecutableUnknown)?;
            let searched_from = executable
                .parent()
                .unwrap_or(executable.as_path())
                .to_path_buf();
            search_upward(&searched_from)
                .ok_or(StartupError::ProjectRootMissing { searched_from })?
        }
        Err(error) => return Err(StartupError::RootVarUnreadable(error)),
    };
    Ok(AppPaths::from_root(root))
}

fn root_from_env(value: PathBuf) -> Result<PathBuf, StartupError> {
    let path = canonical_or_raw(&value);
    if looks_like_project(&path) {
        Ok(path)
    } else {
        Err(StartupError::RootVarNotAProject { path })
    }
}

fn search_upward(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| looks_like_project(dir))
        .map(canonical_or_raw)
}

fn looks_like_project(dir: &Path) -> bool {
    dir.join("Cargo.toml").is_file() && dir.join("assets").is_dir()
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
