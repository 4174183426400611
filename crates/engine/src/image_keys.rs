use std::path::Component;
use std::path::Path;

use thiserror::Error;

/// Why a key cannot name an image in the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageKeyError {
    #[error("image key is empty")]
    Empty,
    #[error("image key '{key}' must be relative to the sprites directory")]
    NotRelative { key: String },
    #[error("image key '{key}' leaves the sprites directory")]
    EscapesSpritesDir { key: String },
    #[error("image key '{key}' must not carry a file extension")]
    HasExtension { key: String },
    #[error("image key '{key}' contains '{character}'")]
    InvalidCharacter { key: String, character: char },
}

/// A key names `<sprites_dir>/<key>.png` and doubles as the lookup name in the store, so
/// it stays inside the sprites directory and uses one spelling: lowercase ascii, digits,
/// `_`, `-` and `/` separators.
pub(crate) fn validate_image_key(key: &str) -> Result<(), ImageKeyError> {
    if key.is_empty() {
        return Err(ImageKeyError::Empty);
    }
    let owned = || key.to_string();
    if key.starts_with('/') || key.contains('\\') {
        return Err(ImageKeyError::NotRelative { key: owned() });
    }
    if Path::new(key)
        .components()
        .any(|part| matches!(part, Component::ParentDir))
    {
        return Err(ImageKeyError::EscapesSpritesDir { key: owned() });
    }
    if key.contains('.') {
        return Err(ImageKeyError::HasExtension { key: owned() });
    }
    let allowed = |ch: char| ch.is_ascii_lowercase() || ch.is_ascii_digit() || "_-/".contains(ch);
    match key.chars().find(|&ch| !allowed(ch)) {
        Some(character) => Err(ImageKeyError::InvalidCharacter {
            key: owned(),
            character,
        }),
        None => Ok(()),
    }
}
