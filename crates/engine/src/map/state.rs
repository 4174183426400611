use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::catalog::TileLayerCatalog;
use super::model::TiledMap;

static MAP_CHANGE_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_map_change_lock_poison_once(operation: &'static str) {
    if MAP_CHANGE_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "map change lock poisoned; recovered inner value");
    }
}

/// Publishes map changes to a renderer. The newest published map wins; the renderer picks
/// it up at the start of its next frame, never in the middle of one.
#[derive(Clone, Debug, Default)]
pub struct MapChangeHandle {
    pending: Arc<Mutex<Option<Arc<TiledMap>>>>,
}

impl MapChangeHandle {
    pub fn publish(&self, map: Arc<TiledMap>) {
        match self.pending.lock() {
            Ok(mut guard) => *guard = Some(map),
            Err(poisoned) => {
                warn_map_change_lock_poison_once("publish");
                *poisoned.into_inner() = Some(map);
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        match self.pending.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => {
                warn_map_change_lock_poison_once("has_pending");
                poisoned.into_inner().is_some()
            }
        }
    }

    pub(crate) fn take_pending(&self) -> Option<Arc<TiledMap>> {
        match self.pending.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => {
                warn_map_change_lock_poison_once("take");
                poisoned.into_inner().take()
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum MapState {
    #[default]
    NoMap,
    MapLoaded(Arc<TileLayerCatalog>),
}

impl MapState {
    pub fn catalog(&self) -> Option<&Arc<TileLayerCatalog>> {
        match self {
            MapState::NoMap => None,
            MapState::MapLoaded(catalog) => Some(catalog),
        }
    }

    /// Swaps in a pending map, if any. Returns `true` when the state changed.
    pub fn apply_pending(&mut self, handle: &MapChangeHandle) -> bool {
        let Some(map) = handle.take_pending() else {
            return false;
        };
        let catalog = TileLayerCatalog::build(map);
        info!(
            map = catalog.map().name.as_str(),
            background_layers = catalog.background_count(),
            foreground_layers = catalog.foreground_count(),
            "map_changed"
        );
        *self = MapState::MapLoaded(Arc::new(catalog));
        true
    }
}

/// Base time for animated tiles, advanced by frame deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileAnimationClock {
    base_time_ms: u64,
    remainder_us: u64,
}

impl TileAnimationClock {
    pub fn advance(&mut self, delta_seconds: f32) {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return;
        }
        let total_us = self.remainder_us + (delta_seconds as f64 * 1_000_000.0) as u64;
        self.base_time_ms = self.base_time_ms.saturating_add(total_us / 1000);
        self.remainder_us = total_us % 1000;
    }

    pub fn base_time_ms(&self) -> u64 {
        self.base_time_ms
    }
}
