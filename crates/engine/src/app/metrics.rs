use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::render::FrameStats;

static SNAPSHOT_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn note_snapshot_poisoned(operation: &'static str) {
    if !SNAPSHOT_POISON_WARNED.swap(true, Ordering::Relaxed) {
        warn!(operation, "loop_metrics_lock_poisoned");
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    pub tps: f32,
    pub frame_time_ms: f32,
    /// Stats of the last frame rendered in the interval.
    pub last_frame: FrameStats,
    /// Frames in the interval that skipped at least one entity without an image.
    pub frames_with_missing_visuals: u32,
}

/// Shared read side of the loop metrics, e.g. for a debug title or an external monitor.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        let guard = self.latest.read().unwrap_or_else(|poisoned| {
            note_snapshot_poisoned("read");
            poisoned.into_inner()
        });
        *guard
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut guard = self.latest.write().unwrap_or_else(|poisoned| {
            note_snapshot_poisoned("write");
            poisoned.into_inner()
        });
        *guard = snapshot;
    }
}

#[derive(Debug, Default)]
struct IntervalCounters {
    frames: u32,
    ticks: u32,
    frame_time_total: Duration,
    frames_with_missing_visuals: u32,
}

/// Collects per-frame and per-tick counts and turns them into a snapshot once per interval.
#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    started_at: Instant,
    interval: Duration,
    counters: IntervalCounters,
    last_frame: FrameStats,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            interval,
            counters: IntervalCounters::default(),
            last_frame: FrameStats::default(),
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, stats: FrameStats) {
        let counters = &mut self.counters;
        counters.frames = counters.frames.saturating_add(1);
        counters.frame_time_total = counters.frame_time_total.saturating_add(frame_dt);
        if stats.missing_visuals > 0 {
            counters.frames_with_missing_visuals =
                counters.frames_with_missing_visuals.saturating_add(1);
        }
        self.last_frame = stats;
    }

    pub(crate) fn record_tick(&mut self) {
        self.counters.ticks = self.counters.ticks.saturating_add(1);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed < self.interval {
            return None;
        }

        let counters = std::mem::take(&mut self.counters);
        self.started_at = now;

        let seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = match counters.frames {
            0 => 0.0,
            frames => counters.frame_time_total.as_secs_f32() * 1000.0 / frames as f32,
        };
        Some(LoopMetricsSnapshot {
            fps: counters.frames as f32 / seconds,
            tps: counters.ticks as f32 / seconds,
            frame_time_ms,
            last_frame: self.last_frame,
            frames_with_missing_visuals: counters.frames_with_missing_visuals,
        })
    }
}
