use crate::ecs::{Rect, Vec2};

use super::surface::{BlendFunction, DrawSurface};

/// A particle effect attached to an entity. `draw` both advances and renders the effect; it
/// may change the surface blend function and is not required to restore it.
pub trait ParticleEffect {
    fn draw(&mut self, surface: &mut dyn DrawSurface, origin: Vec2, delta_seconds: f32);
    fn is_finished(&self) -> bool;
}

const SPARK_SIZE: f32 = 0.125;
const SPARK_GRAVITY: f32 = -9.0;

#[derive(Debug, Clone, Copy)]
struct Spark {
    offset: Vec2,
    velocity: Vec2,
}

/// Radial burst of additive squares that fades out over `lifetime` seconds.
#[derive(Debug, Clone)]
pub struct SparkBurst {
    sparks: Vec<Spark>,
    color: [u8; 3],
    elapsed: f32,
    lifetime: f32,
}

impl SparkBurst {
    pub fn new(count: usize, speed: f32, lifetime: f32, color: [u8; 3]) -> Self {
        let count = count.max(1);
        let sparks = (0..count)
            .map(|index| {
                let angle = index as f32 / count as f32 * std::f32::consts::TAU;
                Spark {
                    offset: Vec2::ZERO,
                    velocity: Vec2::new(angle.cos() * speed, angle.sin() * speed),
                }
            })
            .collect();
        Self {
            sparks,
            color,
            elapsed: 0.0,
            lifetime: lifetime.max(f32::EPSILON),
        }
    }

    pub fn spark_count(&self) -> usize {
        self.sparks.len()
    }

    fn alpha(&self) -> u8 {
        let remaining = (1.0 - self.elapsed / self.lifetime).clamp(0.0, 1.0);
        (remaining * 255.0).round() as u8
    }
}

impl ParticleEffect for SparkBurst {
    fn draw(&mut self, surface: &mut dyn DrawSurface, origin: Vec2, delta_seconds: f32) {
        if self.is_finished() {
            return;
        }
        let dt = if delta_seconds.is_finite() {
            delta_seconds.max(0.0)
        } else {
            0.0
        };
        self.elapsed += dt;
        for spark in &mut self.sparks {
            spark.velocity.y += SPARK_GRAVITY * dt;
            spark.offset.x += spark.velocity.x * dt;
            spark.offset.y += spark.velocity.y * dt;
        }
        if self.is_finished() {
            return;
        }

        let [r, g, b] = self.color;
        let color = [r, g, b, self.alpha()];
        surface.set_blend_function(BlendFunction::ADDITIVE);
        for spark in &self.sparks {
            surface.fill_rect(
                Rect::new(
                    origin.x + spark.offset.x - SPARK_SIZE * 0.5,
                    origin.y + spark.offset.y - SPARK_SIZE * 0.5,
                    SPARK_SIZE,
                    SPARK_SIZE,
                ),
                color,
            );
        }
    }

    fn is_finished(&self) -> bool {
        self.elapsed >= self.lifetime
    }
}
