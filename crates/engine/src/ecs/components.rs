use std::cmp::Ordering;
use std::fmt;

use super::world::{Rect, Vec2};
use crate::render::ParticleEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u32);

/// Physics-side placement of an entity. `interpolated_position` is what gets drawn; it is
/// seeded with `position` so it is valid before the first interpolation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialComponent {
    pub position: Vec2,
    pub previous_position: Vec2,
    pub interpolated_position: Vec2,
    pub size: Vec2,
}

impl SpatialComponent {
    pub fn new(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            previous_position: position,
            interpolated_position: position,
            size,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, self.size.x, self.size.y)
    }

    pub fn draw_order_key(&self) -> f32 {
        self.position.y
    }

    pub fn cmp_draw_order(&self, other: &SpatialComponent) -> Ordering {
        self.draw_order_key().total_cmp(&other.draw_order_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualComponent {
    pub image: Option<ImageHandle>,
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
}

impl VisualComponent {
    pub fn new(image: ImageHandle, width: f32, height: f32) -> Self {
        Self {
            image: Some(image),
            position: Vec2::ZERO,
            width,
            height,
        }
    }

    pub fn without_image(width: f32, height: f32) -> Self {
        Self {
            image: None,
            position: Vec2::ZERO,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthComponent {
    pub current: f32,
    pub max: f32,
}

impl HealthComponent {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }
}

pub struct ParticleComponent {
    pub effect: Box<dyn ParticleEffect>,
}

impl ParticleComponent {
    pub fn new(effect: impl ParticleEffect + 'static) -> Self {
        Self {
            effect: Box::new(effect),
        }
    }
}

impl fmt::Debug for ParticleComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleComponent")
            .field("finished", &self.effect.is_finished())
            .finish()
    }
}
