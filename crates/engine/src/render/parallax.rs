use super::camera::Camera2D;
use super::surface::DrawSurface;

/// Camera x to use while drawing a layer with the given parallax factor, or `None` when the
/// layer draws with the unmodified camera.
///
/// The shift only starts once the camera has scrolled past its initial half-viewport
/// position, so every layer lines up at the left edge of the map.
pub fn parallax_camera_x(camera_x: f32, min_width: f32, factor: f32) -> Option<f32> {
    if factor == 0.0 || camera_x <= min_width {
        return None;
    }
    Some(camera_x + (min_width - camera_x) * factor)
}

/// Temporarily shifted camera. Dropping the scope puts the camera back where it was and
/// resets the surface projection to the restored camera.
pub struct ParallaxScope<'a> {
    camera: &'a mut Camera2D,
    surface: &'a mut dyn DrawSurface,
    original_x: f32,
}

impl<'a> ParallaxScope<'a> {
    pub fn enter(
        camera: &'a mut Camera2D,
        surface: &'a mut dyn DrawSurface,
        factor: f32,
    ) -> Result<Self, (&'a mut Camera2D, &'a mut dyn DrawSurface)> {
        let min_width = camera.viewport_width * 0.5;
        let Some(shifted_x) = parallax_camera_x(camera.position.x, min_width, factor) else {
            return Err((camera, surface));
        };
        let original_x = camera.position.x;
        camera.position.x = shifted_x;
        camera.update();
        surface.set_projection(camera.combined());
        Ok(Self {
            camera,
            surface,
            original_x,
        })
    }

    pub fn surface(&mut self) -> &mut dyn DrawSurface {
        &mut *self.surface
    }
}

impl Drop for ParallaxScope<'_> {
    fn drop(&mut self) {
        self.camera.position.x = self.original_x;
        self.camera.update();
        self.surface.set_projection(self.camera.combined());
    }
}

/// Runs `draw` with the camera shifted by `factor`. Returns whether a shift was applied.
pub fn draw_with_parallax<F>(
    camera: &mut Camera2D,
    surface: &mut dyn DrawSurface,
    factor: f32,
    draw: F,
) -> bool
where
    F: FnOnce(&mut dyn DrawSurface),
{
    match ParallaxScope::enter(camera, surface, factor) {
        Ok(mut scope) => {
            draw(scope.surface());
            true
        }
        Err((_, surface)) => {
            draw(surface);
            false
        }
    }
}
