use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use super::software::SoftwareSurface;
use super::transform::Viewport;

/// Copies a finished [`SoftwareSurface`] frame into the window through `pixels`.
pub struct WindowPresenter {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl WindowPresenter {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    /// Presents `surface`. A frame whose size no longer matches the window (mid-resize) is
    /// skipped.
    pub fn present(&mut self, surface: &SoftwareSurface) -> Result<(), Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }
        let frame = self.pixels.frame_mut();
        if surface.viewport() != self.viewport || frame.len() != surface.frame().len() {
            return Ok(());
        }
        frame.copy_from_slice(surface.frame());
        self.pixels.render()
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }
}
