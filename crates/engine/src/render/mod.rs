mod camera;
mod debug;
mod frame;
mod parallax;
mod particles;
mod presenter;
mod recording;
mod software;
mod sorted_view;
mod surface;
mod transform;

pub use camera::{Camera2D, ViewProjection};
pub use debug::{BoundsDebugRenderer, NoDebugRenderer, PhysicsDebugRenderer};
pub use frame::{FrameRenderer, FrameStats, VISUAL_VERTICAL_OFFSET};
pub use parallax::{draw_with_parallax, parallax_camera_x, ParallaxScope};
pub use particles::{ParticleEffect, SparkBurst};
pub use presenter::WindowPresenter;
pub use recording::{DrawCommand, RecordingSurface};
pub use software::{ImageLoadError, ImageStore, LoadedImage, SoftwareSurface};
pub use sorted_view::SortedEntityView;
pub use surface::{BlendFactor, BlendFunction, DrawSession, DrawSurface};
pub use transform::{ndc_to_screen, screen_to_ndc, Viewport};
