use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

use crate::ecs::World;
use crate::map::MapChangeHandle;
use crate::render::{
    BoundsDebugRenderer, Camera2D, FrameRenderer, FrameStats, ImageStore, NoDebugRenderer,
    SoftwareSurface, WindowPresenter,
};

use super::input::ActionStates;
use super::metrics::MetricsAccumulator;
use super::scene::SceneRuntime;
use super::{InputAction, InputSnapshot, MetricsHandle, Scene, SceneCommand};

const CLEAR_COLOR: [u8; 4] = [28, 30, 44, 255];

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Window pixels per world unit (one tile).
    pub pixels_per_unit: f32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    pub damage_pool_capacity: usize,
    pub show_physics_debug: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "Jumper".to_string(),
            window_width: 1280,
            window_height: 720,
            pixels_per_unit: 48.0,
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_render_fps: None,
            damage_pool_capacity: 64,
            show_physics_debug: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to create pixel buffer for the window: {0}")]
    CreatePresenter(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    images: ImageStore,
) -> Result<(), AppError> {
    run_app_with_metrics(config, scene, images, MetricsHandle::default())
}

/// Opens the window and drives `scene` until the window closes, Escape is pressed or the
/// scene returns `SceneCommand::Quit`.
pub fn run_app_with_metrics(
    config: LoopConfig,
    scene: Box<dyn Scene>,
    images: ImageStore,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let presenter =
        WindowPresenter::new(Arc::clone(&window)).map_err(AppError::CreatePresenter)?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut host = HostLoop::new(&config, window, presenter, scene, images, metrics_handle);
    host.start();

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == host.window.id() => {
                if host.handle_window_event(event) == LoopControl::Exit {
                    window_target.exit();
                }
            }
            Event::AboutToWait => host.window.request_redraw(),
            Event::LoopExiting => host.shutdown(),
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Exit,
}

/// `LoopConfig` timing with zero and non-finite values replaced by defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LoopTiming {
    fixed_dt: Duration,
    max_frame_delta: Duration,
    max_ticks_per_frame: u32,
    metrics_log_interval: Duration,
    pixels_per_unit: f32,
    render_fps_cap: Option<u32>,
}

impl LoopTiming {
    fn from_config(config: &LoopConfig) -> Self {
        let target_tps = config.target_tps.max(1);
        Self {
            fixed_dt: Duration::from_secs_f64(1.0 / target_tps as f64),
            max_frame_delta: normalize_non_zero_duration(
                config.max_frame_delta,
                Duration::from_millis(250),
            ),
            max_ticks_per_frame: config.max_ticks_per_frame.max(1),
            metrics_log_interval: normalize_non_zero_duration(
                config.metrics_log_interval,
                Duration::from_secs(1),
            ),
            pixels_per_unit: normalize_pixels_per_unit(config.pixels_per_unit),
            render_fps_cap: normalize_render_fps_cap(config.max_render_fps),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FrameAdvance {
    raw_dt: Duration,
    clamped_dt: Duration,
    plan: StepPlan,
}

/// Fixed-step accumulator turning wall-clock frame time into simulation ticks.
#[derive(Debug)]
struct FrameClock {
    timing: LoopTiming,
    accumulator: Duration,
    last_frame: Instant,
}

impl FrameClock {
    fn new(timing: LoopTiming, now: Instant) -> Self {
        Self {
            timing,
            accumulator: Duration::ZERO,
            last_frame: now,
        }
    }

    fn advance(&mut self, now: Instant) -> FrameAdvance {
        let raw_dt = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        let clamped_dt = clamp_frame_delta(raw_dt, self.timing.max_frame_delta);
        let plan = plan_sim_steps(
            self.accumulator.saturating_add(clamped_dt),
            self.timing.fixed_dt,
            self.timing.max_ticks_per_frame,
        );
        self.accumulator = plan.remaining_accumulator;
        FrameAdvance {
            raw_dt,
            clamped_dt,
            plan,
        }
    }

    fn alpha(&self) -> f32 {
        interpolation_alpha(self.accumulator, self.timing.fixed_dt)
    }
}

#[derive(Debug)]
struct RenderPacer {
    frame_target: Option<Duration>,
    last_present: Instant,
}

impl RenderPacer {
    fn new(render_fps_cap: Option<u32>, now: Instant) -> Self {
        Self {
            frame_target: target_frame_duration(render_fps_cap),
            last_present: now,
        }
    }

    fn wait_for_slot(&self) {
        let elapsed = Instant::now().saturating_duration_since(self.last_present);
        let sleep = compute_cap_sleep(elapsed, self.frame_target);
        if sleep > Duration::ZERO {
            thread::sleep(sleep);
        }
    }

    fn mark_presented(&mut self, now: Instant) {
        self.last_present = now;
    }
}

/// Everything the event loop closure owns between events.
struct HostLoop {
    window: Arc<Window>,
    window_title: String,
    presenter: WindowPresenter,
    surface: SoftwareSurface,
    renderer: FrameRenderer,
    map_change: MapChangeHandle,
    runtime: SceneRuntime,
    input: InputCollector,
    timing: LoopTiming,
    clock: FrameClock,
    pacer: RenderPacer,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
    physics_debug_visible: bool,
    applied_title: Option<String>,
}

impl HostLoop {
    fn new(
        config: &LoopConfig,
        window: Arc<Window>,
        presenter: WindowPresenter,
        scene: Box<dyn Scene>,
        images: ImageStore,
        metrics_handle: MetricsHandle,
    ) -> Self {
        let timing = LoopTiming::from_config(config);
        let viewport = presenter.viewport();
        let mut camera = Camera2D::default();
        fit_camera_to_window(&mut camera, viewport.width, viewport.height, timing.pixels_per_unit);
        let mut renderer = FrameRenderer::new(camera);
        apply_physics_debug(&mut renderer, config.show_physics_debug);
        let map_change = renderer.map_change_handle();
        let now = Instant::now();

        Self {
            window,
            window_title: config.window_title.clone(),
            surface: SoftwareSurface::new(viewport.width, viewport.height, images),
            presenter,
            renderer,
            map_change,
            runtime: SceneRuntime::new(scene, config.damage_pool_capacity),
            input: InputCollector::default(),
            timing,
            clock: FrameClock::new(timing, now),
            pacer: RenderPacer::new(timing.render_fps_cap, now),
            metrics: MetricsAccumulator::new(timing.metrics_log_interval),
            metrics_handle,
            physics_debug_visible: config.show_physics_debug,
            applied_title: None,
        }
    }

    fn start(&mut self) {
        self.runtime.load(self.renderer.camera_mut(), &self.map_change);
        info!(
            fixed_dt_ms = self.timing.fixed_dt.as_secs_f64() * 1000.0,
            max_frame_delta_ms = self.timing.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame = self.timing.max_ticks_per_frame,
            metrics_log_interval_ms = self.timing.metrics_log_interval.as_millis() as u64,
            pixels_per_unit = self.timing.pixels_per_unit,
            render_fps_cap = %format_render_cap(self.timing.render_fps_cap),
            physics_debug_visible = self.physics_debug_visible,
            "loop_config"
        );
    }

    fn shutdown(&mut self) {
        self.runtime.unload(self.renderer.camera_mut(), &self.map_change);
        info!("shutdown");
    }

    fn handle_window_event(&mut self, event: WindowEvent) -> LoopControl {
        match event {
            WindowEvent::CloseRequested => {
                self.input.mark_quit_requested();
                info!(reason = "window_close", "shutdown_requested");
                LoopControl::Exit
            }
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::KeyboardInput { event, .. } => {
                self.input.handle_keyboard_input(&event);
                if self.input.quit_requested {
                    info!(reason = "escape_key", "shutdown_requested");
                    return LoopControl::Exit;
                }
                LoopControl::Continue
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => LoopControl::Continue,
        }
    }

    fn resize(&mut self, width: u32, height: u32) -> LoopControl {
        if let Err(error) = self.presenter.resize(width, height) {
            warn!(error = %error, "presenter_resize_failed");
            return LoopControl::Exit;
        }
        let viewport = self.presenter.viewport();
        self.surface.resize(viewport.width, viewport.height);
        fit_camera_to_window(
            self.renderer.camera_mut(),
            viewport.width,
            viewport.height,
            self.timing.pixels_per_unit,
        );
        LoopControl::Continue
    }

    fn redraw(&mut self) -> LoopControl {
        if self.input.take_debug_toggle_pressed() {
            self.physics_debug_visible = !self.physics_debug_visible;
            apply_physics_debug(&mut self.renderer, self.physics_debug_visible);
            info!(physics_debug_visible = self.physics_debug_visible, "physics_debug_toggled");
        }

        let now = Instant::now();
        let advance = self.clock.advance(now);
        let mut control = self.run_ticks(advance.plan.ticks_to_run);
        if advance.plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = advance.plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame = self.timing.max_ticks_per_frame,
                "sim_clamp_triggered"
            );
        }

        self.pacer.wait_for_slot();
        let frame_stats = render_frame(
            &mut self.renderer,
            self.runtime.world_mut(),
            &mut self.surface,
            self.clock.alpha(),
            advance.clamped_dt.as_secs_f32(),
        );
        if let Err(error) = self.presenter.present(&self.surface) {
            warn!(error = %error, "presenter_draw_failed");
            control = LoopControl::Exit;
        }
        self.pacer.mark_presented(Instant::now());

        self.refresh_title();
        self.metrics.record_frame(advance.raw_dt, frame_stats);
        self.publish_metrics(now);
        control
    }

    fn run_ticks(&mut self, ticks: u32) -> LoopControl {
        let fixed_dt_seconds = self.timing.fixed_dt.as_secs_f32();
        for _ in 0..ticks {
            let input = self.input.snapshot_for_tick();
            let command = self.runtime.update(
                fixed_dt_seconds,
                &input,
                self.renderer.camera_mut(),
                &self.map_change,
            );
            self.metrics.record_tick();
            if command == SceneCommand::Quit {
                info!(reason = "scene_command", "shutdown_requested");
                return LoopControl::Exit;
            }
        }
        LoopControl::Continue
    }

    fn refresh_title(&mut self) {
        let title = self.runtime.debug_title();
        if title == self.applied_title {
            return;
        }
        self.window
            .set_title(title.as_deref().unwrap_or(self.window_title.as_str()));
        self.applied_title = title;
    }

    fn publish_metrics(&mut self, now: Instant) {
        let Some(snapshot) = self.metrics.maybe_snapshot(now) else {
            return;
        };
        self.metrics_handle.publish(snapshot);
        info!(
            fps = snapshot.fps,
            tps = snapshot.tps,
            frame_time_ms = snapshot.frame_time_ms,
            entity_count = self.runtime.world().entity_count(),
            entities_drawn = snapshot.last_frame.entities_drawn,
            missing_visuals = snapshot.last_frame.missing_visuals,
            frames_with_missing_visuals = snapshot.frames_with_missing_visuals,
            layers_drawn = snapshot.last_frame.layers_drawn,
            parallax_layers = snapshot.last_frame.parallax_layers,
            damage_records = self.runtime.damage_pool().checked_out_count(),
            "loop_metrics"
        );
    }
}

fn render_frame(
    renderer: &mut FrameRenderer,
    world: &mut World,
    surface: &mut SoftwareSurface,
    alpha: f32,
    frame_dt_seconds: f32,
) -> FrameStats {
    world.interpolate(alpha);
    surface.clear(CLEAR_COLOR);
    renderer.render(frame_dt_seconds, world, surface)
}

fn apply_physics_debug(renderer: &mut FrameRenderer, visible: bool) {
    if visible {
        renderer.set_debug_renderer(Box::new(BoundsDebugRenderer::new(true)));
    } else {
        renderer.set_debug_renderer(Box::new(NoDebugRenderer));
    }
}

/// Sizes the camera viewport in world units so one unit covers `pixels_per_unit` pixels.
fn fit_camera_to_window(camera: &mut Camera2D, width: u32, height: u32, pixels_per_unit: f32) {
    if width == 0 || height == 0 {
        return;
    }
    camera.viewport_width = width as f32 / pixels_per_unit;
    camera.viewport_height = height as f32 / pixels_per_unit;
    camera.position.x = camera.position.x.max(camera.viewport_width * 0.5);
    camera.position.y = camera.position.y.max(camera.viewport_height * 0.5);
    camera.update();
}

#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    action_states: ActionStates,
    jump_is_down: bool,
    jump_pressed_edge: bool,
    attack_is_down: bool,
    attack_pressed_edge: bool,
    debug_toggle_is_down: bool,
    debug_toggle_pressed_edge: bool,
}

impl InputCollector {
    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        let is_pressed = key_event.state == ElementState::Pressed;
        self.update_action_state_from_physical_key(key_event.physical_key, is_pressed);
        self.handle_debug_toggle_key_state(is_debug_toggle_key(key_event), key_event.state);
    }

    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        match key {
            PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
                self.action_states.set(InputAction::MoveLeft, is_pressed);
            }
            PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
                self.action_states.set(InputAction::MoveRight, is_pressed);
            }
            PhysicalKey::Code(KeyCode::Space)
            | PhysicalKey::Code(KeyCode::KeyW)
            | PhysicalKey::Code(KeyCode::ArrowUp) => {
                self.action_states.set(InputAction::Jump, is_pressed);
                if is_pressed && !self.jump_is_down {
                    self.jump_pressed_edge = true;
                }
                self.jump_is_down = is_pressed;
            }
            PhysicalKey::Code(KeyCode::KeyJ) | PhysicalKey::Code(KeyCode::ControlLeft) => {
                self.action_states.set(InputAction::Attack, is_pressed);
                if is_pressed && !self.attack_is_down {
                    self.attack_pressed_edge = true;
                }
                self.attack_is_down = is_pressed;
            }
            PhysicalKey::Code(KeyCode::Escape) => {
                self.action_states.set(InputAction::Quit, is_pressed);
                if is_pressed {
                    self.mark_quit_requested();
                }
            }
            _ => {}
        }
    }

    fn handle_debug_toggle_key_state(&mut self, is_toggle_key: bool, state: ElementState) {
        if !is_toggle_key {
            return;
        }
        match state {
            ElementState::Pressed => {
                if !self.debug_toggle_is_down {
                    self.debug_toggle_pressed_edge = true;
                }
                self.debug_toggle_is_down = true;
            }
            ElementState::Released => self.debug_toggle_is_down = false,
        }
    }

    fn take_debug_toggle_pressed(&mut self) -> bool {
        let was_pressed = self.debug_toggle_pressed_edge;
        self.debug_toggle_pressed_edge = false;
        was_pressed
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.quit_requested,
            self.action_states,
            self.jump_pressed_edge,
            self.attack_pressed_edge,
        );
        self.jump_pressed_edge = false;
        self.attack_pressed_edge = false;
        snapshot
    }
}

fn is_debug_toggle_key(key_event: &KeyEvent) -> bool {
    matches!(key_event.physical_key, PhysicalKey::Code(KeyCode::F3))
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::replace(&mut accumulator, Duration::ZERO)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

/// How far the simulation is between the previous and the current tick, in `0..1`.
fn interpolation_alpha(accumulator: Duration, fixed_dt: Duration) -> f32 {
    if fixed_dt.is_zero() {
        return 1.0;
    }
    (accumulator.as_secs_f32() / fixed_dt.as_secs_f32()).clamp(0.0, 1.0)
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_pixels_per_unit(value: f32) -> f32 {
    if value.is_finite() && value >= 1.0 {
        value
    } else {
        LoopConfig::default().pixels_per_unit
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}
