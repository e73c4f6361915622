use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use super::input::ActionStates;
use super::metrics::MetricsAccumulator;
use super::{InputAction, InputSnapshot, MetricsHandle, Renderer, Scene, SceneCommand, Vec2};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "lemsim".to_string(),
            window_width: 1280,
            window_height: 720,
            target_tps: 30,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 8,
            metrics_log_interval: Duration::from_secs(5),
            max_render_fps: Some(60),
        }
    }
}

impl LoopConfig {
    /// Nominal fixed step before any fast-forward.
    pub fn base_tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps.max(1) as f64)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, scene: Box<dyn Scene>) -> Result<(), AppError> {
    run_app_with_metrics(config, scene, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    mut scene: Box<dyn Scene>,
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
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let base_tick_interval = config.base_tick_interval();
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let initial_size = window.inner_size();
    let mut input_collector = InputCollector::new(initial_size.width, initial_size.height);

    scene.load();
    info!(
        target_tps = config.target_tps,
        base_tick_ms = base_tick_interval.as_secs_f32() * 1000.0,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut last_applied_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => input_collector.clear_cursor_position(),
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    input_collector.handle_mouse_wheel(delta);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_physical_key(
                        event.physical_key,
                        event.state == ElementState::Pressed,
                    );
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    accumulator =
                        accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

                    let fixed_dt = scene.tick_interval(base_tick_interval);
                    let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                    for _ in 0..step_plan.ticks_to_run {
                        let input_snapshot = input_collector.snapshot_for_tick();
                        match scene.update(fixed_dt, &input_snapshot) {
                            SceneCommand::None => {}
                            SceneCommand::Restart => {
                                scene.unload();
                                scene.load();
                                info!("scene_restarted");
                            }
                            SceneCommand::Quit => {
                                info!(reason = "scene_quit", "shutdown_requested");
                                window_target.exit();
                                break;
                            }
                        }
                    }
                    metrics_accumulator.record_ticks(step_plan.ticks_to_run, fixed_dt);
                    accumulator = step_plan.remaining_accumulator;

                    if step_plan.dropped_backlog > Duration::ZERO {
                        metrics_accumulator.record_clamp(step_plan.dropped_backlog);
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame, "sim_clamp_triggered"
                        );
                    }

                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    if let Err(error) = renderer.render(&scene.render_view()) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    let next_title = scene.debug_title();
                    if next_title != last_applied_title {
                        window.set_title(next_title.as_deref().unwrap_or(&config.window_title));
                        last_applied_title = next_title;
                    }
                    metrics_accumulator.record_frame(raw_frame_dt);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            sim_speed = snapshot.sim_speed,
                            clamped_frames = snapshot.clamped_frames,
                            dropped_backlog_ms = snapshot.dropped_backlog_ms,
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            Event::LoopExiting => {
                scene.unload();
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Folds window events into per-tick snapshots. Press edges are held until
/// the next tick consumes them, so a press between ticks is never lost.
#[derive(Debug, Default)]
struct InputCollector {
    action_states: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_mouse_is_down: bool,
    left_click_pressed_edge: bool,
    right_mouse_is_down: bool,
    right_click_pressed_edge: bool,
    pending_scroll_steps: i32,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(
            self.action_states,
            self.cursor_position_px,
            self.left_mouse_is_down,
            self.right_mouse_is_down,
            self.left_click_pressed_edge,
            self.right_click_pressed_edge,
            self.pending_scroll_steps,
            (self.window_width, self.window_height),
        );
        self.action_states.clear_edges();
        self.left_click_pressed_edge = false;
        self.right_click_pressed_edge = false;
        self.pending_scroll_steps = 0;
        snapshot
    }

    fn handle_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        if let Some(action) = action_for_key(key) {
            self.action_states.set(action, is_pressed);
        }
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn set_cursor_position_px(&mut self, x: f32, y: f32) {
        self.cursor_position_px = Some(Vec2 { x, y });
    }

    fn clear_cursor_position(&mut self) {
        self.cursor_position_px = None;
    }

    fn handle_mouse_wheel(&mut self, delta: MouseScrollDelta) {
        let steps = scroll_steps_from_delta(delta);
        self.pending_scroll_steps = self.pending_scroll_steps.saturating_add(steps);
    }

    fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        let (is_down, pressed_edge) = match button {
            MouseButton::Left => (&mut self.left_mouse_is_down, &mut self.left_click_pressed_edge),
            MouseButton::Right => (
                &mut self.right_mouse_is_down,
                &mut self.right_click_pressed_edge,
            ),
            _ => return,
        };
        match state {
            ElementState::Pressed => {
                if !*is_down {
                    *pressed_edge = true;
                }
                *is_down = true;
            }
            ElementState::Released => *is_down = false,
        }
    }
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let action = match code {
        KeyCode::KeyA | KeyCode::ArrowLeft => InputAction::ScrollLeft,
        KeyCode::KeyD | KeyCode::ArrowRight => InputAction::ScrollRight,
        KeyCode::KeyW | KeyCode::ArrowUp => InputAction::ScrollUp,
        KeyCode::KeyS | KeyCode::ArrowDown => InputAction::ScrollDown,
        KeyCode::Tab => InputAction::TogglePaintMode,
        KeyCode::BracketRight => InputAction::BrushGrow,
        KeyCode::BracketLeft => InputAction::BrushShrink,
        KeyCode::KeyP => InputAction::Pause,
        KeyCode::KeyF => InputAction::FastForward,
        KeyCode::KeyN => InputAction::Nuke,
        KeyCode::Equal | KeyCode::NumpadAdd => InputAction::ReleaseFaster,
        KeyCode::Minus | KeyCode::NumpadSubtract => InputAction::ReleaseSlower,
        KeyCode::F3 => InputAction::ToggleRegions,
        KeyCode::F5 => InputAction::QuickSave,
        KeyCode::F9 => InputAction::QuickLoad,
        KeyCode::KeyR => InputAction::Restart,
        KeyCode::Escape => InputAction::Quit,
        KeyCode::Digit1 => InputAction::SelectTool(0),
        KeyCode::Digit2 => InputAction::SelectTool(1),
        KeyCode::Digit3 => InputAction::SelectTool(2),
        KeyCode::Digit4 => InputAction::SelectTool(3),
        KeyCode::Digit5 => InputAction::SelectTool(4),
        KeyCode::Digit6 => InputAction::SelectTool(5),
        KeyCode::Digit7 => InputAction::SelectTool(6),
        KeyCode::Digit8 => InputAction::SelectTool(7),
        _ => return None,
    };
    Some(action)
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
    if fixed_dt.is_zero() {
        return StepPlan {
            ticks_to_run: 0,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        };
    }
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
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

fn scroll_steps_from_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => {
            let dominant = if x.abs() > y.abs() { x } else { y };
            dominant.round() as i32
        }
        MouseScrollDelta::PixelDelta(position) => {
            let dominant = if position.x.abs() > position.y.abs() {
                position.x
            } else {
                position.y
            };
            if dominant > 0.0 {
                1
            } else if dominant < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let result = plan_sim_steps(Duration::from_millis(99), Duration::from_millis(33), 8);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let result = plan_sim_steps(Duration::from_millis(120), Duration::from_millis(16), 3);
        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn shorter_fast_forward_step_runs_more_ticks() {
        let config = LoopConfig::default();
        let base = config.base_tick_interval();
        let normal = plan_sim_steps(base * 2, base, 8);
        let fast = plan_sim_steps(base * 2, base / 4, 8);
        assert_eq!(normal.ticks_to_run, 2);
        assert_eq!(fast.ticks_to_run, 8);
    }

    #[test]
    fn zero_step_never_loops() {
        let result = plan_sim_steps(Duration::from_millis(50), Duration::ZERO, 8);
        assert_eq!(result.ticks_to_run, 0);
        assert_eq!(result.dropped_backlog, Duration::from_millis(50));
    }

    #[test]
    fn key_press_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_physical_key(PhysicalKey::Code(KeyCode::KeyP), true);

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.was_pressed(InputAction::Pause));
        assert!(!second.was_pressed(InputAction::Pause));
        assert!(second.is_down(InputAction::Pause));
    }

    #[test]
    fn held_key_does_not_repeat_press_edges() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_physical_key(PhysicalKey::Code(KeyCode::KeyN), true);
        assert!(input.snapshot_for_tick().was_pressed(InputAction::Nuke));
        input.handle_physical_key(PhysicalKey::Code(KeyCode::KeyN), true);
        assert!(!input.snapshot_for_tick().was_pressed(InputAction::Nuke));
        input.handle_physical_key(PhysicalKey::Code(KeyCode::KeyN), false);
        input.handle_physical_key(PhysicalKey::Code(KeyCode::KeyN), true);
        assert!(input.snapshot_for_tick().was_pressed(InputAction::Nuke));
    }

    #[test]
    fn number_keys_select_tool_slots() {
        assert_eq!(
            action_for_key(PhysicalKey::Code(KeyCode::Digit1)),
            Some(InputAction::SelectTool(0))
        );
        assert_eq!(
            action_for_key(PhysicalKey::Code(KeyCode::Digit8)),
            Some(InputAction::SelectTool(7))
        );
        assert_eq!(action_for_key(PhysicalKey::Code(KeyCode::Digit9)), None);
    }

    #[test]
    fn arrows_and_ad_both_scroll() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_physical_key(PhysicalKey::Code(KeyCode::ArrowLeft), true);
        input.handle_physical_key(PhysicalKey::Code(KeyCode::KeyD), true);
        let snapshot = input.snapshot_for_tick();
        assert!(snapshot.is_down(InputAction::ScrollLeft));
        assert!(snapshot.is_down(InputAction::ScrollRight));
    }

    #[test]
    fn left_click_edge_is_single_tick_but_hold_persists() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_mouse_input(MouseButton::Left, ElementState::Pressed);
        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.left_click_pressed());
        assert!(!second.left_click_pressed());
        assert!(second.left_mouse_down());

        input.handle_mouse_input(MouseButton::Left, ElementState::Released);
        assert!(!input.snapshot_for_tick().left_mouse_down());
    }

    #[test]
    fn right_click_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_mouse_input(MouseButton::Right, ElementState::Pressed);
        assert!(input.snapshot_for_tick().right_click_pressed());
        assert!(!input.snapshot_for_tick().right_click_pressed());
    }

    #[test]
    fn snapshot_carries_cursor_and_window_size() {
        let mut input = InputCollector::new(1280, 720);
        input.set_cursor_position_px(100.0, 200.0);
        let snapshot = input.snapshot_for_tick();

        assert_eq!(snapshot.window_size(), (1280, 720));
        let cursor = snapshot.cursor_position_px().expect("cursor");
        assert!((cursor.x - 100.0).abs() < 0.0001);
        assert!((cursor.y - 200.0).abs() < 0.0001);
    }

    #[test]
    fn mouse_wheel_accumulates_and_snapshot_resets_pending() {
        let mut input = InputCollector::new(1280, 720);
        input.handle_mouse_wheel(MouseScrollDelta::LineDelta(0.0, 1.0));
        input.handle_mouse_wheel(MouseScrollDelta::LineDelta(0.0, -3.0));

        assert_eq!(input.snapshot_for_tick().scroll_steps(), -2);
        assert_eq!(input.snapshot_for_tick().scroll_steps(), 0);
    }

    #[test]
    fn pixel_wheel_delta_maps_to_single_step() {
        let positive = scroll_steps_from_delta(MouseScrollDelta::PixelDelta(
            winit::dpi::PhysicalPosition::new(4.0, 1.0),
        ));
        let negative = scroll_steps_from_delta(MouseScrollDelta::PixelDelta(
            winit::dpi::PhysicalPosition::new(0.0, -5.0),
        ));
        assert_eq!(positive, 1);
        assert_eq!(negative, -1);
    }

    #[test]
    fn render_cap_helpers() {
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(target_frame_duration(None), None);
        let target = target_frame_duration(Some(60));
        assert_eq!(compute_cap_sleep(Duration::from_millis(20), target), Duration::ZERO);
        assert!(compute_cap_sleep(Duration::from_millis(5), target) > Duration::ZERO);
    }
}
