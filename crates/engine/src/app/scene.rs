use std::time::Duration;

use crate::sim::SimulationWorld;

use super::input::ActionStates;
use super::InputAction;

pub const CAMERA_ZOOM_DEFAULT: u32 = 2;
pub const CAMERA_ZOOM_MIN: u32 = 1;
pub const CAMERA_ZOOM_MAX: u32 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Restart,
    Quit,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_mouse_down: bool,
    right_mouse_down: bool,
    left_click_pressed: bool,
    right_click_pressed: bool,
    scroll_steps: i32,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        actions: ActionStates,
        cursor_position_px: Option<Vec2>,
        left_mouse_down: bool,
        right_mouse_down: bool,
        left_click_pressed: bool,
        right_click_pressed: bool,
        scroll_steps: i32,
        window_size: (u32, u32),
    ) -> Self {
        Self {
            actions,
            cursor_position_px,
            left_mouse_down,
            right_mouse_down,
            left_click_pressed,
            right_click_pressed,
            scroll_steps,
            window_width: window_size.0,
            window_height: window_size.1,
        }
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn was_pressed(&self, action: InputAction) -> bool {
        self.actions.was_pressed(action)
    }

    /// Marks `action` as freshly pressed; used to script input in tests.
    pub fn with_pressed(mut self, action: InputAction) -> Self {
        self.actions.set(action, true);
        self
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_left_click_pressed(mut self, pressed: bool) -> Self {
        self.left_click_pressed = pressed;
        self.left_mouse_down |= pressed;
        self
    }

    pub fn with_right_click_pressed(mut self, pressed: bool) -> Self {
        self.right_click_pressed = pressed;
        self.right_mouse_down |= pressed;
        self
    }

    pub fn with_mouse_down(mut self, left: bool, right: bool) -> Self {
        self.left_mouse_down = left;
        self.right_mouse_down = right;
        self
    }

    pub fn with_scroll_steps(mut self, steps: i32) -> Self {
        self.scroll_steps = steps;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_mouse_down(&self) -> bool {
        self.left_mouse_down
    }

    pub fn right_mouse_down(&self) -> bool {
        self.right_mouse_down
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn right_click_pressed(&self) -> bool {
        self.right_click_pressed
    }

    pub fn scroll_steps(&self) -> i32 {
        self.scroll_steps
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

/// Top-left corner of the view in level pixels plus an integer zoom.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: u32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::default(),
            zoom: CAMERA_ZOOM_DEFAULT,
        }
    }
}

impl Camera2D {
    pub fn effective_zoom(&self) -> u32 {
        self.zoom.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
    }

    pub fn screen_to_level(&self, screen_px: Vec2) -> Vec2 {
        let zoom = self.effective_zoom() as f32;
        Vec2 {
            x: self.position.x + screen_px.x / zoom,
            y: self.position.y + screen_px.y / zoom,
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.position.x += dx;
        self.position.y += dy;
    }

    /// Keeps the view inside the level; a level smaller than the viewport is
    /// pinned to the origin.
    pub fn clamp_to_level(&mut self, level_size: (u32, u32), viewport: (u32, u32)) {
        let zoom = self.effective_zoom() as f32;
        let max_x = (level_size.0 as f32 - viewport.0 as f32 / zoom).max(0.0);
        let max_y = (level_size.1 as f32 - viewport.1 as f32 / zoom).max(0.0);
        self.position.x = self.position.x.clamp(0.0, max_x);
        self.position.y = self.position.y.clamp(0.0, max_y);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushCursor {
    pub center: Vec2,
    pub radius: f32,
    pub erasing: bool,
}

/// Everything the renderer reads for one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderView<'a> {
    pub world: &'a SimulationWorld,
    pub camera: Camera2D,
    pub show_regions: bool,
    pub brush: Option<BrushCursor>,
    pub hovered_agent: Option<usize>,
}

pub trait Scene {
    fn load(&mut self);
    fn update(&mut self, fixed_dt: Duration, input: &InputSnapshot) -> SceneCommand;
    fn render_view(&self) -> RenderView<'_>;
    fn unload(&mut self);
    /// Fixed step for the next ticks; scenes shorten it for fast-forward.
    fn tick_interval(&self, base: Duration) -> Duration {
        base
    }
    fn debug_title(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_to_level_honours_zoom_and_offset() {
        let camera = Camera2D {
            position: Vec2 { x: 100.0, y: 10.0 },
            zoom: 2,
        };
        let level = camera.screen_to_level(Vec2 { x: 40.0, y: 20.0 });
        assert_eq!(level, Vec2 { x: 120.0, y: 20.0 });
    }

    #[test]
    fn clamp_keeps_camera_inside_level() {
        let mut camera = Camera2D::default();
        camera.pan(-50.0, 0.0);
        camera.clamp_to_level((1000, 200), (800, 600));
        assert_eq!(camera.position, Vec2 { x: 0.0, y: 0.0 });

        camera.pan(5000.0, 0.0);
        camera.clamp_to_level((1000, 200), (800, 600));
        assert_eq!(camera.position.x, 600.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let camera = Camera2D {
            position: Vec2::default(),
            zoom: 0,
        };
        assert_eq!(camera.effective_zoom(), CAMERA_ZOOM_MIN);
    }

    #[test]
    fn scripted_press_is_visible_to_scene() {
        let input = InputSnapshot::empty().with_pressed(InputAction::Pause);
        assert!(input.was_pressed(InputAction::Pause));
        assert!(!input.was_pressed(InputAction::Nuke));
    }
}
