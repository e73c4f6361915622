use crate::app::{Camera2D, Vec2};

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Level pixel to the screen pixel of its top-left corner.
pub fn level_to_screen_px(level: Vec2, camera: &Camera2D) -> (i32, i32) {
    let zoom = camera.effective_zoom() as f32;
    let x = (level.x - camera.position.x) * zoom;
    let y = (level.y - camera.position.y) * zoom;
    (x.floor() as i32, y.floor() as i32)
}

pub fn screen_to_level_px(screen: Vec2, camera: &Camera2D) -> Vec2 {
    camera.screen_to_level(screen)
}
