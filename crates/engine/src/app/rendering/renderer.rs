use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::{BrushCursor, Camera2D, RenderView, Vec2};
use crate::sim::{Agent, BehaviorState, DetectedRegion, HitBox, Raster};

use super::{level_to_screen_px, Viewport};

const CLEAR_COLOR: [u8; 4] = [12, 14, 30, 255];
const OUT_OF_LEVEL_COLOR: [u8; 4] = [6, 6, 10, 255];
const EXIT_OUTLINE_COLOR: [u8; 4] = [60, 230, 90, 255];
const AIR_HAZARD_OUTLINE_COLOR: [u8; 4] = [240, 60, 60, 255];
const GROUND_HAZARD_OUTLINE_COLOR: [u8; 4] = [250, 160, 40, 255];
const SPAWN_OUTLINE_COLOR: [u8; 4] = [250, 240, 60, 255];
const HOVER_OUTLINE_COLOR: [u8; 4] = [255, 255, 255, 255];
const FACING_MARK_COLOR: [u8; 4] = [255, 255, 255, 255];
const COUNTDOWN_TICK_COLOR: [u8; 4] = [255, 90, 60, 255];
const BRUSH_ADD_COLOR: [u8; 4] = [140, 220, 255, 255];
const BRUSH_ERASE_COLOR: [u8; 4] = [255, 120, 160, 255];
const COUNTDOWN_TICK_SIZE_PX: i32 = 2;
const COUNTDOWN_TICK_GAP_PX: i32 = 1;

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl Renderer {
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

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub(crate) fn render(&mut self, view: &RenderView<'_>) -> Result<(), Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }
        compose_frame(self.pixels.frame_mut(), self.viewport, view);
        self.pixels.render()
    }
}

/// Draws one frame into an RGBA buffer of `viewport` size.
pub(crate) fn compose_frame(frame: &mut [u8], viewport: Viewport, view: &RenderView<'_>) {
    let world = view.world;
    draw_terrain(frame, viewport, world.terrain().display_raster(), &view.camera);

    if view.show_regions {
        let objects = world.objects();
        let layers: [(&[DetectedRegion], [u8; 4]); 4] = [
            (&objects.spawns, SPAWN_OUTLINE_COLOR),
            (&objects.exits, EXIT_OUTLINE_COLOR),
            (&objects.air_hazards, AIR_HAZARD_OUTLINE_COLOR),
            (&objects.ground_hazards, GROUND_HAZARD_OUTLINE_COLOR),
        ];
        for (regions, color) in layers {
            for region in regions {
                draw_box_outline(frame, viewport, &view.camera, &region.hit_box(), color);
            }
        }
    }

    for (index, agent) in world.agents().iter().enumerate() {
        if !agent.active {
            continue;
        }
        draw_agent(frame, viewport, &view.camera, agent);
        if view.hovered_agent == Some(index) {
            draw_box_outline(frame, viewport, &view.camera, &agent.hit_box(), HOVER_OUTLINE_COLOR);
        }
    }

    if let Some(brush) = view.brush {
        draw_brush(frame, viewport, &view.camera, brush);
    }
}

fn draw_terrain(frame: &mut [u8], viewport: Viewport, raster: &Raster, camera: &Camera2D) {
    let zoom = camera.effective_zoom() as i32;
    let origin_x = camera.position.x.floor() as i32;
    let origin_y = camera.position.y.floor() as i32;
    let width = viewport.width as usize;

    for sy in 0..viewport.height as i32 {
        let level_y = origin_y + sy / zoom;
        for sx in 0..viewport.width as i32 {
            let level_x = origin_x + sx / zoom;
            let in_level = level_x >= 0
                && level_y >= 0
                && level_x < raster.width() as i32
                && level_y < raster.height() as i32;
            let color = if !in_level {
                OUT_OF_LEVEL_COLOR
            } else {
                let pixel = raster.get(level_x, level_y);
                if pixel.a() == 0 {
                    CLEAR_COLOR
                } else {
                    [pixel.r(), pixel.g(), pixel.b(), 255]
                }
            };
            write_pixel_rgba_clipped(frame, width, sx, sy, color);
        }
    }
}

fn draw_agent(frame: &mut [u8], viewport: Viewport, camera: &Camera2D, agent: &Agent) {
    let zoom = camera.effective_zoom() as i32;
    let (x, y) = level_to_screen_px(Vec2 { x: agent.x, y: agent.y }, camera);
    let width = (agent.width as i32 * zoom).max(1);
    let height = (agent.height as i32 * zoom).max(1);
    fill_rect_clipped(frame, viewport, x, y, width, height, state_color(agent.state));

    let mark_x = if agent.facing.sign() > 0.0 {
        x + width - zoom
    } else {
        x
    };
    fill_rect_clipped(frame, viewport, mark_x, y, zoom, height / 3, FACING_MARK_COLOR);

    if agent.countdown.active {
        let ticks = agent.countdown.remaining_frames() as i32;
        let tick_size = COUNTDOWN_TICK_SIZE_PX * zoom;
        let stride = tick_size + COUNTDOWN_TICK_GAP_PX * zoom;
        let row_y = y - stride;
        for tick in 0..ticks {
            fill_rect_clipped(
                frame,
                viewport,
                x + tick * stride,
                row_y,
                tick_size,
                tick_size,
                COUNTDOWN_TICK_COLOR,
            );
        }
    }
}

pub(crate) fn state_color(state: BehaviorState) -> [u8; 4] {
    match state {
        BehaviorState::Walking => [70, 200, 90, 255],
        BehaviorState::Falling => [90, 160, 240, 255],
        BehaviorState::Climbing | BehaviorState::ToppingOut => [200, 120, 240, 255],
        BehaviorState::Floating | BehaviorState::FloatingLanding => [150, 220, 255, 255],
        BehaviorState::Blocking => [240, 80, 80, 255],
        BehaviorState::Building | BehaviorState::RunOutOfSlabs => [240, 200, 80, 255],
        BehaviorState::Bashing => [230, 140, 60, 255],
        BehaviorState::Mining => [190, 120, 70, 255],
        BehaviorState::Digging => [150, 100, 60, 255],
        BehaviorState::Exploding | BehaviorState::Booming => [255, 60, 30, 255],
        BehaviorState::Disintegrating | BehaviorState::DyingFalling => [120, 120, 130, 255],
    }
}

fn draw_box_outline(
    frame: &mut [u8],
    viewport: Viewport,
    camera: &Camera2D,
    hit_box: &HitBox,
    color: [u8; 4],
) {
    let zoom = camera.effective_zoom() as f32;
    let (left, top) = level_to_screen_px(
        Vec2 {
            x: hit_box.x,
            y: hit_box.y,
        },
        camera,
    );
    let right = left + (hit_box.width * zoom).round() as i32;
    let bottom = top + (hit_box.height * zoom).round() as i32;
    let width = viewport.width as usize;

    for x in left..=right {
        write_pixel_clipped(frame, viewport, width, x, top, color);
        write_pixel_clipped(frame, viewport, width, x, bottom, color);
    }
    for y in top..=bottom {
        write_pixel_clipped(frame, viewport, width, left, y, color);
        write_pixel_clipped(frame, viewport, width, right, y, color);
    }
}

fn draw_brush(frame: &mut [u8], viewport: Viewport, camera: &Camera2D, brush: BrushCursor) {
    let color = if brush.erasing {
        BRUSH_ERASE_COLOR
    } else {
        BRUSH_ADD_COLOR
    };
    let zoom = camera.effective_zoom() as f32;
    let (cx, cy) = level_to_screen_px(brush.center, camera);
    let radius_px = (brush.radius * zoom).max(1.0);
    let steps = ((radius_px * std::f32::consts::TAU).ceil() as i32).max(8);
    let width = viewport.width as usize;
    for step in 0..steps {
        let angle = step as f32 / steps as f32 * std::f32::consts::TAU;
        let x = cx + (angle.cos() * radius_px).round() as i32;
        let y = cy + (angle.sin() * radius_px).round() as i32;
        write_pixel_clipped(frame, viewport, width, x, y, color);
    }
}

fn fill_rect_clipped(
    frame: &mut [u8],
    viewport: Viewport,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    color: [u8; 4],
) {
    let row_width = viewport.width as usize;
    for py in y.max(0)..(y + height).min(viewport.height as i32) {
        for px in x.max(0)..(x + width).min(viewport.width as i32) {
            write_pixel_rgba_clipped(frame, row_width, px, py, color);
        }
    }
}

fn write_pixel_clipped(
    frame: &mut [u8],
    viewport: Viewport,
    width: usize,
    x: i32,
    y: i32,
    color: [u8; 4],
) {
    if x >= viewport.width as i32 || y >= viewport.height as i32 {
        return;
    }
    write_pixel_rgba_clipped(frame, width, x, y, color);
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[byte_offset..end].copy_from_slice(&color);
}
