mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;

pub use input::{InputAction, TOOL_SLOT_COUNT};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{level_to_screen_px, screen_to_level_px, Renderer, Viewport};
pub use scene::{
    BrushCursor, Camera2D, InputSnapshot, RenderView, Scene, SceneCommand, Vec2,
    CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN,
};
