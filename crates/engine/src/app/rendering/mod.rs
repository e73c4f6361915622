mod renderer;
mod transform;

pub use renderer::Renderer;
pub use transform::{level_to_screen_px, screen_to_level_px, Viewport};
