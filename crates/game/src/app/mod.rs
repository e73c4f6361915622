pub(crate) mod bootstrap;
mod level_scene;
pub(crate) mod loop_runner;
mod save;
