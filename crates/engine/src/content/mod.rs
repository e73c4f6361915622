//! Level content: XML level definitions plus the PNG rasters they point at.

mod defs;
mod images;
mod save_slot;

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::sim::{LevelData, RasterSizeError};
use crate::AppPaths;

pub use defs::{load_level_defs, ContentErrorCode, LevelDef, LevelDefError, SourceLocation};
pub use save_slot::{backup_path, replace_save_slot};

#[derive(Debug, Error)]
pub enum LevelLoadError {
    #[error(transparent)]
    Defs(#[from] LevelDefError),
    #[error("unknown level '{name}'; available: {}", available.join(", "))]
    UnknownLevel { name: String, available: Vec<String> },
    #[error("no levels defined under {0}")]
    NoLevels(PathBuf),
    #[error("failed to open level image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode level image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("level image {path} has an unexpected size: {source}")]
    RasterSize {
        path: PathBuf,
        #[source]
        source: RasterSizeError,
    },
}

/// Loads the level named `name`, or the first defined level when `name` is
/// `None`.
pub fn load_level(paths: &AppPaths, name: Option<&str>) -> Result<LevelData, LevelLoadError> {
    let defs = load_level_defs(&paths.levels_dir)?;
    let def = match name {
        Some(name) => defs
            .iter()
            .find(|def| def.def_name == name)
            .ok_or_else(|| LevelLoadError::UnknownLevel {
                name: name.to_string(),
                available: defs.iter().map(|def| def.def_name.clone()).collect(),
            })?,
        None => defs
            .first()
            .ok_or_else(|| LevelLoadError::NoLevels(paths.levels_dir.clone()))?,
    };
    level_from_def(def)
}

/// Def names in load order, for level selection.
pub fn list_levels(paths: &AppPaths) -> Result<Vec<String>, LevelLoadError> {
    Ok(load_level_defs(&paths.levels_dir)?
        .into_iter()
        .map(|def| def.def_name)
        .collect())
}

pub fn level_from_def(def: &LevelDef) -> Result<LevelData, LevelLoadError> {
    let collision = images::load_raster(&def.collision_image)?;
    let visual = def
        .visual_image
        .as_deref()
        .map(images::load_raster)
        .transpose()?;

    info!(
        level = %def.def_name,
        collision = %def.collision_image.display(),
        has_visual = visual.is_some(),
        width = collision.width(),
        height = collision.height(),
        "level_loaded"
    );

    Ok(LevelData {
        name: def.def_name.clone(),
        label: def.label.clone(),
        agent_count: def.lemmings,
        release_rate: def.release_rate,
        facing: def.facing,
        tools: def.tools,
        collision,
        visual,
    })
}
