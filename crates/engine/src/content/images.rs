use std::path::Path;

use image::ImageReader;

use crate::sim::{Raster, RasterSizeError};

use super::LevelLoadError;

/// Decodes a level image into an RGBA raster.
pub(crate) fn load_raster(path: &Path) -> Result<Raster, LevelLoadError> {
    let reader = ImageReader::open(path).map_err(|source| LevelLoadError::ImageRead {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = reader
        .decode()
        .map_err(|source| LevelLoadError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    Raster::from_rgba_bytes(width, height, rgba.into_raw()).map_err(|source: RasterSizeError| {
        LevelLoadError::RasterSize {
            path: path.to_path_buf(),
            source,
        }
    })
}
