use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::detect::DetectedRegion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Builder slab: supports standing, ignored by tunneling tools.
    pub const SLAB: Self = Self::rgb(253, 253, 253);
    pub const SPAWN_MARKER: Self = Self::rgb(255, 255, 0);
    pub const AIR_HAZARD_MARKER: Self = Self::rgb(255, 0, 0);
    pub const GROUND_HAZARD_MARKER: Self = Self::rgb(255, 165, 0);
    pub const EXIT_MARKER: Self = Self::rgb(0, 255, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    pub fn r(self) -> u8 {
        self.0[0]
    }

    pub fn g(self) -> u8 {
        self.0[1]
    }

    pub fn b(self) -> u8 {
        self.0[2]
    }

    pub fn a(self) -> u8 {
        self.0[3]
    }

    pub fn same_rgb(self, other: Self) -> bool {
        self.0[..3] == other.0[..3]
    }

    /// Marker matching requires an exact opaque color.
    pub fn is_marker(self, marker: Self) -> bool {
        self.a() == 255 && self.same_rgb(marker)
    }
}

#[derive(Debug, Error)]
#[error("raster byte length {actual} does not match {width}x{height} RGBA ({expected} bytes)")]
pub struct RasterSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

/// Row-major RGBA8 pixel grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RasterFields")]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Wire shape of a raster; decoding goes through the byte-length check.
#[derive(Deserialize)]
struct RasterFields {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TryFrom<RasterFields> for Raster {
    type Error = RasterSizeError;

    fn try_from(fields: RasterFields) -> Result<Self, Self::Error> {
        Raster::from_rgba_bytes(fields.width, fields.height, fields.pixels)
    }
}

impl Raster {
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&color.0);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_rgba_bytes(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterSizeError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RasterSizeError {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Fails when the pixel buffer is not exactly `width * height` RGBA texels.
    pub fn check_len(&self) -> Result<(), RasterSizeError> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() == expected {
            Ok(())
        } else {
            Err(RasterSizeError {
                width: self.width,
                height: self.height,
                expected,
                actual: self.pixels.len(),
            })
        }
    }

    pub fn same_size(&self, other: &Raster) -> bool {
        self.width == other.width && self.height == other.height
    }

    pub(crate) fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Out-of-bounds reads return [`Rgba::TRANSPARENT`].
    pub fn get(&self, x: i32, y: i32) -> Rgba {
        match self.index_of(x, y) {
            Some(index) => self.get_index(index),
            None => Rgba::TRANSPARENT,
        }
    }

    pub(crate) fn get_index(&self, index: usize) -> Rgba {
        let offset = index * 4;
        let mut color = [0u8; 4];
        color.copy_from_slice(&self.pixels[offset..offset + 4]);
        Rgba(color)
    }

    /// Writes are clipped; returns the pixel index when the write landed.
    pub fn set(&mut self, x: i32, y: i32, color: Rgba) -> Option<usize> {
        let index = self.index_of(x, y)?;
        let offset = index * 4;
        self.pixels[offset..offset + 4].copy_from_slice(&color.0);
        Some(index)
    }

    /// One pass over the raster; each marker color gets its own region list,
    /// in scan order of each component's first pixel.
    pub fn flood_fill_regions_by_color(&self, marker_colors: &[Rgba]) -> Vec<Vec<DetectedRegion>> {
        let mut regions = vec![Vec::new(); marker_colors.len()];
        let mut visited = vec![false; self.width as usize * self.height as usize];

        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let Some(index) = self.index_of(x, y) else {
                    continue;
                };
                if visited[index] {
                    continue;
                }
                let color = self.get_index(index);
                let Some(category) = marker_colors.iter().position(|m| color.is_marker(*m)) else {
                    continue;
                };
                let mut region = DetectedRegion::at(x, y);
                self.flood_component(x, y, marker_colors[category], &mut visited, |px, py| {
                    region.include(px, py);
                });
                regions[category].push(region);
            }
        }
        regions
    }

    /// Pixel lists of every 4-connected component of `marker`.
    pub(crate) fn marker_components(&self, marker: Rgba) -> Vec<Vec<(i32, i32)>> {
        let mut components = Vec::new();
        let mut visited = vec![false; self.width as usize * self.height as usize];
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let Some(index) = self.index_of(x, y) else {
                    continue;
                };
                if visited[index] || !self.get_index(index).is_marker(marker) {
                    continue;
                }
                let mut pixels = Vec::new();
                self.flood_component(x, y, marker, &mut visited, |px, py| pixels.push((px, py)));
                components.push(pixels);
            }
        }
        components
    }

    fn flood_component(
        &self,
        start_x: i32,
        start_y: i32,
        marker: Rgba,
        visited: &mut [bool],
        mut on_pixel: impl FnMut(i32, i32),
    ) {
        let mut queue = VecDeque::new();
        if let Some(index) = self.index_of(start_x, start_y) {
            visited[index] = true;
            queue.push_back((start_x, start_y));
        }
        while let Some((x, y)) = queue.pop_front() {
            on_pixel(x, y);
            for (nx, ny) in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
                let Some(index) = self.index_of(nx, ny) else {
                    continue;
                };
                if visited[index] || !self.get_index(index).is_marker(marker) {
                    continue;
                }
                visited[index] = true;
                queue.push_back((nx, ny));
            }
        }
    }
}
