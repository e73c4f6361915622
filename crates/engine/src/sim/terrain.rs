use serde::{Deserialize, Serialize};
use tracing::warn;

use super::detect::DetectedRegion;
use super::raster::{Raster, Rgba};

/// Channel values at or below this read as air.
pub const PIXEL_THRESHOLD: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaintMode {
    Add,
    Remove,
}

impl PaintMode {
    pub fn color(self) -> Rgba {
        match self {
            PaintMode::Add => Rgba::WHITE,
            PaintMode::Remove => Rgba::BLACK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Air,
    Slab,
    Solid,
}

impl PixelClass {
    pub fn of(color: Rgba) -> Self {
        if color.same_rgb(Rgba::SLAB) {
            PixelClass::Slab
        } else if TerrainField::is_solid(color) {
            PixelClass::Solid
        } else {
            PixelClass::Air
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleSection {
    Full,
    BottomHalf,
}

/// Destructible level terrain.
///
/// The collision raster is the source of truth. `classes` is derived from it
/// and re-derived for exactly the pixels each edit touches, so a change made
/// earlier in a tick is visible to every later query in that tick.
#[derive(Debug, Clone)]
pub struct TerrainField {
    collision: Raster,
    visual: Option<Raster>,
    classes: Vec<PixelClass>,
}

impl TerrainField {
    pub fn new(collision: Raster) -> Self {
        let mut terrain = Self {
            classes: Vec::new(),
            collision,
            visual: None,
        };
        terrain.rebuild_ground_classification();
        terrain
    }

    /// Pairs a decorative raster that receives every paint edit. A raster of a
    /// different size is dropped.
    pub fn with_visual(mut self, visual: Raster) -> Self {
        if visual.same_size(&self.collision) {
            self.visual = Some(visual);
        } else {
            warn!(
                collision_width = self.collision.width(),
                collision_height = self.collision.height(),
                visual_width = visual.width(),
                visual_height = visual.height(),
                "visual_raster_size_mismatch"
            );
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.collision.width()
    }

    pub fn height(&self) -> u32 {
        self.collision.height()
    }

    pub fn collision(&self) -> &Raster {
        &self.collision
    }

    pub fn visual(&self) -> Option<&Raster> {
        self.visual.as_ref()
    }

    /// What a viewer should draw.
    pub fn display_raster(&self) -> &Raster {
        self.visual.as_ref().unwrap_or(&self.collision)
    }

    pub fn sample_color(&self, x: i32, y: i32) -> Rgba {
        self.collision.get(x, y)
    }

    /// Any color channel above [`PIXEL_THRESHOLD`], slab color excluded.
    pub fn is_solid(color: Rgba) -> bool {
        if color.same_rgb(Rgba::SLAB) {
            return false;
        }
        color.r() > PIXEL_THRESHOLD || color.g() > PIXEL_THRESHOLD || color.b() > PIXEL_THRESHOLD
    }

    /// Solid terrain or slab: something an agent can stand on.
    pub fn is_supportive(color: Rgba) -> bool {
        color.same_rgb(Rgba::SLAB) || Self::is_solid(color)
    }

    pub fn class_at(&self, x: i32, y: i32) -> PixelClass {
        match self.collision.index_of(x, y) {
            Some(index) => self.classes[index],
            None => PixelClass::Air,
        }
    }

    pub fn is_solid_at(&self, x: i32, y: i32) -> bool {
        self.class_at(x, y) == PixelClass::Solid
    }

    pub fn is_supportive_at(&self, x: i32, y: i32) -> bool {
        self.class_at(x, y) != PixelClass::Air
    }

    pub fn is_slab_at(&self, x: i32, y: i32) -> bool {
        self.class_at(x, y) == PixelClass::Slab
    }

    pub fn rebuild_ground_classification(&mut self) {
        let count = self.collision.width() as usize * self.collision.height() as usize;
        self.classes.clear();
        self.classes
            .extend((0..count).map(|index| PixelClass::of(self.collision.get_index(index))));
    }

    pub fn paint_circle(&mut self, cx: f32, cy: f32, radius: f32, mode: PaintMode) {
        let color = mode.color();
        for (x, y) in circle_pixels(cx, cy, radius, CircleSection::Full) {
            self.paint_pixel(x, y, color);
        }
    }

    pub fn paint_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Rgba) {
        for py in y..y.saturating_add(height) {
            for px in x..x.saturating_add(width) {
                self.paint_pixel(px, py, color);
            }
        }
    }

    /// Writes both rasters and re-derives the touched pixel's class.
    fn paint_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if let Some(index) = self.collision.set(x, y, color) {
            self.classes[index] = PixelClass::of(color);
        }
        if let Some(visual) = self.visual.as_mut() {
            visual.set(x, y, color);
        }
    }

    /// Collision-only edit used by marker scrubbing.
    pub(crate) fn set_collision_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if let Some(index) = self.collision.set(x, y, color) {
            self.classes[index] = PixelClass::of(color);
        }
    }

    pub fn flood_fill_regions_by_color(&self, marker_colors: &[Rgba]) -> Vec<Vec<DetectedRegion>> {
        self.collision.flood_fill_regions_by_color(marker_colors)
    }

    /// Replaces terrain pixels wholesale, e.g. on snapshot restore.
    pub fn replace_rasters(&mut self, collision: Raster, visual: Option<Raster>) {
        self.collision = collision;
        self.visual = visual.filter(|raster| raster.same_size(&self.collision));
        self.rebuild_ground_classification();
    }

    /// Fraction of in-bounds pixels on `row` within `center_x ± half_width`
    /// that can carry weight. Out-of-bounds samples are skipped.
    pub fn support_ratio(&self, center_x: i32, row: i32, half_width: i32) -> f32 {
        let mut total = 0u32;
        let mut supportive = 0u32;
        for x in (center_x - half_width)..=(center_x + half_width) {
            if self.collision.index_of(x, row).is_none() {
                continue;
            }
            total += 1;
            if self.is_supportive_at(x, row) {
                supportive += 1;
            }
        }
        ratio(supportive, total)
    }

    pub fn solid_ratio_in_circle(&self, cx: f32, cy: f32, radius: f32, section: CircleSection) -> f32 {
        let mut total = 0u32;
        let mut solid = 0u32;
        for (x, y) in circle_pixels(cx, cy, radius, section) {
            total += 1;
            if self.is_solid_at(x, y) {
                solid += 1;
            }
        }
        ratio(solid, total)
    }

    pub fn solid_ratio_in_rect(&self, x: i32, y: i32, width: i32, height: i32) -> f32 {
        let mut total = 0u32;
        let mut solid = 0u32;
        for py in y..y.saturating_add(height) {
            for px in x..x.saturating_add(width) {
                total += 1;
                if self.is_solid_at(px, py) {
                    solid += 1;
                }
            }
        }
        ratio(solid, total)
    }

    pub fn air_ratio_in_rect(&self, x: i32, y: i32, width: i32, height: i32) -> f32 {
        if width <= 0 || height <= 0 {
            return 0.0;
        }
        1.0 - self.solid_ratio_in_rect(x, y, width, height)
    }
}

fn ratio(count: u32, total: u32) -> f32 {
    if total == 0 {
        0.0
    } else {
        count as f32 / total as f32
    }
}

/// Integer pixels whose offset from `(cx, cy)` lies within `radius`.
pub(crate) fn circle_pixels(
    cx: f32,
    cy: f32,
    radius: f32,
    section: CircleSection,
) -> impl Iterator<Item = (i32, i32)> {
    let radius = radius.max(0.0);
    let r2 = radius * radius;
    let min_x = (cx - radius).floor() as i32;
    let max_x = (cx + radius).ceil() as i32;
    let min_y = match section {
        CircleSection::Full => (cy - radius).floor() as i32,
        CircleSection::BottomHalf => cy.ceil() as i32,
    };
    let max_y = (cy + radius).ceil() as i32;
    (min_y..=max_y).flat_map(move |y| {
        (min_x..=max_x).filter_map(move |x| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            (dx * dx + dy * dy <= r2).then_some((x, y))
        })
    })
}
