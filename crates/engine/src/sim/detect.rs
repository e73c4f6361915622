use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::raster::{Raster, Rgba};
use super::terrain::TerrainField;

/// Vertical compression applied to hazard and exit boxes before overlap tests.
pub const REGION_VERTICAL_SCALE: f32 = 0.8;
const NEUTRALIZE_SEARCH_RADIUS: i32 = 3;

/// Inclusive pixel bounds of one marker component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedRegion {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl DetectedRegion {
    pub const fn new(min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub(crate) fn at(x: i32, y: i32) -> Self {
        Self::new(x, x, y, y)
    }

    pub(crate) fn include(&mut self, x: i32, y: i32) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    /// Rounded center, used for the spawn point.
    pub fn center(&self) -> (f32, f32) {
        (
            ((self.min_x + self.max_x) as f32 / 2.0).round(),
            ((self.min_y + self.max_y) as f32 / 2.0).round(),
        )
    }

    /// Collision box with the height compressed toward the bottom edge.
    pub fn hit_box(&self) -> HitBox {
        let height = (self.max_y - self.min_y) as f32;
        let scaled = height * REGION_VERTICAL_SCALE;
        HitBox {
            x: self.min_x as f32,
            y: self.max_y as f32 - scaled,
            width: (self.max_x - self.min_x) as f32,
            height: scaled,
        }
    }
}

/// Axis-aligned box; overlap is inclusive of shared edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl HitBox {
    pub fn overlaps(&self, other: &HitBox) -> bool {
        !(other.x > self.x + self.width
            || other.x + other.width < self.x
            || other.y > self.y + self.height
            || other.y + other.height < self.y)
    }

    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedObjects {
    pub spawns: Vec<DetectedRegion>,
    pub exits: Vec<DetectedRegion>,
    pub air_hazards: Vec<DetectedRegion>,
    pub ground_hazards: Vec<DetectedRegion>,
}

impl DetectedObjects {
    pub fn spawn_point(&self) -> Option<(f32, f32)> {
        self.spawns.first().map(DetectedRegion::center)
    }
}

/// Locates every marker component of the level raster in one pass.
pub fn detect(raster: &Raster) -> DetectedObjects {
    let mut categories = raster
        .flood_fill_regions_by_color(&[
            Rgba::SPAWN_MARKER,
            Rgba::EXIT_MARKER,
            Rgba::AIR_HAZARD_MARKER,
            Rgba::GROUND_HAZARD_MARKER,
        ])
        .into_iter();
    let mut next = || categories.next().unwrap_or_default();
    let objects = DetectedObjects {
        spawns: next(),
        exits: next(),
        air_hazards: next(),
        ground_hazards: next(),
    };
    debug!(
        spawns = objects.spawns.len(),
        exits = objects.exits.len(),
        air_hazards = objects.air_hazards.len(),
        ground_hazards = objects.ground_hazards.len(),
        "markers_detected"
    );
    objects
}

/// Scrubs marker pixels out of the collision raster. Spawn, exit and air
/// hazard pixels become transparent; each ground hazard blob takes the most
/// common non-marker color found around it. Must run before the first ground
/// query.
pub fn neutralize_markers(terrain: &mut TerrainField) {
    let blend_colors: Vec<(Vec<(i32, i32)>, Rgba)> = terrain
        .collision()
        .marker_components(Rgba::GROUND_HAZARD_MARKER)
        .into_iter()
        .map(|blob| {
            let color = dominant_neighbor_color(terrain.collision(), &blob);
            (blob, color)
        })
        .collect();

    for (blob, color) in &blend_colors {
        for &(x, y) in blob {
            terrain.set_collision_pixel(x, y, *color);
        }
    }

    for marker in [
        Rgba::SPAWN_MARKER,
        Rgba::AIR_HAZARD_MARKER,
        Rgba::EXIT_MARKER,
    ] {
        for blob in terrain.collision().marker_components(marker) {
            for (x, y) in blob {
                terrain.set_collision_pixel(x, y, Rgba::TRANSPARENT);
            }
        }
    }

    terrain.rebuild_ground_classification();
}

fn dominant_neighbor_color(raster: &Raster, blob: &[(i32, i32)]) -> Rgba {
    let mut counts: HashMap<Rgba, (u32, usize)> = HashMap::new();
    let r2 = NEUTRALIZE_SEARCH_RADIUS * NEUTRALIZE_SEARCH_RADIUS;
    let mut seen_order = 0usize;

    for &(x, y) in blob {
        for dy in -NEUTRALIZE_SEARCH_RADIUS..=NEUTRALIZE_SEARCH_RADIUS {
            for dx in -NEUTRALIZE_SEARCH_RADIUS..=NEUTRALIZE_SEARCH_RADIUS {
                if dx * dx + dy * dy > r2 || raster.index_of(x + dx, y + dy).is_none() {
                    continue;
                }
                let color = raster.get(x + dx, y + dy);
                if color.same_rgb(Rgba::GROUND_HAZARD_MARKER)
                    || color.same_rgb(Rgba::AIR_HAZARD_MARKER)
                {
                    continue;
                }
                let entry = counts.entry(color).or_insert((0, seen_order));
                entry.0 += 1;
                seen_order += 1;
            }
        }
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(color, _)| color)
        .unwrap_or(Rgba::TRANSPARENT)
}
