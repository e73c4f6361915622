//! Terrain edits performed by tool-using agents.
//!
//! Each edit reports whether it made progress; the caller keeps the
//! consecutive stall counters on [`ToolProgress`](super::agent::ToolProgress).

use super::agent::{Agent, Facing};
use super::raster::Rgba;
use super::terrain::{CircleSection, PaintMode, TerrainField};

pub const SLAB_WIDTH: i32 = 8;
pub const SLAB_HEIGHT: i32 = 3;
/// Placements that lay two white slabs before switching to slab color.
pub const SOLID_SLAB_PLACEMENTS: u32 = 4;
/// Placements after which terrain at the far slab edge stops the builder.
pub const BUILD_OBSTRUCTION_AFTER: u32 = 2;
pub const EXPLOSION_RADIUS: f32 = 20.0;

const BASH_AHEAD_EMPTY_RATIO: f32 = 0.04;
const BASH_EDGE_EMPTY_RATIO: f32 = 0.5;
const BASH_EDGE_ROWS: i32 = 4;
const MINE_FLOOR_SOLID_RATIO: f32 = 0.8;
const MINE_SWEEP_STEPS: u32 = 15;
const DIG_WIDTH_FACTOR: f32 = 1.2;
const DIG_BAND_HEIGHT: i32 = 6;
const DIG_PROBE_HEIGHT: i32 = 4;
const DIG_THROUGH_AIR_RATIO: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Placed,
    Obstructed,
}

/// Lays the next pair of slabs ahead of the builder's feet.
pub fn build_slab(agent: &Agent, terrain: &mut TerrainField) -> BuildOutcome {
    let slab_y = (agent.y + agent.height - 2.0).floor() as i32;
    let center_x = agent.x + agent.width / 2.0;
    let (first_x, second_x) = match agent.facing {
        Facing::Right => {
            let first = (center_x + 1.0).round() as i32;
            (first, first + SLAB_WIDTH)
        }
        Facing::Left => {
            let first = (center_x - 1.0 - SLAB_WIDTH as f32).round() as i32;
            (first, first - SLAB_WIDTH)
        }
    };
    let far_edge_x = match agent.facing {
        Facing::Right => second_x + SLAB_WIDTH - 1,
        Facing::Left => second_x,
    };
    let obstructed = agent.progress.slabs_placed > BUILD_OBSTRUCTION_AFTER
        && (0..SLAB_HEIGHT).any(|dy| terrain.is_solid_at(far_edge_x, slab_y + dy));

    let second_color = if agent.progress.slabs_placed < SOLID_SLAB_PLACEMENTS {
        Rgba::WHITE
    } else {
        Rgba::SLAB
    };
    terrain.paint_rect(first_x, slab_y, SLAB_WIDTH, SLAB_HEIGHT, Rgba::WHITE);
    terrain.paint_rect(second_x, slab_y, SLAB_WIDTH, SLAB_HEIGHT, second_color);

    if obstructed {
        BuildOutcome::Obstructed
    } else {
        BuildOutcome::Placed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BashReport {
    pub nothing_ahead: bool,
    pub no_floor_ahead: bool,
}

/// Carves one swing and reports the two end-of-wall signals, both sampled
/// ahead of the swing before it lands.
pub fn bash(agent: &Agent, terrain: &mut TerrainField) -> BashReport {
    let dir = agent.facing.sign();
    let radius = agent.height / 2.0 + 1.0;
    let swing_x = agent.x + agent.width / 2.0 + dir;
    let swing_y = agent.y + agent.height / 2.0;
    let ahead_x = swing_x + dir * agent.width;

    let ahead_ratio =
        terrain.solid_ratio_in_circle(ahead_x, swing_y, radius, CircleSection::Full);

    let diameter = (radius * 2.0).ceil() as i32;
    let left = (ahead_x - radius).floor() as i32;
    let top = (swing_y - radius).floor() as i32;
    let band_start = (diameter as f32 * 0.25).floor() as i32;
    let band_end = (diameter as f32 * 0.75).ceil() as i32;
    let edge_ratio = terrain.solid_ratio_in_rect(
        left + band_start,
        top + diameter - BASH_EDGE_ROWS,
        band_end - band_start,
        BASH_EDGE_ROWS,
    );

    terrain.paint_circle(swing_x, swing_y, radius, PaintMode::Remove);

    BashReport {
        nothing_ahead: ahead_ratio < BASH_AHEAD_EMPTY_RATIO,
        no_floor_ahead: edge_ratio < BASH_EDGE_EMPTY_RATIO,
    }
}

/// Carves the diagonal tunnel; true when the floor below has thinned out.
pub fn mine(agent: &Agent, terrain: &mut TerrainField) -> bool {
    let dir = agent.facing.sign();
    let radius = agent.height / 2.0;
    let cut_x = agent.x + agent.width / 2.0 + dir * agent.width / 2.0;
    let cut_y = agent.y + agent.height / 2.0;
    let floor_y = cut_y + agent.height / 2.0;

    let floor_ratio =
        terrain.solid_ratio_in_circle(cut_x, floor_y, radius, CircleSection::BottomHalf);
    let thin_floor = floor_ratio < MINE_FLOOR_SOLID_RATIO;
    if thin_floor {
        for step in 0..MINE_SWEEP_STEPS {
            let offset = step as f32;
            terrain.paint_circle(cut_x + dir * offset, cut_y + offset * 0.5, radius, PaintMode::Remove);
        }
    }
    terrain.paint_circle(cut_x, cut_y, radius, PaintMode::Remove);
    thin_floor
}

/// Clears a band under the digger; true when the ground below is already air.
pub fn dig(agent: &Agent, terrain: &mut TerrainField) -> bool {
    let center_x = agent.x + agent.width / 2.0;
    let foot_y = agent.y + agent.height;
    let width = (agent.width * DIG_WIDTH_FACTOR).round() as i32;
    let start_x = (center_x - width as f32 / 2.0).floor() as i32;
    let dig_y = (foot_y - DIG_BAND_HEIGHT as f32).floor() as i32;

    terrain.paint_rect(start_x, dig_y, width, DIG_BAND_HEIGHT, PaintMode::Remove.color());

    let air_ratio = terrain.air_ratio_in_rect(
        start_x,
        dig_y + DIG_BAND_HEIGHT - 2,
        width,
        DIG_PROBE_HEIGHT,
    );
    air_ratio >= DIG_THROUGH_AIR_RATIO
}

/// Blasts the explosion crater; returns its center.
pub fn explode(agent: &Agent, terrain: &mut TerrainField) -> (f32, f32) {
    let (cx, cy) = agent.center();
    terrain.paint_circle(cx, cy, EXPLOSION_RADIUS, PaintMode::Remove);
    (cx, cy)
}
