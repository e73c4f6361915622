//! Deterministic lemming-rescue simulation.
//!
//! Everything here is single-threaded and free of wall-clock time; callers
//! drive [`SimulationWorld::tick`] with a fixed step.

mod actions;
mod agent;
mod behavior;
mod clock;
mod collision;
mod detect;
mod raster;
mod snapshot;
mod terrain;
mod tools;
mod world;

pub use actions::{EXPLOSION_RADIUS, SLAB_HEIGHT, SLAB_WIDTH};
pub use agent::{
    roster_name, Agent, AnimationTimer, BehaviorState, Capability, CountdownTimer, Facing, Fate,
    ToolProgress, AGENT_HEIGHT, AGENT_WIDTH, COUNTDOWN_FRAMES, COUNTDOWN_FRAME_MS,
};
pub use behavior::{is_supported, LETHAL_FALL_DISTANCE, MAX_SLABS};
pub use clock::{
    SimulationClock, FAST_FORWARD_FACTOR, RELEASE_RATE_MAX, RELEASE_RATE_MIN, RELEASE_RATE_STEP,
};
pub use collision::{GRID_CELL_SIZE, SANDWICH_NUDGE_PX};
pub use detect::{
    detect, neutralize_markers, DetectedObjects, DetectedRegion, HitBox, REGION_VERTICAL_SCALE,
};
pub use raster::{Raster, RasterSizeError, Rgba};
pub use snapshot::{state_digest, WorldSnapshot};
pub use terrain::{CircleSection, PaintMode, PixelClass, TerrainField, PIXEL_THRESHOLD};
pub use tools::{assign_tool, ActionTool, AssignmentRejected, ToolId, ToolInventory, ToolKind};
pub use world::{
    FateTally, LevelData, RestoreError, SimulationWorld, WorldEvent, WorldInitError,
};
