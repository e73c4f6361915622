//! Per-agent state machine.
//!
//! A tick runs [`advance_motion`] over every agent (movement, terrain
//! adjustment, gravity), then collisions, then [`advance_timers`] (countdown,
//! animation frames and the tool payloads that fire on them). Each step sees
//! the terrain as left by the agents before it in index order.

use tracing::{debug, trace};

use super::actions::{self, BuildOutcome};
use super::agent::{Agent, BehaviorState, Fate, COUNTDOWN_FRAMES, COUNTDOWN_FRAME_MS};
use super::clock::SimulationClock;
use super::terrain::TerrainField;
use super::world::WorldEvent;

pub const WALK_STEP_PX: f32 = 2.0;
pub const CLIMB_STEP_PX: f32 = 0.5;
pub const FLOAT_DESCENT_PX: f32 = 4.0 / 3.0;
pub const MAX_FALL_PER_TICK_PX: u32 = 4;
pub const FLOAT_ACTIVATION_DISTANCE: f32 = 40.0;
pub const LETHAL_FALL_DISTANCE: f32 = 150.0;
pub const TURN_COOLDOWN_TICKS: u32 = 10;
pub const MAX_STEP_UP_PX: u32 = 8;
pub const MAX_SLABS: u32 = 12;
/// Consecutive stalled payloads tolerated before a tool gives up.
pub const STALL_LIMIT: u32 = 4;

const SUPPORT_HALF_WIDTH: i32 = 8;
const SUPPORT_RATIO: f32 = 0.2;
const SLAB_PROBE_HALF_WIDTH: i32 = 8;
const AIR_PROBE_DEPTH: i32 = 10;
const TOPPING_OUT_SETTLE_PX: f32 = 1.0;

const BUILD_STEP_FRAME: u32 = 15;
const BUILD_STEP: (f32, f32) = (5.0, -2.0);
const BASH_STEP_FRAMES: [u32; 10] = [1, 3, 11, 13, 15, 17, 19, 21, 29, 31];
const BASH_STEP_PX: f32 = 1.5;
const MINE_STEP: (f32, f32) = (0.8, 0.4);
const DIG_STEP_PX: f32 = 0.5;

/// True when enough of the row under the feet can carry weight.
pub fn is_supported(agent: &Agent, terrain: &TerrainField) -> bool {
    let center_x = (agent.x + agent.width / 2.0).floor() as i32;
    let probe_row = (agent.y + agent.height + 1.0).floor() as i32;
    terrain.support_ratio(center_x, probe_row, SUPPORT_HALF_WIDTH) >= SUPPORT_RATIO
}

/// Movement, terrain adjustment and gravity for one agent.
pub(crate) fn advance_motion(agent: &mut Agent, terrain: &TerrainField) {
    if !agent.active {
        return;
    }
    let frame_entered = agent.animation.take_frame_entered();
    let frame = agent.animation.frame;
    let dir = agent.facing.sign();

    match agent.state {
        BehaviorState::Walking => {
            agent.x += WALK_STEP_PX * dir;
            agent.walking_on_slab = standing_on_slab(agent, terrain);
        }
        BehaviorState::Climbing => climb(agent, terrain),
        BehaviorState::ToppingOut => {
            if !is_supported(agent, terrain) {
                agent.y += TOPPING_OUT_SETTLE_PX;
            }
        }
        BehaviorState::Floating => agent.y += FLOAT_DESCENT_PX,
        BehaviorState::Building if frame_entered && frame == BUILD_STEP_FRAME => {
            agent.x += BUILD_STEP.0 * dir;
            agent.y += BUILD_STEP.1;
        }
        BehaviorState::Bashing if frame_entered && BASH_STEP_FRAMES.contains(&frame) => {
            agent.x += BASH_STEP_PX * dir;
        }
        BehaviorState::Mining if frame_entered && (1..=8).contains(&frame) => {
            agent.x += MINE_STEP.0 * dir;
            agent.y += MINE_STEP.1;
        }
        BehaviorState::Digging if frame_entered => agent.y += DIG_STEP_PX,
        BehaviorState::Falling
        | BehaviorState::FloatingLanding
        | BehaviorState::Blocking
        | BehaviorState::Building
        | BehaviorState::RunOutOfSlabs
        | BehaviorState::Bashing
        | BehaviorState::Mining
        | BehaviorState::Digging
        | BehaviorState::Exploding
        | BehaviorState::Booming
        | BehaviorState::Disintegrating
        | BehaviorState::DyingFalling => {}
    }

    if left_the_level(agent, terrain) {
        debug!(name = %agent.name, x = agent.x, y = agent.y, "agent_out_of_bounds");
        agent.deactivate(Fate::OutOfBounds);
        return;
    }

    if agent.state == BehaviorState::Walking {
        adjust_to_terrain(agent, terrain);
    }
    apply_gravity(agent, terrain);
}

fn left_the_level(agent: &Agent, terrain: &TerrainField) -> bool {
    let width = terrain.width() as f32;
    agent.x < 0.0 || agent.x + agent.width > width || agent.y > terrain.height() as f32
}

fn standing_on_slab(agent: &Agent, terrain: &TerrainField) -> bool {
    let center_x = (agent.x + agent.width / 2.0).floor() as i32;
    let row = agent.foot_row();
    (-SLAB_PROBE_HALF_WIDTH..=SLAB_PROBE_HALF_WIDTH)
        .any(|dx| terrain.is_slab_at(center_x + dx, row))
}

/// Climbers start climbing; everyone else turns around for a while.
fn meet_wall(agent: &mut Agent) {
    if agent.capability.can_climb() {
        agent.enter_state(BehaviorState::Climbing);
    } else {
        agent.facing = agent.facing.reversed();
        agent.turn_cooldown = TURN_COOLDOWN_TICKS;
    }
}

/// Step-up, wall and ledge handling for a walker, probing the leading foot
/// column.
fn adjust_to_terrain(agent: &mut Agent, terrain: &TerrainField) {
    let foot_x = agent.leading_column();
    let above_head = agent.y.floor() as i32 - 1;
    if agent.turn_cooldown == 0 && terrain.is_solid_at(foot_x, above_head) {
        meet_wall(agent);
        return;
    }
    agent.turn_cooldown = agent.turn_cooldown.saturating_sub(1);

    let bottom_y = agent.foot_row();
    let body_rows = agent.height as i32;
    let step_rows = ((agent.height * 0.1).floor() as i32).max(1);
    let solid_at = |i: i32| terrain.is_solid_at(foot_x, bottom_y - 1 - i);

    let step_contact = (0..step_rows).any(solid_at);
    if step_contact {
        let wall_count = (step_rows..body_rows).filter(|&i| solid_at(i)).count() as u32;
        if wall_count <= MAX_STEP_UP_PX {
            agent.y -= wall_count as f32;
        } else if agent.turn_cooldown == 0 {
            meet_wall(agent);
        }
        return;
    }

    let air_below = (1..=AIR_PROBE_DEPTH)
        .take_while(|&offset| !terrain.is_solid_at(foot_x, bottom_y + offset))
        .count() as i32;
    if (1..AIR_PROBE_DEPTH).contains(&air_below) && !agent.walking_on_slab {
        agent.start_falling();
    }
}

fn climb(agent: &mut Agent, terrain: &TerrainField) {
    let center_x = (agent.x + agent.width / 2.0).floor() as i32;
    if terrain.is_solid_at(center_x, agent.y.floor() as i32 - 1) {
        agent.facing = agent.facing.reversed();
        agent.start_falling();
        return;
    }
    agent.y -= CLIMB_STEP_PX;
    if !touching_wall(agent, terrain) {
        agent.enter_state(BehaviorState::ToppingOut);
    }
}

/// Solid terrain alongside the lower half of the body, in the leading column.
fn touching_wall(agent: &Agent, terrain: &TerrainField) -> bool {
    let column = agent.leading_column();
    let from = (agent.y + agent.height / 2.0).floor() as i32;
    (from..agent.foot_row()).any(|row| terrain.is_solid_at(column, row))
}

fn apply_gravity(agent: &mut Agent, terrain: &TerrainField) {
    match agent.state {
        BehaviorState::Falling => fall(agent, terrain),
        BehaviorState::Floating => {
            if is_supported(agent, terrain) {
                agent.enter_state(BehaviorState::FloatingLanding);
            }
        }
        BehaviorState::Climbing => {}
        state if state.is_gravity_exempt() => {}
        _ => {
            if !agent.walking_on_slab && !is_supported(agent, terrain) {
                agent.start_falling();
            }
        }
    }
}

fn fall(agent: &mut Agent, terrain: &TerrainField) {
    let mut descended = 0;
    while descended < MAX_FALL_PER_TICK_PX && !is_supported(agent, terrain) {
        agent.y += 1.0;
        agent.fallen_distance += 1.0;
        descended += 1;
    }

    if agent.fallen_distance > LETHAL_FALL_DISTANCE && !agent.capability.can_float() {
        agent.death_pending = true;
    }

    if is_supported(agent, terrain) {
        agent.y = agent.y.floor();
        if agent.death_pending {
            agent.enter_state(BehaviorState::DyingFalling);
        } else {
            agent.enter_state(BehaviorState::Walking);
        }
        trace!(name = %agent.name, fallen = agent.fallen_distance, "agent_landed");
        return;
    }

    if agent.fallen_distance > FLOAT_ACTIVATION_DISTANCE && agent.capability.can_float() {
        agent.enter_state(BehaviorState::Floating);
    }
}

/// Countdown, then animation for one agent. Payloads edit `terrain` in place.
pub(crate) fn advance_timers(
    agent: &mut Agent,
    terrain: &mut TerrainField,
    clock: &SimulationClock,
    dt_ms: f32,
    events: &mut Vec<WorldEvent>,
) {
    if !agent.active {
        return;
    }
    advance_countdown(agent, clock, dt_ms);

    let duration = clock.scaled_duration(agent.state.frame_duration_ms(agent.animation.frame));
    if agent.animation.tick(dt_ms, duration) {
        advance_frame(agent, terrain, events);
    }
}

fn advance_countdown(agent: &mut Agent, clock: &SimulationClock, dt_ms: f32) {
    if agent.nuked && !agent.countdown.active && !agent.state.is_doomed() {
        agent.countdown.start();
    }
    if !agent.countdown.active {
        return;
    }

    agent.countdown.elapsed_ms += dt_ms;
    if agent.countdown.elapsed_ms < clock.scaled_duration(COUNTDOWN_FRAME_MS) {
        return;
    }
    agent.countdown.elapsed_ms = 0.0;
    agent.countdown.frame += 1;
    if agent.countdown.frame < COUNTDOWN_FRAMES {
        return;
    }

    agent.countdown.active = false;
    if agent.state.is_airborne() {
        agent.enter_state(BehaviorState::Booming);
    } else {
        agent.enter_state(BehaviorState::Exploding);
    }
    debug!(name = %agent.name, state = agent.state.label(), "countdown_expired");
}

fn advance_frame(agent: &mut Agent, terrain: &mut TerrainField, events: &mut Vec<WorldEvent>) {
    let next = agent.animation.frame + 1;
    match agent.state {
        BehaviorState::Walking | BehaviorState::Climbing => agent.animation.frame = next % 8,
        BehaviorState::Falling => agent.animation.frame = next % 4,
        BehaviorState::Blocking => agent.animation.frame = next % 16,
        BehaviorState::ToppingOut => {
            if next > 7 {
                agent.x += WALK_STEP_PX * agent.facing.sign();
                agent.enter_state(BehaviorState::Walking);
            } else {
                agent.animation.frame = next;
            }
        }
        BehaviorState::Floating => agent.animation.frame = if next > 7 { 4 } else { next },
        BehaviorState::FloatingLanding => {
            if agent.animation.frame == 0 {
                agent.enter_state(BehaviorState::Walking);
            } else {
                agent.animation.frame -= 1;
            }
        }
        BehaviorState::Building => advance_building(agent, terrain, next),
        BehaviorState::RunOutOfSlabs => {
            if next >= 15 {
                agent.enter_state(BehaviorState::Walking);
            } else {
                agent.animation.frame = next;
            }
        }
        BehaviorState::Bashing => {
            let frame = if next > 31 { 0 } else { next };
            agent.animation.frame = frame;
            if frame % 2 == 1 {
                let report = actions::bash(agent, terrain);
                let progress = &mut agent.progress;
                progress.stall_count = stall(progress.stall_count, report.nothing_ahead);
                progress.edge_stall_count = stall(progress.edge_stall_count, report.no_floor_ahead);
            }
            if agent.progress.stall_count > STALL_LIMIT
                || agent.progress.edge_stall_count > STALL_LIMIT
            {
                agent.enter_state(BehaviorState::Walking);
            }
        }
        BehaviorState::Mining => {
            let frame = if next > 17 { 0 } else { next };
            agent.animation.frame = frame;
            let thin_floor = actions::mine(agent, terrain);
            agent.progress.stall_count = stall(agent.progress.stall_count, thin_floor);
            if agent.progress.stall_count > STALL_LIMIT {
                agent.enter_state(BehaviorState::Walking);
            }
        }
        BehaviorState::Digging => {
            let frame = next % 16;
            agent.animation.frame = frame;
            if frame <= 8 {
                let through = actions::dig(agent, terrain);
                agent.progress.stall_count = stall(agent.progress.stall_count, through);
            }
            if agent.progress.stall_count > STALL_LIMIT {
                agent.start_falling();
            }
        }
        BehaviorState::Exploding => {
            if next >= 15 {
                agent.enter_state(BehaviorState::Booming);
            } else {
                agent.animation.frame = next;
            }
        }
        BehaviorState::Booming => {
            agent.animation.frame = next;
            if next == 1 {
                let (x, y) = actions::explode(agent, terrain);
                events.push(WorldEvent::Explosion {
                    x,
                    y,
                    radius: actions::EXPLOSION_RADIUS,
                });
            }
            if next >= 4 {
                if is_supported(agent, terrain) {
                    agent.enter_state(BehaviorState::Disintegrating);
                } else {
                    agent.deactivate(Fate::Exploded);
                }
            }
        }
        BehaviorState::Disintegrating => {
            if next >= 15 {
                agent.deactivate(Fate::Exploded);
            } else {
                agent.animation.frame = next;
            }
        }
        BehaviorState::DyingFalling => {
            if next >= 15 {
                agent.deactivate(Fate::FellToDeath);
            } else {
                agent.animation.frame = next;
            }
        }
    }
}

fn advance_building(agent: &mut Agent, terrain: &mut TerrainField, next: u32) {
    agent.animation.frame = next;
    if next == 10 && actions::build_slab(agent, terrain) == BuildOutcome::Obstructed {
        debug!(name = %agent.name, slabs = agent.progress.slabs_placed, "build_obstructed");
        agent.enter_state(BehaviorState::Walking);
        return;
    }
    if next > 15 {
        agent.animation.frame = 0;
        agent.progress.slabs_placed += 1;
        if agent.progress.slabs_placed >= MAX_SLABS {
            agent.enter_state(BehaviorState::RunOutOfSlabs);
        }
    }
}

fn stall(count: u32, stalled: bool) -> u32 {
    if stalled {
        count + 1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::agent::{Capability, Facing};
    use crate::sim::raster::{Raster, Rgba};

    const GROUND_TOP: i32 = 100;

    fn flat_ground(width: u32, height: u32) -> TerrainField {
        let mut field = TerrainField::new(Raster::filled(width, height, Rgba::BLACK));
        field.paint_rect(0, GROUND_TOP, width as i32, height as i32 - GROUND_TOP, Rgba::WHITE);
        field
    }

    /// Agent resting on `GROUND_TOP` with the one-pixel gap landing leaves.
    fn walker(x: f32, facing: Facing) -> Agent {
        let mut agent = Agent::new((x, (GROUND_TOP - 21) as f32), facing, "t".into());
        agent.active = true;
        agent.enter_state(BehaviorState::Walking);
        agent
    }

    fn run_tick(agent: &mut Agent, terrain: &mut TerrainField, clock: &SimulationClock, dt_ms: f32) {
        let mut events = Vec::new();
        advance_motion(agent, terrain);
        advance_timers(agent, terrain, clock, dt_ms, &mut events);
    }

    #[test]
    fn walker_on_flat_ground_is_supported_and_advances() {
        let terrain = flat_ground(200, 140);
        let mut agent = walker(50.0, Facing::Right);
        assert!(is_supported(&agent, &terrain));
        advance_motion(&mut agent, &terrain);
        assert_eq!(agent.state, BehaviorState::Walking);
        assert_eq!(agent.x, 52.0);
        assert_eq!(agent.y, (GROUND_TOP - 21) as f32);
    }

    #[test]
    fn small_step_snaps_the_walker_up_by_the_solid_count() {
        let mut terrain = flat_ground(200, 140);
        terrain.paint_rect(57, GROUND_TOP - 6, 20, 6, Rgba::WHITE);
        let mut agent = walker(50.0, Facing::Right);
        let start_y = agent.y;

        advance_motion(&mut agent, &terrain);

        assert_eq!(agent.state, BehaviorState::Walking);
        assert_eq!(agent.y, start_y - 3.0);
        assert_eq!(agent.turn_cooldown, 0);
    }

    #[test]
    fn tall_wall_turns_a_plain_walker_around() {
        let mut terrain = flat_ground(200, 140);
        terrain.paint_rect(57, GROUND_TOP - 19, 20, 19, Rgba::WHITE);
        let mut agent = walker(50.0, Facing::Right);

        advance_motion(&mut agent, &terrain);

        assert_eq!(agent.facing, Facing::Left);
        assert_eq!(agent.turn_cooldown, TURN_COOLDOWN_TICKS);
        assert_eq!(agent.state, BehaviorState::Walking);
    }

    #[test]
    fn climber_scales_a_wall_and_tops_out() {
        let mut terrain = flat_ground(200, 140);
        terrain.paint_rect(57, GROUND_TOP - 30, 40, 30, Rgba::WHITE);
        let mut agent = walker(50.0, Facing::Right);
        agent.capability = Capability::Climber;
        let clock = SimulationClock::new(50);

        advance_motion(&mut agent, &terrain);
        assert_eq!(agent.state, BehaviorState::Climbing);

        let mut reached_top = false;
        for _ in 0..400 {
            run_tick(&mut agent, &mut terrain, &clock, 40.0);
            if agent.state == BehaviorState::Walking && agent.x > 57.0 {
                reached_top = true;
                break;
            }
        }
        assert!(reached_top, "ended in {:?} at ({}, {})", agent.state, agent.x, agent.y);
        assert!(agent.y + agent.height <= (GROUND_TOP - 30) as f32);
    }

    #[test]
    fn walking_off_a_ledge_starts_a_fall() {
        let mut terrain = flat_ground(200, 140);
        terrain.paint_rect(60, GROUND_TOP, 140, 5, Rgba::BLACK);
        let mut agent = walker(54.0, Facing::Right);

        let mut fell = false;
        for _ in 0..10 {
            advance_motion(&mut agent, &terrain);
            if agent.state == BehaviorState::Falling {
                fell = true;
                break;
            }
        }
        assert!(fell);
        assert!(agent.fallen_distance <= MAX_FALL_PER_TICK_PX as f32);
    }

    #[test]
    fn long_fall_without_float_ends_in_dying_falling() {
        let mut terrain = flat_ground(100, 400);
        terrain.paint_rect(0, GROUND_TOP, 100, 300, Rgba::BLACK);
        terrain.paint_rect(0, 380, 100, 20, Rgba::WHITE);
        let mut agent = Agent::new((40.0, 80.0), Facing::Right, "t".into());
        agent.active = true;
        let clock = SimulationClock::new(50);

        for _ in 0..200 {
            run_tick(&mut agent, &mut terrain, &clock, 40.0);
            if agent.state != BehaviorState::Falling {
                break;
            }
        }
        assert_eq!(agent.state, BehaviorState::DyingFalling);
        assert!(agent.fallen_distance > LETHAL_FALL_DISTANCE);

        for _ in 0..40 {
            run_tick(&mut agent, &mut terrain, &clock, 40.0);
        }
        assert!(!agent.active);
        assert_eq!(agent.fate, Some(Fate::FellToDeath));
    }

    #[test]
    fn short_fall_lands_walking() {
        let terrain = flat_ground(100, 140);
        let mut agent = Agent::new((40.0, 40.0), Facing::Right, "t".into());
        agent.active = true;
        for _ in 0..10 {
            advance_motion(&mut agent, &terrain);
        }
        assert_eq!(agent.state, BehaviorState::Walking);
        assert_eq!(agent.y, (GROUND_TOP - 21) as f32);
    }

    #[test]
    fn floater_deploys_and_survives_a_long_drop() {
        let mut terrain = flat_ground(100, 400);
        terrain.paint_rect(0, GROUND_TOP, 100, 300, Rgba::BLACK);
        terrain.paint_rect(0, 380, 100, 20, Rgba::WHITE);
        let mut agent = Agent::new((40.0, 80.0), Facing::Right, "t".into());
        agent.active = true;
        agent.capability = Capability::Floater;
        let clock = SimulationClock::new(50);

        let mut floated = false;
        for _ in 0..600 {
            run_tick(&mut agent, &mut terrain, &clock, 40.0);
            floated |= agent.state == BehaviorState::Floating;
            if floated && agent.state == BehaviorState::Walking {
                break;
            }
        }
        assert!(floated);
        assert_eq!(agent.state, BehaviorState::Walking);
        assert!(agent.active);
    }

    #[test]
    fn builder_runs_out_after_twelve_slabs() {
        let mut terrain = flat_ground(600, 300);
        terrain.paint_rect(0, 0, 600, 300, Rgba::BLACK);
        let mut agent = walker(100.0, Facing::Right);
        agent.y = 250.0;
        agent.enter_state(BehaviorState::Building);
        let clock = SimulationClock::new(50);

        let mut placed_max = 0;
        for _ in 0..(16 * 12 + 8) {
            run_tick(&mut agent, &mut terrain, &clock, 30.0);
            placed_max = placed_max.max(agent.progress.slabs_placed);
            if agent.state != BehaviorState::Building {
                break;
            }
        }
        assert_eq!(placed_max, MAX_SLABS - 1);
        assert_eq!(agent.state, BehaviorState::RunOutOfSlabs);
        assert_eq!(agent.progress.slabs_placed, 0);
        assert!(agent.y < 250.0);
    }

    #[test]
    fn countdown_expiry_picks_booming_when_airborne() {
        let mut terrain = flat_ground(100, 400);
        terrain.paint_rect(0, GROUND_TOP, 100, 300, Rgba::BLACK);
        let clock = SimulationClock::new(50);
        let mut events = Vec::new();

        let mut airborne = Agent::new((40.0, 10.0), Facing::Right, "a".into());
        airborne.active = true;
        airborne.countdown.start();
        airborne.countdown.frame = COUNTDOWN_FRAMES - 1;
        advance_timers(&mut airborne, &mut terrain, &clock, COUNTDOWN_FRAME_MS, &mut events);
        assert_eq!(airborne.state, BehaviorState::Booming);
        assert!(!airborne.countdown.active);

        let mut grounded = walker(40.0, Facing::Right);
        grounded.countdown.start();
        grounded.countdown.frame = COUNTDOWN_FRAMES - 1;
        advance_timers(&mut grounded, &mut terrain, &clock, COUNTDOWN_FRAME_MS, &mut events);
        assert_eq!(grounded.state, BehaviorState::Exploding);
    }

    #[test]
    fn booming_carves_a_crater_and_emits_one_explosion() {
        let mut terrain = flat_ground(200, 140);
        let clock = SimulationClock::new(50);
        let mut agent = walker(80.0, Facing::Right);
        agent.enter_state(BehaviorState::Booming);
        let mut events = Vec::new();

        for _ in 0..6 {
            advance_timers(&mut agent, &mut terrain, &clock, 40.0, &mut events);
        }

        assert_eq!(events.len(), 1);
        assert!(!terrain.is_solid_at(82, GROUND_TOP + 5));
        assert!(!agent.active);
        assert_eq!(agent.fate, Some(Fate::Exploded));
    }

    #[test]
    fn nuked_agents_raise_their_own_countdown() {
        let mut terrain = flat_ground(100, 140);
        let clock = SimulationClock::new(50);
        let mut agent = walker(40.0, Facing::Right);
        agent.nuked = true;
        let mut events = Vec::new();
        advance_timers(&mut agent, &mut terrain, &clock, 10.0, &mut events);
        assert!(agent.countdown.active);

        let mut dying = walker(40.0, Facing::Right);
        dying.nuked = true;
        dying.enter_state(BehaviorState::DyingFalling);
        advance_timers(&mut dying, &mut terrain, &clock, 10.0, &mut events);
        assert!(!dying.countdown.active);
    }

    #[test]
    fn fast_forward_shortens_frames() {
        let mut terrain = flat_ground(100, 140);
        let mut clock = SimulationClock::new(50);
        clock.set_fast_forward(true);
        let mut agent = walker(40.0, Facing::Right);
        let mut events = Vec::new();
        advance_timers(&mut agent, &mut terrain, &clock, 20.0, &mut events);
        assert_eq!(agent.animation.frame, 1);
    }

    #[test]
    fn every_state_advances_without_panicking() {
        let clock = SimulationClock::new(50);
        for state in BehaviorState::ALL {
            let mut terrain = flat_ground(200, 140);
            let mut agent = walker(80.0, Facing::Left);
            agent.capability = Capability::Athlete;
            agent.enter_state(state);
            for _ in 0..200 {
                run_tick(&mut agent, &mut terrain, &clock, 40.0);
            }
            assert!(
                !agent.active || BehaviorState::ALL.contains(&agent.state),
                "{state:?} left the state set"
            );
        }
    }

    #[test]
    fn digger_sinks_through_the_ground() {
        let mut terrain = flat_ground(200, 200);
        terrain.paint_rect(0, 130, 200, 70, Rgba::BLACK);
        let clock = SimulationClock::new(50);
        let mut agent = walker(80.0, Facing::Right);
        agent.enter_state(BehaviorState::Digging);
        let start_y = agent.y;

        for _ in 0..400 {
            run_tick(&mut agent, &mut terrain, &clock, 40.0);
            if agent.state != BehaviorState::Digging {
                break;
            }
        }
        assert_eq!(agent.state, BehaviorState::Falling);
        assert!(agent.y > start_y);
    }
}
