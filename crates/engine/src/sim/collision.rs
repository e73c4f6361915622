use std::collections::HashMap;

use tracing::debug;

use super::agent::{Agent, BehaviorState, Fate};
use super::detect::{DetectedObjects, DetectedRegion, HitBox};

pub const GRID_CELL_SIZE: f32 = 40.0;
pub const BLOCKER_FACE_WIDTH: f32 = 2.0;
pub const SANDWICH_NUDGE_PX: f32 = 24.0;
const FACE_STEP_PX: f32 = 2.0;

/// Uniform bucket grid over agent centers, rebuilt every pass.
#[derive(Debug, Default)]
struct AgentGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl AgentGrid {
    fn build(agents: &[Agent]) -> Self {
        let mut grid = Self::default();
        for (index, agent) in agents.iter().enumerate() {
            if agent.active && agent.collision_box {
                grid.cells.entry(cell_of(agent)).or_default().push(index);
            }
        }
        grid
    }

    fn neighbors(&self, cell: (i32, i32)) -> impl Iterator<Item = usize> + '_ {
        (-1..=1).flat_map(move |dy| {
            (-1..=1).flat_map(move |dx| {
                self.cells
                    .get(&(cell.0 + dx, cell.1 + dy))
                    .into_iter()
                    .flatten()
                    .copied()
            })
        })
    }
}

fn cell_of(agent: &Agent) -> (i32, i32) {
    let (cx, cy) = agent.center();
    (
        (cx / GRID_CELL_SIZE).floor() as i32,
        (cy / GRID_CELL_SIZE).floor() as i32,
    )
}

/// Hazards, then exits, then blockers. Returns how many agents were rescued.
pub(crate) fn resolve_collisions(agents: &mut [Agent], objects: &DetectedObjects) -> u32 {
    deactivate_overlapping(agents, &objects.air_hazards, Fate::Hazard);
    deactivate_overlapping(agents, &objects.ground_hazards, Fate::Hazard);
    let rescued = deactivate_overlapping(agents, &objects.exits, Fate::Rescued);
    resolve_blockers(agents);
    rescued
}

fn deactivate_overlapping(agents: &mut [Agent], regions: &[DetectedRegion], fate: Fate) -> u32 {
    if regions.is_empty() {
        return 0;
    }
    let boxes: Vec<HitBox> = regions.iter().map(DetectedRegion::hit_box).collect();
    let mut count = 0;
    for agent in agents.iter_mut().filter(|agent| agent.active) {
        let body = agent.hit_box();
        if boxes.iter().any(|region| region.overlaps(&body)) {
            debug!(name = %agent.name, fate = ?fate, "agent_touched_region");
            agent.deactivate(fate);
            count += 1;
        }
    }
    count
}

fn pushes_against_blockers(state: BehaviorState) -> bool {
    matches!(
        state,
        BehaviorState::Walking | BehaviorState::Building | BehaviorState::Mining
    )
}

fn resolve_blockers(agents: &mut [Agent]) {
    let grid = AgentGrid::build(agents);
    if grid.cells.is_empty() {
        return;
    }

    for index in 0..agents.len() {
        let mover = &agents[index];
        if !mover.active || !pushes_against_blockers(mover.state) {
            continue;
        }
        let body = mover.hit_box();
        let contact = grid
            .neighbors(cell_of(mover))
            .filter(|&other| other != index)
            .find_map(|other| face_contact(&body, &agents[other]));

        let Some((left, right)) = contact else {
            continue;
        };
        let mover = &mut agents[index];
        if left && right && mover.state == BehaviorState::Walking {
            mover.x += SANDWICH_NUDGE_PX * mover.facing.sign();
        } else {
            mover.facing = mover.facing.reversed();
            mover.x += FACE_STEP_PX * mover.facing.sign();
        }
    }
}

/// Which of the blocker's two faces `body` touches, if any.
fn face_contact(body: &HitBox, blocker: &Agent) -> Option<(bool, bool)> {
    if !blocker.active || !blocker.collision_box {
        return None;
    }
    let left_face = HitBox {
        x: blocker.x,
        y: blocker.y,
        width: BLOCKER_FACE_WIDTH,
        height: blocker.height,
    };
    let right_face = HitBox {
        x: blocker.x + blocker.width - BLOCKER_FACE_WIDTH,
        ..left_face
    };
    let left = left_face.overlaps(body);
    let right = right_face.overlaps(body);
    (left || right).then_some((left, right))
}
