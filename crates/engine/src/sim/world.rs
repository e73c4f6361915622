use thiserror::Error;
use tracing::{debug, info, warn};

use super::agent::{roster_name, Agent, BehaviorState, Facing, Fate};
use super::behavior;
use super::clock::SimulationClock;
use super::collision;
use super::detect::{self, DetectedObjects};
use super::raster::{Raster, RasterSizeError};
use super::snapshot::{self, WorldSnapshot};
use super::terrain::{PaintMode, TerrainField};
use super::tools::{self, AssignmentRejected, ToolId, ToolInventory};

/// Level data as loaded from content, before marker detection.
#[derive(Debug, Clone)]
pub struct LevelData {
    pub name: String,
    pub label: String,
    pub agent_count: u32,
    pub release_rate: u32,
    pub facing: Facing,
    pub tools: ToolInventory,
    pub collision: Raster,
    pub visual: Option<Raster>,
}

#[derive(Debug, Error)]
pub enum WorldInitError {
    #[error("level '{level}' has no spawn marker")]
    MissingSpawn { level: String },
    #[error("level '{level}' releases no agents")]
    NoAgents { level: String },
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("snapshot belongs to level '{actual}', expected '{expected}'")]
    LevelMismatch { expected: String, actual: String },
    #[error("snapshot holds {actual} agents, expected {expected}")]
    AgentCount { expected: usize, actual: usize },
    #[error("snapshot terrain is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    TerrainSize {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("snapshot raster is malformed: {0}")]
    RasterData(#[from] RasterSizeError),
}

/// Things that happened during ticks, for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Released { index: usize },
    Removed { index: usize, fate: Fate },
    Explosion { x: f32, y: f32, radius: f32 },
    LevelComplete { rescued: u32, total: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FateTally {
    pub rescued: usize,
    pub hazard: usize,
    pub fell: usize,
    pub exploded: usize,
    pub out_of_bounds: usize,
}

impl FateTally {
    pub fn total(&self) -> usize {
        self.rescued + self.hazard + self.fell + self.exploded + self.out_of_bounds
    }
}

/// One attempt at one level: terrain, agents, inventory and clock.
#[derive(Debug, Clone)]
pub struct SimulationWorld {
    level_name: String,
    label: String,
    terrain: TerrainField,
    objects: DetectedObjects,
    agents: Vec<Agent>,
    inventory: ToolInventory,
    clock: SimulationClock,
    released: usize,
    rescued: u32,
    nuked: bool,
    completed: bool,
    events: Vec<WorldEvent>,
}

impl SimulationWorld {
    pub fn from_level(level: LevelData) -> Result<Self, WorldInitError> {
        if level.agent_count == 0 {
            return Err(WorldInitError::NoAgents { level: level.name });
        }
        let objects = detect::detect(&level.collision);
        let Some((spawn_x, spawn_y)) = objects.spawn_point() else {
            return Err(WorldInitError::MissingSpawn { level: level.name });
        };
        if objects.exits.is_empty() {
            warn!(level = %level.name, "level_has_no_exit");
        }

        let mut terrain = TerrainField::new(level.collision);
        if let Some(visual) = level.visual {
            terrain = terrain.with_visual(visual);
        }
        detect::neutralize_markers(&mut terrain);

        let agents: Vec<Agent> = (0..level.agent_count as usize)
            .map(|index| {
                let mut agent = Agent::new((spawn_x, spawn_y), level.facing, roster_name(index));
                agent.x -= agent.width / 2.0;
                agent
            })
            .collect();

        info!(
            level = %level.name,
            width = terrain.width(),
            height = terrain.height(),
            agents = agents.len(),
            exits = objects.exits.len(),
            hazards = objects.air_hazards.len() + objects.ground_hazards.len(),
            release_rate = level.release_rate,
            "world_created"
        );

        Ok(Self {
            level_name: level.name,
            label: level.label,
            terrain,
            objects,
            agents,
            inventory: level.tools,
            clock: SimulationClock::new(level.release_rate),
            released: 0,
            rescued: 0,
            nuked: false,
            completed: false,
            events: Vec::new(),
        })
    }

    /// Advances one fixed step. Paused worlds do not change.
    pub fn tick(&mut self, dt_ms: f32) {
        if self.clock.is_paused() || self.completed {
            return;
        }
        self.clock.record_tick();
        let was_active: Vec<bool> = self.agents.iter().map(|agent| agent.active).collect();

        let released_now = self.release_next(dt_ms);
        for agent in &mut self.agents {
            behavior::advance_motion(agent, &self.terrain);
        }
        self.rescued += collision::resolve_collisions(&mut self.agents, &self.objects);
        for agent in &mut self.agents {
            behavior::advance_timers(agent, &mut self.terrain, &self.clock, dt_ms, &mut self.events);
        }

        self.record_removals(&was_active, released_now);
        self.check_completion();
    }

    fn release_next(&mut self, dt_ms: f32) -> Option<usize> {
        if self.released >= self.agents.len() || !self.clock.release_due(dt_ms) {
            return None;
        }
        let index = self.released;
        let agent = &mut self.agents[index];
        agent.active = true;
        agent.enter_state(BehaviorState::Falling);
        agent.nuked |= self.nuked;
        self.released += 1;
        debug!(index, name = %agent.name, "agent_released");
        self.events.push(WorldEvent::Released { index });
        Some(index)
    }

    fn record_removals(&mut self, was_active: &[bool], released_now: Option<usize>) {
        for (index, agent) in self.agents.iter().enumerate() {
            let was_in_play = was_active[index] || released_now == Some(index);
            let Some(fate) = agent.fate.filter(|_| was_in_play && !agent.active) else {
                continue;
            };
            match fate {
                Fate::Rescued => info!(index, name = %agent.name, "agent_rescued"),
                _ => info!(index, name = %agent.name, fate = ?fate, "agent_lost"),
            }
            self.events.push(WorldEvent::Removed { index, fate });
        }
    }

    fn check_completion(&mut self) {
        if self.completed || !self.is_complete() {
            return;
        }
        self.completed = true;
        let tally = self.fate_tally();
        info!(
            level = %self.level_name,
            rescued = tally.rescued,
            hazard = tally.hazard,
            fell = tally.fell,
            exploded = tally.exploded,
            out_of_bounds = tally.out_of_bounds,
            total = self.agents.len(),
            ticks = self.clock.elapsed_ticks(),
            "level_complete"
        );
        self.events.push(WorldEvent::LevelComplete {
            rescued: self.rescued,
            total: self.agents.len(),
        });
    }

    /// All agents released and none left walking around.
    pub fn is_complete(&self) -> bool {
        self.released == self.agents.len() && self.agents.iter().all(|agent| !agent.active)
    }

    pub fn assign_tool(&mut self, index: usize, tool: ToolId) -> Result<(), AssignmentRejected> {
        let agent = self
            .agents
            .get_mut(index)
            .ok_or(AssignmentRejected::UnknownAgent(index))?;
        tools::assign_tool(agent, tool, &mut self.inventory)?;
        info!(
            index,
            name = %agent.name,
            tool = tool.def_key(),
            remaining = self.inventory.remaining(tool),
            "tool_assigned"
        );
        Ok(())
    }

    /// Active agent whose box contains the point, nearest center first.
    pub fn pick_agent_at(&self, x: f32, y: f32) -> Option<usize> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.active && agent.contains_point(x, y))
            .map(|(index, agent)| {
                let (cx, cy) = agent.center();
                (index, (cx - x).powi(2) + (cy - y).powi(2))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    pub fn paint(&mut self, x: f32, y: f32, radius: f32, mode: PaintMode) {
        self.terrain.paint_circle(x, y, radius, mode);
    }

    /// Flags every agent that has not finished, released or not. Returns how
    /// many were newly flagged.
    pub fn nuke(&mut self) -> usize {
        self.nuked = true;
        let mut flagged = 0;
        for agent in self.agents.iter_mut().filter(|agent| agent.fate.is_none()) {
            if !agent.nuked {
                agent.nuked = true;
                flagged += 1;
            }
        }
        info!(level = %self.level_name, flagged, "nuke_armed");
        flagged
    }

    pub fn adjust_release_rate(&mut self, steps: i32) -> u32 {
        let rate = self.clock.adjust_release_rate(steps);
        debug!(rate, "release_rate_changed");
        rate
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.clock.set_paused(paused);
    }

    pub fn set_fast_forward(&mut self, enabled: bool) {
        self.clock.set_fast_forward(enabled);
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn terrain(&self) -> &TerrainField {
        &self.terrain
    }

    pub fn objects(&self) -> &DetectedObjects {
        &self.objects
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn inventory(&self) -> &ToolInventory {
        &self.inventory
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn rescued(&self) -> u32 {
        self.rescued
    }

    pub fn released(&self) -> usize {
        self.released
    }

    pub fn active_count(&self) -> usize {
        self.agents.iter().filter(|agent| agent.active).count()
    }

    pub fn is_nuked(&self) -> bool {
        self.nuked
    }

    pub fn fate_tally(&self) -> FateTally {
        let mut tally = FateTally::default();
        for fate in self.agents.iter().filter_map(|agent| agent.fate) {
            match fate {
                Fate::Rescued => tally.rescued += 1,
                Fate::Hazard => tally.hazard += 1,
                Fate::FellToDeath => tally.fell += 1,
                Fate::Exploded => tally.exploded += 1,
                Fate::OutOfBounds => tally.out_of_bounds += 1,
            }
        }
        tally
    }

    pub fn state_digest(&self) -> String {
        snapshot::state_digest(self.terrain.collision(), &self.agents)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            level_name: self.level_name.clone(),
            rescued: self.rescued,
            released: self.released,
            nuked: self.nuked,
            inventory: self.inventory,
            clock: self.clock.clone(),
            agents: self.agents.clone(),
            collision: self.terrain.collision().clone(),
            visual: self.terrain.visual().cloned(),
        }
    }

    /// Rewinds this attempt to `snapshot`. Nothing changes on error.
    pub fn restore(&mut self, snapshot: WorldSnapshot) -> Result<(), RestoreError> {
        if snapshot.level_name != self.level_name {
            return Err(RestoreError::LevelMismatch {
                expected: self.level_name.clone(),
                actual: snapshot.level_name,
            });
        }
        if snapshot.agents.len() != self.agents.len() {
            return Err(RestoreError::AgentCount {
                expected: self.agents.len(),
                actual: snapshot.agents.len(),
            });
        }
        snapshot.collision.check_len()?;
        if let Some(visual) = &snapshot.visual {
            visual.check_len()?;
        }
        if !snapshot.collision.same_size(self.terrain.collision()) {
            return Err(RestoreError::TerrainSize {
                expected_width: self.terrain.width(),
                expected_height: self.terrain.height(),
                actual_width: snapshot.collision.width(),
                actual_height: snapshot.collision.height(),
            });
        }

        let released = snapshot.released.min(snapshot.agents.len());
        self.terrain.replace_rasters(snapshot.collision, snapshot.visual);
        self.agents = snapshot.agents;
        self.inventory = snapshot.inventory;
        self.clock = snapshot.clock;
        self.released = released;
        self.rescued = snapshot.rescued;
        self.nuked = snapshot.nuked;
        self.completed = self.is_complete();
        self.events.clear();
        info!(level = %self.level_name, released, rescued = self.rescued, "world_restored");
        Ok(())
    }
}
