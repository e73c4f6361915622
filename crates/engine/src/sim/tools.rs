use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::agent::{Agent, BehaviorState, Capability};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolId {
    Climber,
    Floater,
    Blocker,
    Builder,
    Basher,
    Miner,
    Digger,
    Exploder,
}

impl ToolId {
    pub const ALL: [ToolId; 8] = [
        ToolId::Climber,
        ToolId::Floater,
        ToolId::Blocker,
        ToolId::Builder,
        ToolId::Basher,
        ToolId::Miner,
        ToolId::Digger,
        ToolId::Exploder,
    ];

    const fn index(self) -> usize {
        match self {
            ToolId::Climber => 0,
            ToolId::Floater => 1,
            ToolId::Blocker => 2,
            ToolId::Builder => 3,
            ToolId::Basher => 4,
            ToolId::Miner => 5,
            ToolId::Digger => 6,
            ToolId::Exploder => 7,
        }
    }

    /// Field name used by level definitions.
    pub fn def_key(self) -> &'static str {
        match self {
            ToolId::Climber => "climber",
            ToolId::Floater => "floater",
            ToolId::Blocker => "blocker",
            ToolId::Builder => "builder",
            ToolId::Basher => "basher",
            ToolId::Miner => "miner",
            ToolId::Digger => "digger",
            ToolId::Exploder => "exploder",
        }
    }

    pub fn from_def_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.def_key() == key)
    }

    pub fn kind(self) -> ToolKind {
        match self {
            ToolId::Climber => ToolKind::Capability(TraversalSkill::Climb),
            ToolId::Floater => ToolKind::Capability(TraversalSkill::Float),
            ToolId::Exploder => ToolKind::Countdown,
            ToolId::Blocker => ToolKind::Action(ActionTool::Block),
            ToolId::Builder => ToolKind::Action(ActionTool::Build),
            ToolId::Basher => ToolKind::Action(ActionTool::Bash),
            ToolId::Miner => ToolKind::Action(ActionTool::Mine),
            ToolId::Digger => ToolKind::Action(ActionTool::Dig),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalSkill {
    Climb,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTool {
    Block,
    Build,
    Bash,
    Mine,
    Dig,
}

impl ActionTool {
    pub fn target_state(self) -> BehaviorState {
        match self {
            ActionTool::Block => BehaviorState::Blocking,
            ActionTool::Build => BehaviorState::Building,
            ActionTool::Bash => BehaviorState::Bashing,
            ActionTool::Mine => BehaviorState::Mining,
            ActionTool::Dig => BehaviorState::Digging,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Capability(TraversalSkill),
    Countdown,
    Action(ActionTool),
}

/// Remaining uses per tool; counts only ever go down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolInventory {
    remaining: [u32; 8],
}

impl ToolInventory {
    pub fn from_counts(counts: impl IntoIterator<Item = (ToolId, u32)>) -> Self {
        let mut inventory = Self::default();
        for (tool, count) in counts {
            inventory.remaining[tool.index()] = count;
        }
        inventory
    }

    pub fn remaining(&self, tool: ToolId) -> u32 {
        self.remaining[tool.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ToolId, u32)> + '_ {
        ToolId::ALL.into_iter().map(|tool| (tool, self.remaining(tool)))
    }

    fn consume(&mut self, tool: ToolId) -> Result<(), AssignmentRejected> {
        let slot = &mut self.remaining[tool.index()];
        if *slot == 0 {
            return Err(AssignmentRejected::OutOfUses(tool));
        }
        *slot -= 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AssignmentRejected {
    #[error("no agent at index {0}")]
    UnknownAgent(usize),
    #[error("agent is not active")]
    Inactive,
    #[error("agent is already dying")]
    Doomed,
    #[error("no {} uses left", .0.def_key())]
    OutOfUses(ToolId),
    #[error("only explode and float can be given to an airborne agent")]
    Airborne,
    #[error("countdown already running")]
    CountdownRunning,
    #[error("blockers accept only the exploder")]
    Blocking,
    #[error("agent already holds that skill")]
    AlreadyCapable,
    #[error("agent is already {}", .0.label())]
    AlreadyInState(BehaviorState),
}

/// Applies `tool` to `agent`, drawing one use from `inventory` on success.
/// A rejection leaves agent and inventory untouched.
pub fn assign_tool(
    agent: &mut Agent,
    tool: ToolId,
    inventory: &mut ToolInventory,
) -> Result<(), AssignmentRejected> {
    if !agent.active {
        return Err(AssignmentRejected::Inactive);
    }
    if agent.state.is_doomed() {
        return Err(AssignmentRejected::Doomed);
    }
    if inventory.remaining(tool) == 0 {
        return Err(AssignmentRejected::OutOfUses(tool));
    }
    let kind = tool.kind();
    let allowed_airborne = matches!(
        kind,
        ToolKind::Countdown | ToolKind::Capability(TraversalSkill::Float)
    );
    if agent.state.is_airborne() && !allowed_airborne {
        return Err(AssignmentRejected::Airborne);
    }

    match kind {
        ToolKind::Countdown => {
            if agent.countdown.active {
                return Err(AssignmentRejected::CountdownRunning);
            }
            inventory.consume(tool)?;
            agent.countdown.start();
        }
        ToolKind::Capability(skill) => {
            if agent.state == BehaviorState::Blocking {
                return Err(AssignmentRejected::Blocking);
            }
            let next = combined_capability(agent.capability, skill)
                .ok_or(AssignmentRejected::AlreadyCapable)?;
            inventory.consume(tool)?;
            agent.capability = next;
        }
        ToolKind::Action(action) => {
            if agent.state == BehaviorState::Blocking {
                return Err(AssignmentRejected::Blocking);
            }
            let target = action.target_state();
            if agent.state == target {
                return Err(AssignmentRejected::AlreadyInState(target));
            }
            inventory.consume(tool)?;
            agent.enter_state(target);
        }
    }
    Ok(())
}

/// None when the skill adds nothing; athletes can never be downgraded.
fn combined_capability(current: Capability, skill: TraversalSkill) -> Option<Capability> {
    match (current, skill) {
        (Capability::Athlete, _) => None,
        (Capability::Climber, TraversalSkill::Climb) => None,
        (Capability::Floater, TraversalSkill::Float) => None,
        (Capability::None, TraversalSkill::Climb) => Some(Capability::Climber),
        (Capability::None, TraversalSkill::Float) => Some(Capability::Floater),
        (Capability::Climber, TraversalSkill::Float) | (Capability::Floater, TraversalSkill::Climb) => {
            Some(Capability::Athlete)
        }
    }
}
