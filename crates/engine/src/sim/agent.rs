use serde::{Deserialize, Serialize};

use super::detect::HitBox;

pub const AGENT_WIDTH: f32 = 5.0;
pub const AGENT_HEIGHT: f32 = 20.0;

const DEFAULT_NAMES: [&str; 20] = [
    "Ada", "Basil", "Clove", "Dot", "Ember", "Fennel", "Gus", "Hazel", "Iggy", "Juniper",
    "Kip", "Lark", "Moss", "Nettle", "Olive", "Pip", "Quill", "Rue", "Sorrel", "Tansy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

/// Traversal skills an agent keeps for the rest of the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Capability {
    #[default]
    None,
    Climber,
    Floater,
    Athlete,
}

impl Capability {
    pub fn can_climb(self) -> bool {
        matches!(self, Capability::Climber | Capability::Athlete)
    }

    pub fn can_float(self) -> bool {
        matches!(self, Capability::Floater | Capability::Athlete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorState {
    Falling,
    Walking,
    Climbing,
    ToppingOut,
    Floating,
    FloatingLanding,
    Blocking,
    Building,
    RunOutOfSlabs,
    Bashing,
    Mining,
    Digging,
    Exploding,
    Booming,
    Disintegrating,
    DyingFalling,
}

impl BehaviorState {
    pub const ALL: [BehaviorState; 16] = [
        BehaviorState::Falling,
        BehaviorState::Walking,
        BehaviorState::Climbing,
        BehaviorState::ToppingOut,
        BehaviorState::Floating,
        BehaviorState::FloatingLanding,
        BehaviorState::Blocking,
        BehaviorState::Building,
        BehaviorState::RunOutOfSlabs,
        BehaviorState::Bashing,
        BehaviorState::Mining,
        BehaviorState::Digging,
        BehaviorState::Exploding,
        BehaviorState::Booming,
        BehaviorState::Disintegrating,
        BehaviorState::DyingFalling,
    ];

    /// Unscaled animation frame duration in milliseconds.
    pub fn frame_duration_ms(self, frame: u32) -> f32 {
        match self {
            BehaviorState::Walking
            | BehaviorState::Climbing
            | BehaviorState::Falling
            | BehaviorState::Blocking
            | BehaviorState::ToppingOut
            | BehaviorState::RunOutOfSlabs
            | BehaviorState::DyingFalling => 80.0,
            BehaviorState::Floating | BehaviorState::FloatingLanding => 120.0,
            BehaviorState::Building => 30.0,
            BehaviorState::Bashing
            | BehaviorState::Digging
            | BehaviorState::Booming
            | BehaviorState::Disintegrating => 40.0,
            BehaviorState::Exploding => 60.0,
            BehaviorState::Mining => match frame {
                0..=2 | 15..=17 => 120.0,
                _ => 80.0,
            },
        }
    }

    pub fn initial_frame(self) -> u32 {
        match self {
            BehaviorState::FloatingLanding => 3,
            _ => 0,
        }
    }

    /// States in which only explode and float may be assigned.
    pub fn is_airborne(self) -> bool {
        matches!(
            self,
            BehaviorState::Falling | BehaviorState::Floating | BehaviorState::FloatingLanding
        )
    }

    /// States that never start a fall when unsupported.
    pub fn is_gravity_exempt(self) -> bool {
        matches!(
            self,
            BehaviorState::ToppingOut
                | BehaviorState::Exploding
                | BehaviorState::Booming
                | BehaviorState::Disintegrating
                | BehaviorState::Building
                | BehaviorState::RunOutOfSlabs
                | BehaviorState::DyingFalling
        )
    }

    /// Once entered, the agent can only finish dying.
    pub fn is_doomed(self) -> bool {
        matches!(
            self,
            BehaviorState::Exploding
                | BehaviorState::Booming
                | BehaviorState::Disintegrating
                | BehaviorState::DyingFalling
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            BehaviorState::Falling => "falling",
            BehaviorState::Walking => "walking",
            BehaviorState::Climbing => "climbing",
            BehaviorState::ToppingOut => "topping_out",
            BehaviorState::Floating => "floating",
            BehaviorState::FloatingLanding => "floating_landing",
            BehaviorState::Blocking => "blocking",
            BehaviorState::Building => "building",
            BehaviorState::RunOutOfSlabs => "run_out_of_slabs",
            BehaviorState::Bashing => "bashing",
            BehaviorState::Mining => "mining",
            BehaviorState::Digging => "digging",
            BehaviorState::Exploding => "exploding",
            BehaviorState::Booming => "booming",
            BehaviorState::Disintegrating => "disintegrating",
            BehaviorState::DyingFalling => "dying_falling",
        }
    }
}

/// Per-state animation clock, reset whenever the state changes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnimationTimer {
    pub frame: u32,
    pub elapsed_ms: f32,
    /// Set when a new frame starts; consumed by the next movement step.
    pub frame_entered: bool,
}

impl AnimationTimer {
    pub fn starting_at(frame: u32) -> Self {
        Self {
            frame,
            elapsed_ms: 0.0,
            frame_entered: false,
        }
    }

    /// Accumulates `dt_ms`; true once the frame duration is reached.
    pub fn tick(&mut self, dt_ms: f32, frame_duration_ms: f32) -> bool {
        self.elapsed_ms += dt_ms;
        if self.elapsed_ms < frame_duration_ms {
            return false;
        }
        self.elapsed_ms = 0.0;
        self.frame_entered = true;
        true
    }

    pub fn take_frame_entered(&mut self) -> bool {
        std::mem::take(&mut self.frame_entered)
    }
}

pub const COUNTDOWN_FRAMES: u32 = 5;
pub const COUNTDOWN_FRAME_MS: f32 = 1000.0;

/// Pre-explosion countdown, independent of the behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CountdownTimer {
    pub active: bool,
    pub frame: u32,
    pub elapsed_ms: f32,
}

impl CountdownTimer {
    pub fn start(&mut self) {
        *self = Self {
            active: true,
            frame: 0,
            elapsed_ms: 0.0,
        };
    }

    /// Seconds left on the display, for the render layer.
    pub fn remaining_frames(&self) -> u32 {
        COUNTDOWN_FRAMES.saturating_sub(self.frame)
    }
}

/// Tool progress bookkeeping, cleared on every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolProgress {
    pub slabs_placed: u32,
    pub stall_count: u32,
    pub edge_stall_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fate {
    Rescued,
    Hazard,
    FellToDeath,
    Exploded,
    OutOfBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub facing: Facing,
    pub capability: Capability,
    pub state: BehaviorState,
    pub animation: AnimationTimer,
    pub countdown: CountdownTimer,
    pub active: bool,
    pub fallen_distance: f32,
    pub death_pending: bool,
    pub turn_cooldown: u32,
    pub collision_box: bool,
    pub walking_on_slab: bool,
    pub nuked: bool,
    pub progress: ToolProgress,
    pub name: String,
    pub fate: Option<Fate>,
}

impl Agent {
    pub fn new(spawn: (f32, f32), facing: Facing, name: String) -> Self {
        Self {
            x: spawn.0,
            y: spawn.1,
            width: AGENT_WIDTH,
            height: AGENT_HEIGHT,
            facing,
            capability: Capability::None,
            state: BehaviorState::Falling,
            animation: AnimationTimer::default(),
            countdown: CountdownTimer::default(),
            active: false,
            fallen_distance: 0.0,
            death_pending: false,
            turn_cooldown: 0,
            collision_box: false,
            walking_on_slab: false,
            nuked: false,
            progress: ToolProgress::default(),
            name,
            fate: None,
        }
    }

    /// The only way to change state: resets the timer, tool progress and the
    /// blocker box.
    pub fn enter_state(&mut self, state: BehaviorState) {
        self.state = state;
        self.animation = AnimationTimer::starting_at(state.initial_frame());
        self.progress = ToolProgress::default();
        self.collision_box = state == BehaviorState::Blocking;
        if state != BehaviorState::Walking {
            self.walking_on_slab = false;
        }
    }

    pub fn start_falling(&mut self) {
        self.enter_state(BehaviorState::Falling);
        self.fallen_distance = 0.0;
        self.death_pending = false;
    }

    pub fn deactivate(&mut self, fate: Fate) {
        self.active = false;
        self.collision_box = false;
        self.countdown.active = false;
        self.fate = Some(fate);
    }

    pub fn is_released(&self) -> bool {
        self.active || self.fate.is_some()
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn hit_box(&self) -> HitBox {
        HitBox {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        self.hit_box().contains_point(px, py)
    }

    /// Column just ahead of the body in the facing direction.
    pub fn leading_column(&self) -> i32 {
        match self.facing {
            Facing::Right => (self.x + self.width).floor() as i32,
            Facing::Left => self.x.floor() as i32,
        }
    }

    pub fn foot_row(&self) -> i32 {
        (self.y + self.height).floor() as i32
    }
}

/// Cosmetic names: a fixed roster in order, then numbered fallbacks.
pub fn roster_name(index: usize) -> String {
    DEFAULT_NAMES
        .get(index)
        .map(|name| (*name).to_string())
        .unwrap_or_else(|| format!("Lemming{}", index + 1))
}
